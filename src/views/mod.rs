mod browse;
mod login;
mod notifications;
mod upload;

use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};
use colored::Colorize;

pub use browse::BrowseView;
pub use login::{logout, ConfirmView, LoginView};
pub use notifications::NotificationsView;
pub use upload::{UploadBatch, UploadView};

pub const NOTICE_LIFETIME: Duration = Duration::from_millis(3500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: Instant,
}

impl Notice {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= NOTICE_LIFETIME
    }
}

impl Display for Notice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let message = match self.level {
            NoticeLevel::Success => self.message.green(),
            NoticeLevel::Error => self.message.red(),
            NoticeLevel::Info => self.message.blue(),
        };
        write!(f, "{}", message)
    }
}

/// Transient user-visible messages. Every failed action ends up here.
#[derive(Debug, Default)]
pub struct Toasts {
    next_id: u64,
    notices: Vec<Notice>,
}

impl Toasts {
    pub fn show(&mut self, message: impl Into<String>, level: NoticeLevel) -> u64 {
        self.next_id += 1;
        self.notices.push(Notice {
            id: self.next_id,
            level,
            message: message.into(),
            created_at: Instant::now(),
        });
        self.next_id
    }

    pub fn success(&mut self, message: impl Into<String>) -> u64 {
        self.show(message, NoticeLevel::Success)
    }

    pub fn error(&mut self, message: impl Into<String>) -> u64 {
        self.show(message, NoticeLevel::Error)
    }

    pub fn info(&mut self, message: impl Into<String>) -> u64 {
        self.show(message, NoticeLevel::Info)
    }

    pub fn active(&self, now: Instant) -> Vec<&Notice> {
        self.notices.iter().filter(|x| !x.is_expired(now)).collect()
    }

    pub fn prune(&mut self, now: Instant) {
        self.notices.retain(|x| !x.is_expired(now));
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn last(&self) -> Option<&Notice> {
        self.notices.last()
    }

    pub fn has(&self, level: NoticeLevel) -> bool {
        self.notices.iter().any(|x| x.level == level)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Confirm,
    Home,
    Upload,
    Browse,
    Notifications,
}

impl Route {
    pub fn requires_session(&self) -> bool {
        !matches!(self, Route::Login | Route::Confirm)
    }

    /// Where a request for `self` actually lands.
    pub fn resolve(self, authenticated: bool) -> Route {
        if self.requires_session() && !authenticated {
            Route::Login
        } else {
            self
        }
    }
}
