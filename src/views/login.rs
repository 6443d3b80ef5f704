use log::{error, info};
use crate::auth::IdentityClient;
use crate::session::{Session, SessionStore};
use crate::views::{Route, Toasts};

#[derive(Debug, Default, Clone)]
pub struct LoginView {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub is_sign_up: bool,
}

impl LoginView {
    pub fn sign_in(email: &str, password: &str) -> Self {
        Self { email: email.to_string(), password: password.to_string(), ..Default::default() }
    }

    pub fn sign_up(email: &str, password: &str, confirm_password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm_password.to_string(),
            is_sign_up: true,
        }
    }

    pub fn toggle_mode(&mut self) {
        self.is_sign_up = !self.is_sign_up;
    }

    pub async fn submit<S: SessionStore>(&self, identity: &IdentityClient, session: &mut Session<S>, toasts: &mut Toasts) -> Route {
        if self.is_sign_up {
            self.submit_sign_up(identity, toasts).await
        } else {
            self.submit_sign_in(identity, session, toasts).await
        }
    }

    async fn submit_sign_in<S: SessionStore>(&self, identity: &IdentityClient, session: &mut Session<S>, toasts: &mut Toasts) -> Route {
        let tokens = match identity.sign_in(&self.email, &self.password).await {
            Ok(tokens) => tokens,
            Err(e) => {
                toasts.error(format!("Sign in failed: {}", e));
                return Route::Login;
            }
        };
        if let Err(e) = session.begin(tokens).await {
            error!("session token was not stored: {}", e);
            toasts.error(format!("Sign in failed: {}", e));
            return Route::Login;
        }
        info!("signed in as {}", self.email);
        Route::Home
    }

    async fn submit_sign_up(&self, identity: &IdentityClient, toasts: &mut Toasts) -> Route {
        if self.password != self.confirm_password {
            toasts.error("Passwords do not match");
            return Route::Login;
        }
        match identity.sign_up(&self.email, &self.password).await {
            Ok(_) => {
                toasts.info(format!("A confirmation code was sent to {}", self.email));
                Route::Confirm
            }
            Err(e) => {
                toasts.error(format!("Sign up failed: {}", e));
                Route::Login
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ConfirmView {
    pub email: String,
    pub code: String,
}

impl ConfirmView {
    pub fn new(email: &str, code: &str) -> Self {
        Self { email: email.to_string(), code: code.to_string() }
    }

    pub async fn submit(&self, identity: &IdentityClient, toasts: &mut Toasts) -> Route {
        match identity.confirm_sign_up(&self.email, self.code.trim()).await {
            Ok(()) => {
                toasts.success("Account confirmed successfully! Sign in on next page.");
                Route::Login
            }
            Err(e) => {
                toasts.error(format!("Failed to confirm account: {}", e));
                Route::Confirm
            }
        }
    }
}

pub async fn logout<S: SessionStore>(session: &mut Session<S>, toasts: &mut Toasts) -> Route {
    if let Err(e) = session.end().await {
        toasts.error(format!("Logout failed: {}", e));
    }
    Route::Login
}
