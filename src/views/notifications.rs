use crate::api::ApiClient;
use crate::session::{Session, SessionStore};
use crate::views::Toasts;

/// Species the signed-in user gets notified about.
#[derive(Debug, Default, Clone)]
pub struct NotificationsView {
    pub subscriptions: Vec<String>,
}

impl NotificationsView {
    pub async fn subscribe<S: SessionStore>(&mut self, client: &ApiClient, session: &Session<S>, species: &str, toasts: &mut Toasts) -> bool {
        let species = species.trim();
        if species.is_empty() {
            toasts.error("Enter a species to subscribe to");
            return false;
        }
        let email = match session.user_email() {
            Ok(x) => x,
            Err(e) => {
                toasts.error(format!("Subscription failed: {}", e));
                return false;
            }
        };
        match client.subscribe(session, species, &email).await {
            Ok(()) => {
                if !self.subscriptions.iter().any(|x| x == species) {
                    self.subscriptions.push(species.to_string());
                }
                toasts.success(format!("Subscribed to {} notifications", species));
                true
            }
            Err(e) => {
                toasts.error(format!("Subscription failed: {}", e));
                false
            }
        }
    }

    pub async fn unsubscribe<S: SessionStore>(&mut self, client: &ApiClient, session: &Session<S>, species: &str, toasts: &mut Toasts) -> bool {
        let species = species.trim();
        let email = match session.user_email() {
            Ok(x) => x,
            Err(e) => {
                toasts.error(format!("Unsubscribe failed: {}", e));
                return false;
            }
        };
        match client.unsubscribe(session, species, &email).await {
            Ok(()) => {
                self.subscriptions.retain(|x| x != species);
                toasts.success(format!("Unsubscribed from {} notifications", species));
                true
            }
            Err(e) => {
                toasts.error(format!("Unsubscribe failed: {}", e));
                false
            }
        }
    }

    pub fn render(&self) -> String {
        if self.subscriptions.is_empty() {
            return "No subscriptions.\n".to_string();
        }
        self.subscriptions.iter().map(|x| format!("- {}\n", x)).collect()
    }
}
