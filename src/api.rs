//! HTTP surface: the transport webhook and a health check

mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::Dispatcher;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    /// Path secret of the webhook route; `None` while long-polling
    pub webhook_secret: Option<String>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, webhook_secret: Option<String>) -> Self {
        Self {
            dispatcher,
            webhook_secret,
        }
    }
}
