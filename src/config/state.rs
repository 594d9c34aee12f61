// Application state module
// Everything handlers share for the lifetime of the process

use std::sync::Arc;

use super::types::Config;
use crate::mail::Mailer;
use crate::session::SessionCodec;
use crate::store::Store;

/// Application state
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub mailer: Arc<dyn Mailer>,
    /// Signs and verifies session cookies with `app.secret_key`
    pub sessions: SessionCodec,
}

impl AppState {
    pub fn new(config: Config, store: Store, mailer: Arc<dyn Mailer>) -> Self {
        let sessions = SessionCodec::new(&config.app.secret_key, &config.app.session_cookie_name);
        Self {
            config,
            store,
            mailer,
            sessions,
        }
    }
}
