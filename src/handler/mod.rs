//! Request handler module
//!
//! Glue between the HTTP server and the application: owns the route table
//! and the shared state, and adapts hyper requests to the router.

pub mod router;

use crate::config::AppState;
use crate::routing::Router;

// Re-export main entry point
pub use router::{handle_request, respond};

/// Route table plus the state its handlers read
pub struct Application {
    pub router: Router<AppState>,
    pub state: AppState,
}

impl Application {
    pub const fn new(router: Router<AppState>, state: AppState) -> Self {
        Self { router, state }
    }
}
