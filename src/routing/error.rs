// Routing error types
// Startup errors stop the process; per-request errors become status-coded responses

use hyper::{Method, StatusCode};
use std::fmt::Display;
use thiserror::Error;

use super::context::Reply;
use super::pattern::PlaceholderKind;

/// Errors raised while building the route table
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("duplicate route: {method} {pattern}")]
    DuplicateRoute { method: Method, pattern: String },

    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("error handler for {0} already registered")]
    DuplicateErrorHandler(StatusCode),
}

/// What a handler returns instead of a reply
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Stop handling and answer with the error handler for `status`
    #[error("aborted with {status}: {message}")]
    Abort { status: StatusCode, message: String },

    /// Unexpected failure; reported to the client as a 500
    #[error("handler fault: {0}")]
    Fault(String),
}

impl HandlerError {
    pub fn abort(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Abort {
            status,
            message: message.into(),
        }
    }

    #[allow(clippy::needless_pass_by_value)]
    pub fn fault(err: impl Display) -> Self {
        Self::Fault(err.to_string())
    }
}

pub type HandlerResult = Result<Reply, HandlerError>;

/// Per-request dispatch failures, one per non-success branch of dispatch
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route for {method} {path}")]
    UnmatchedRoute { method: Method, path: String },

    #[error("cannot coerce '{value}' to {kind} for placeholder '{placeholder}'")]
    PathCoercion {
        placeholder: String,
        kind: PlaceholderKind,
        value: String,
    },

    #[error("handler fault: {0}")]
    HandlerFault(String),

    #[error("aborted with {status}: {message}")]
    ExplicitAbort { status: StatusCode, message: String },
}

impl DispatchError {
    /// Status code whose error handler answers this failure
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::UnmatchedRoute { .. } | Self::PathCoercion { .. } => StatusCode::NOT_FOUND,
            Self::HandlerFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ExplicitAbort { status, .. } => *status,
        }
    }

    /// Message handed to the error handler. Fault details stay in the log.
    pub fn client_message(&self) -> String {
        match self {
            Self::UnmatchedRoute { .. } | Self::PathCoercion { .. } => {
                "The requested URL was not found on the server.".to_string()
            }
            Self::HandlerFault(_) => "The server encountered an internal error and was \
                unable to complete your request."
                .to_string(),
            Self::ExplicitAbort { message, .. } => message.clone(),
        }
    }
}

impl From<HandlerError> for DispatchError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Abort { status, message } => Self::ExplicitAbort { status, message },
            HandlerError::Fault(detail) => Self::HandlerFault(detail),
        }
    }
}
