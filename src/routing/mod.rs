//! Routing module
//!
//! Maps incoming requests to handlers:
//! - Path patterns with typed placeholders (`{year:int}`, `{name}`)
//! - Segment-exact matching, first registered route wins
//! - Error handlers keyed by status code, with a generic fallback

mod context;
mod error;
mod pattern;
mod router;

pub use context::{ParamValue, Params, Reply, Request, RequestContext};
pub use error::{DispatchError, HandlerError, HandlerResult, RouterError};
pub use pattern::{PathPattern, PlaceholderKind};
pub use router::{ErrorCondition, Router};
