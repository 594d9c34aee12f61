//! Route table and dispatcher
//!
//! A request goes through `Idle -> Matching -> {Dispatched, Aborted, Unmatched,
//! Faulted} -> Responded`. Every branch ends in a response; nothing escapes
//! [`Router::dispatch`].

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Response, StatusCode};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::context::{Params, Reply, Request, RequestContext};
use super::error::{DispatchError, HandlerResult, RouterError};
use super::pattern::{split_path, PathPattern, PatternMatch};
use crate::http;
use crate::logger;
use crate::session::Session;

type Handler<S> = Arc<dyn Fn(&mut RequestContext<'_, S>) -> HandlerResult + Send + Sync>;
type ErrorHandler<S> = Arc<dyn Fn(&ErrorCondition, &S) -> Response<Full<Bytes>> + Send + Sync>;

struct Route<S> {
    method: Method,
    pattern: PathPattern,
    handler: Handler<S>,
}

/// What an error handler is told about the failure
#[derive(Debug, Clone)]
pub struct ErrorCondition {
    pub status: StatusCode,
    pub message: String,
}

impl ErrorCondition {
    /// Reason phrase, e.g. "Not Found"
    pub fn name(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("Error")
    }
}

/// Route table plus error handlers.
///
/// Built once at startup through `&mut self`, then shared read-only
/// (behind an `Arc`) by every connection.
pub struct Router<S> {
    routes: Vec<Route<S>>,
    error_handlers: HashMap<StatusCode, ErrorHandler<S>>,
}

impl<S> Default for Router<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Router<S> {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            error_handlers: HashMap::new(),
        }
    }

    /// Register a handler for one method and pattern
    pub fn register<F>(&mut self, method: Method, pattern: &str, handler: F) -> Result<(), RouterError>
    where
        F: Fn(&mut RequestContext<'_, S>) -> HandlerResult + Send + Sync + 'static,
    {
        self.insert(method, PathPattern::parse(pattern)?, Arc::new(handler))
    }

    /// Register one handler under several methods
    pub fn register_many<F>(
        &mut self,
        methods: &[Method],
        pattern: &str,
        handler: F,
    ) -> Result<(), RouterError>
    where
        F: Fn(&mut RequestContext<'_, S>) -> HandlerResult + Send + Sync + 'static,
    {
        let pattern = PathPattern::parse(pattern)?;
        let handler: Handler<S> = Arc::new(handler);
        for method in methods {
            self.insert(method.clone(), pattern.clone(), Arc::clone(&handler))?;
        }
        Ok(())
    }

    fn insert(&mut self, method: Method, pattern: PathPattern, handler: Handler<S>) -> Result<(), RouterError> {
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.pattern.same_shape(&pattern))
        {
            return Err(RouterError::DuplicateRoute {
                method,
                pattern: pattern.as_str().to_string(),
            });
        }
        self.routes.push(Route {
            method,
            pattern,
            handler,
        });
        Ok(())
    }

    /// Register the handler answering failures with `status`
    pub fn error_handler<F>(&mut self, status: StatusCode, handler: F) -> Result<(), RouterError>
    where
        F: Fn(&ErrorCondition, &S) -> Response<Full<Bytes>> + Send + Sync + 'static,
    {
        if self.error_handlers.contains_key(&status) {
            return Err(RouterError::DuplicateErrorHandler(status));
        }
        self.error_handlers.insert(status, Arc::new(handler));
        Ok(())
    }

    /// Registered (method, pattern) pairs in registration order
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes.iter().map(|r| (&r.method, r.pattern.as_str()))
    }

    /// Turn a request into a response.
    ///
    /// Never fails and never suspends. Session changes made by a handler that
    /// faults are rolled back; aborts keep them.
    pub fn dispatch(&self, app: &S, request: &Request, session: &mut Session) -> Response<Full<Bytes>> {
        match self.run(app, request, session) {
            Ok(reply) => reply.into_response(),
            Err(err) => {
                log_failure(request, &err);
                self.handle_error(app, &err)
            }
        }
    }

    fn run(&self, app: &S, request: &Request, session: &mut Session) -> Result<Reply, DispatchError> {
        let (route, params) = self.resolve(request)?;
        logger::log_debug(&format!(
            "[Dispatch] {} {} -> {}",
            request.method,
            request.path,
            route.pattern.as_str()
        ));

        let snapshot = session.clone();
        let mut ctx = RequestContext {
            request,
            params,
            session,
            app,
            locals: BTreeMap::new(),
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (route.handler)(&mut ctx)));
        let result = match outcome {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => Err(DispatchError::from(err)),
            Err(payload) => Err(DispatchError::HandlerFault(panic_message(payload.as_ref()))),
        };

        if matches!(result, Err(DispatchError::HandlerFault(_))) {
            *ctx.session = snapshot;
        }
        result
    }

    /// Find the first registered route for the method whose pattern accepts the path.
    ///
    /// HEAD falls back to the GET routes when no HEAD route fits. The server
    /// connection drops the body of HEAD responses.
    fn resolve(&self, request: &Request) -> Result<(&Route<S>, Params), DispatchError> {
        let unmatched = || DispatchError::UnmatchedRoute {
            method: request.method.clone(),
            path: request.path.clone(),
        };
        let segments = split_path(&request.path).ok_or_else(unmatched)?;

        let head_as_get = request.method == Method::HEAD;
        let candidates = self
            .routes
            .iter()
            .filter(|r| r.method == request.method)
            .chain(
                self.routes
                    .iter()
                    .filter(move |r| head_as_get && r.method == Method::GET),
            );

        let mut coercion_failure = None;
        for route in candidates {
            match route.pattern.match_segments(&segments) {
                PatternMatch::Matched(params) => return Ok((route, params)),
                PatternMatch::Coercion(err) => {
                    coercion_failure.get_or_insert(err);
                }
                PatternMatch::NoMatch => {}
            }
        }
        Err(coercion_failure.unwrap_or_else(unmatched))
    }

    fn handle_error(&self, app: &S, err: &DispatchError) -> Response<Full<Bytes>> {
        let condition = ErrorCondition {
            status: err.status(),
            message: err.client_message(),
        };

        let Some(handler) = self.error_handlers.get(&condition.status) else {
            return http::build_error_response(condition.status, &condition.message);
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler(&condition, app))) {
            Ok(response) => response,
            Err(payload) => {
                logger::log_error(&format!(
                    "Error handler for {} panicked: {}",
                    condition.status,
                    panic_message(payload.as_ref())
                ));
                http::build_error_response(condition.status, &condition.message)
            }
        }
    }
}

fn log_failure(request: &Request, err: &DispatchError) {
    let line = format!("[Dispatch] {} {}: {err}", request.method, request.path);
    match err {
        DispatchError::HandlerFault(_) => logger::log_error(&line),
        DispatchError::UnmatchedRoute { .. } | DispatchError::PathCoercion { .. } => {
            logger::log_warning(&line);
        }
        DispatchError::ExplicitAbort { .. } => logger::log_debug(&line),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
