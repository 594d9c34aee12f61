//! Request entry point
//!
//! Turns a hyper request into a buffered [`Request`], runs it through the
//! application router with the client's session, and writes the session
//! cookie and access log on the way out.

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body as _, Bytes, Incoming};
use hyper::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, SERVER, SET_COOKIE};
use hyper::http::request::Parts;
use hyper::Response;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::Application;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::routing::Request;

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: hyper::Request<Incoming>,
    app: Arc<Application>,
    peer: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let start = Instant::now();
    let (parts, body) = req.into_parts();
    let max_body_size = app.state.config.http.max_body_size;

    // 1. Reject oversized bodies before reading them
    if let Some(resp) = check_body_size(&parts.headers, max_body_size) {
        return Ok(finish(&app, &parts, peer, resp, start));
    }

    // 2. Buffer the body, enforcing the limit for chunked uploads too
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let body = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_error(&format!(
                "Request body too large: exceeded {max_body_size} bytes"
            ));
            return Ok(finish(&app, &parts, peer, http::build_413_response(), start));
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            return Ok(finish(&app, &parts, peer, http::build_400_response(), start));
        }
    };

    // 3. Dispatch
    let request = build_request(&app, &parts, body, peer);
    let response = respond(&app, &request);
    Ok(finish(&app, &parts, peer, response, start))
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = headers.get(CONTENT_LENGTH)?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

fn build_request(app: &Application, parts: &Parts, body: Bytes, peer: SocketAddr) -> Request {
    let mut request = Request::new(parts.method.clone(), parts.uri.path());
    request.query = parts
        .uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    request.session_token = app.state.sessions.token_from_headers(&parts.headers);
    request.headers = parts.headers.clone();
    request.body = body;
    request.remote_addr = Some(peer);
    request
}

/// Dispatch with the client's session and attach the updated session cookie.
pub fn respond(app: &Application, request: &Request) -> Response<Full<Bytes>> {
    let sessions = &app.state.sessions;
    let mut session = sessions.decode(request.session_token.as_deref());
    let mut response = app.router.dispatch(&app.state, request, &mut session);

    match sessions.set_cookie(&session) {
        Ok(Some(cookie)) => match HeaderValue::from_str(&cookie.to_header_value()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => logger::log_error(&format!("Invalid session cookie header: {e}")),
        },
        Ok(None) => {}
        Err(e) => logger::log_error(&format!("Failed to encode session: {e}")),
    }
    response
}

/// Add the Server header and write the access log line
fn finish(
    app: &Application,
    parts: &Parts,
    peer: SocketAddr,
    mut response: Response<Full<Bytes>>,
    start: Instant,
) -> Response<Full<Bytes>> {
    let config = &app.state.config;
    if let Ok(value) = HeaderValue::from_str(&config.http.server_name) {
        response.headers_mut().insert(SERVER, value);
    }

    if config.logging.access_log {
        let mut entry = AccessLogEntry::new(
            peer.to_string(),
            parts.method.to_string(),
            parts.uri.path().to_string(),
        )
        .with_request_head(parts.version, &parts.headers);
        entry.query = parts.uri.query().map(ToString::to_string);
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &config.logging.access_log_format);
    }
    response
}
