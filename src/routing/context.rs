//! Request context module
//!
//! Everything a handler sees is passed to it explicitly: the request, the
//! typed path parameters, the mutable session and the shared application state.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HOST};
use hyper::{Method, Response, StatusCode};
use std::collections::BTreeMap;
use std::net::SocketAddr;

use super::error::HandlerError;
use crate::http;
use crate::session::Session;

/// Incoming request, fully buffered
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Raw path, still percent-encoded
    pub path: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Bytes,
    /// Value of the session cookie, if the client sent one
    pub session_token: Option<String>,
    pub remote_addr: Option<SocketAddr>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: Bytes::new(),
            session_token: None,
            remote_addr: None,
        }
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn host(&self) -> Option<&str> {
        self.headers.get(HOST).and_then(|v| v.to_str().ok())
    }

    /// Decode an `application/x-www-form-urlencoded` body
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(&self.body).into_owned().collect()
    }
}

/// A coerced path parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    String(String),
}

/// Path parameters in pattern order
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: Vec<(String, ParamValue)>,
}

impl Params {
    pub(super) fn push(&mut self, name: String, value: ParamValue) {
        self.values.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[allow(dead_code)]
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ParamValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Like [`Params::int`], but a missing parameter is a handler fault
    pub fn require_int(&self, name: &str) -> Result<i64, HandlerError> {
        self.int(name)
            .ok_or_else(|| HandlerError::Fault(format!("missing int path parameter '{name}'")))
    }

    /// Like [`Params::string`], but a missing parameter is a handler fault
    pub fn require_string(&self, name: &str) -> Result<&str, HandlerError> {
        self.string(name)
            .ok_or_else(|| HandlerError::Fault(format!("missing string path parameter '{name}'")))
    }

    #[allow(dead_code)] // Used in tests
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Per-request context handed to every handler
pub struct RequestContext<'a, S> {
    pub request: &'a Request,
    pub params: Params,
    pub session: &'a mut Session,
    pub app: &'a S,
    /// Scratch values that live for one request only
    pub locals: BTreeMap<String, String>,
}

/// Successful handler output
#[derive(Debug)]
pub enum Reply {
    /// HTML body with a status code
    Body { body: String, status: StatusCode },
    /// Fully built response, headers included
    Response(Response<Full<Bytes>>),
}

impl Reply {
    pub fn into_response(self) -> Response<Full<Bytes>> {
        match self {
            Self::Body { body, status } => http::build_html_response(body, status),
            Self::Response(response) => response,
        }
    }
}

impl From<(String, StatusCode)> for Reply {
    fn from((body, status): (String, StatusCode)) -> Self {
        Self::Body { body, status }
    }
}

impl From<(&str, StatusCode)> for Reply {
    fn from((body, status): (&str, StatusCode)) -> Self {
        Self::Body {
            body: body.to_string(),
            status,
        }
    }
}

impl From<Response<Full<Bytes>>> for Reply {
    fn from(response: Response<Full<Bytes>>) -> Self {
        Self::Response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_query_and_headers() {
        let mut req = Request::new(Method::GET, "/global_variables");
        req.query = vec![("page".to_string(), "2".to_string())];
        req.headers
            .insert("host", HeaderValue::from_static("localhost:5000"));
        req.headers
            .insert("x-trace", HeaderValue::from_static("abc"));

        assert_eq!(req.query_value("page"), Some("2"));
        assert_eq!(req.query_value("missing"), None);
        assert_eq!(req.host(), Some("localhost:5000"));
        // Header names are case-insensitive
        assert_eq!(req.header("X-Trace"), Some("abc"));
    }

    #[test]
    fn test_form_pairs() {
        let mut req = Request::new(Method::POST, "/usersession");
        req.body = Bytes::from_static(b"name=Ana+Maria&email=a%40b.io");
        let pairs = req.form_pairs();
        assert_eq!(pairs[0], ("name".to_string(), "Ana Maria".to_string()));
        assert_eq!(pairs[1], ("email".to_string(), "a@b.io".to_string()));
    }

    #[test]
    fn test_params_accessors() {
        let mut params = Params::default();
        params.push("year".into(), ParamValue::Int(2024));
        params.push("name".into(), ParamValue::String("Alice".into()));

        assert_eq!(params.int("year"), Some(2024));
        assert_eq!(params.string("year"), None);
        assert_eq!(params.require_string("name").unwrap(), "Alice");
        assert!(params.require_int("name").is_err());
        assert_eq!(params.iter().count(), 2);
    }

    #[test]
    fn test_pair_reply_becomes_html_response() {
        let reply: Reply = ("<h1>OK</h1>", StatusCode::OK).into();
        let response = reply.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/html; charset=utf-8"
        );
    }
}
