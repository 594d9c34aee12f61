//! Cookie header parsing and `Set-Cookie` building

use std::fmt::Write;

/// `SameSite` attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
}

/// A cookie to send back in a `Set-Cookie` header
#[derive(Debug, Clone)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl SetCookie {
    /// Cookie scoped to the whole site (`Path=/`), like most frameworks default to
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: Some("/".to_string()),
            max_age: None,
            http_only: false,
            same_site: None,
        }
    }

    /// Cookie that tells the client to forget `name`
    pub fn expired(name: impl Into<String>) -> Self {
        Self {
            max_age: Some(0),
            ..Self::new(name, "")
        }
    }

    #[must_use]
    pub const fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    #[must_use]
    pub const fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if self.max_age == Some(0) {
            out.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
        }
        if let Some(max_age) = self.max_age {
            let _ = write!(out, "; Max-Age={max_age}");
        }
        if let Some(path) = &self.path {
            let _ = write!(out, "; Path={path}");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        match self.same_site {
            Some(SameSite::Strict) => out.push_str("; SameSite=Strict"),
            Some(SameSite::Lax) => out.push_str("; SameSite=Lax"),
            None => {}
        }
        out
    }
}

/// Parse a `Cookie` request header into (name, value) pairs.
///
/// Malformed pairs (no `=`, empty name) are skipped.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"');
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Find one cookie by name in a `Cookie` header
pub fn find_cookie(header: &str, name: &str) -> Option<String> {
    parse_cookie_header(header)
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_cookie() {
        assert_eq!(SetCookie::new("Key", "value").to_header_value(), "Key=value; Path=/");
    }

    #[test]
    fn test_session_style_cookie() {
        let cookie = SetCookie::new("session", "abc.def")
            .http_only()
            .same_site(SameSite::Lax);
        assert_eq!(
            cookie.to_header_value(),
            "session=abc.def; Path=/; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_expired_cookie() {
        let value = SetCookie::expired("session").to_header_value();
        assert!(value.starts_with("session=; Expires=Thu, 01 Jan 1970"));
        assert!(value.contains("Max-Age=0"));
    }

    #[test]
    fn test_parse_cookie_header() {
        let pairs = parse_cookie_header("Key=value; session=\"a.b\";  broken; =x; empty=");
        assert_eq!(
            pairs,
            vec![
                ("Key".to_string(), "value".to_string()),
                ("session".to_string(), "a.b".to_string()),
                ("empty".to_string(), String::new()),
            ]
        );
        assert_eq!(find_cookie("a=1; b=2", "b"), Some("2".to_string()));
        assert_eq!(find_cookie("a=1", "b"), None);
    }
}
