// Session cookie codec
// Cookie value is hex(json) "." hex(hmac-sha256(secret, hex(json)))

use hmac::{Hmac, Mac};
use hyper::header::{HeaderMap, COOKIE};
use serde_json::Value;
use sha2::Sha256;
use std::collections::BTreeMap;
use thiserror::Error;

use super::Session;
use crate::http::{find_cookie, SameSite, SetCookie};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session cookie is malformed")]
    Malformed,

    #[error("session signature does not match")]
    BadSignature,

    #[error("session payload is not valid JSON: {0}")]
    Payload(String),

    #[error("invalid signing key: {0}")]
    Key(String),
}

/// Signs and verifies session cookies with the application secret
#[derive(Clone)]
pub struct SessionCodec {
    secret: Vec<u8>,
    cookie_name: String,
}

impl SessionCodec {
    pub fn new(secret: &str, cookie_name: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            cookie_name: cookie_name.to_string(),
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn mac(&self) -> Result<HmacSha256, SessionError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| SessionError::Key(e.to_string()))
    }

    pub fn encode(&self, session: &Session) -> Result<String, SessionError> {
        let json = serde_json::to_vec(session.values())
            .map_err(|e| SessionError::Payload(e.to_string()))?;
        let payload = hex::encode(json);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    pub fn try_decode(&self, token: &str) -> Result<Session, SessionError> {
        let (payload, signature) = token.split_once('.').ok_or(SessionError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| SessionError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;

        let json = hex::decode(payload).map_err(|_| SessionError::Malformed)?;
        let values: BTreeMap<String, Value> =
            serde_json::from_slice(&json).map_err(|e| SessionError::Payload(e.to_string()))?;
        Ok(Session::from_values(values))
    }

    /// Decode a token, falling back to an empty session on any problem
    pub fn decode(&self, token: Option<&str>) -> Session {
        let Some(token) = token else {
            return Session::default();
        };
        self.try_decode(token).unwrap_or_else(|e| {
            crate::logger::log_debug(&format!("[Session] Discarding cookie: {e}"));
            Session::default()
        })
    }

    /// Session cookie value from the request headers
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|header| find_cookie(header, &self.cookie_name))
    }

    /// `Set-Cookie` value to send back, or `None` when the session is unchanged
    pub fn set_cookie(&self, session: &Session) -> Result<Option<SetCookie>, SessionError> {
        if !session.is_modified() {
            return Ok(None);
        }
        if session.is_empty() {
            return Ok(Some(SetCookie::expired(self.cookie_name.clone())));
        }
        let cookie = SetCookie::new(self.cookie_name.clone(), self.encode(session)?)
            .http_only()
            .same_site(SameSite::Lax);
        Ok(Some(cookie))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn codec() -> SessionCodec {
        SessionCodec::new("test-secret", "session")
    }

    #[test]
    fn test_signed_round_trip() {
        let mut session = Session::default();
        session.insert("name", "Alice");
        let token = codec().encode(&session).unwrap();

        let decoded = codec().try_decode(&token).unwrap();
        assert_eq!(decoded.get_str("name"), Some("Alice"));
        assert!(!decoded.is_modified());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let mut session = Session::default();
        session.insert("name", "Alice");
        let token = codec().encode(&session).unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let mut forged = Session::default();
        forged.insert("name", "admin");
        let forged_payload = hex::encode(serde_json::to_vec(forged.values()).unwrap());
        let forged_token = format!("{forged_payload}.{signature}");

        assert!(matches!(
            codec().try_decode(&forged_token),
            Err(SessionError::BadSignature)
        ));
        assert!(codec().decode(Some(&forged_token)).is_empty());
    }

    #[test]
    fn test_other_secret_rejected() {
        let mut session = Session::default();
        session.insert("name", "Alice");
        let token = SessionCodec::new("other", "session").encode(&session).unwrap();
        assert!(codec().try_decode(&token).is_err());
    }

    #[test]
    fn test_garbage_gives_empty_session() {
        assert!(matches!(codec().try_decode("nodot"), Err(SessionError::Malformed)));
        assert!(codec().decode(Some("zz.zz")).is_empty());
        assert!(codec().decode(None).is_empty());
    }

    #[test]
    fn test_token_from_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("Key=value"));
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; session=abc.def"));
        assert_eq!(codec().token_from_headers(&headers), Some("abc.def".to_string()));
    }

    #[test]
    fn test_set_cookie_only_when_modified() {
        let untouched = Session::default();
        assert!(codec().set_cookie(&untouched).unwrap().is_none());

        let mut session = Session::default();
        session.insert("name", "Alice");
        let cookie = codec().set_cookie(&session).unwrap().unwrap();
        assert_eq!(cookie.name, "session");
        assert!(cookie.http_only);

        session.clear();
        let cookie = codec().set_cookie(&session).unwrap().unwrap();
        assert_eq!(cookie.max_age, Some(0));
    }
}
