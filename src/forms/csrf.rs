// CSRF token kept in the session and echoed back as a hidden field

use rand::RngCore;

use crate::session::Session;

pub const SESSION_KEY: &str = "csrf_token";
pub const FIELD_NAME: &str = "csrf_token";
pub const MISSING_MESSAGE: &str = "The CSRF token is missing or invalid.";

/// Return the session's token, creating one on first use
pub fn ensure_token(session: &mut Session) -> String {
    if let Some(token) = session.get_str(SESSION_KEY) {
        return token.to_string();
    }
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    session.insert(SESSION_KEY, token.clone());
    token
}

/// Whether the submitted token matches the one in the session
pub fn verify(session: &Session, submitted: Option<&str>) -> bool {
    match (session.get_str(SESSION_KEY), submitted) {
        (Some(expected), Some(given)) => !expected.is_empty() && expected == given,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_stable_per_session() {
        let mut session = Session::default();
        let first = ensure_token(&mut session);
        assert_eq!(first.len(), 40);
        assert_eq!(ensure_token(&mut session), first);
        assert!(session.is_modified());
    }

    #[test]
    fn test_verify() {
        let mut session = Session::default();
        assert!(!verify(&session, Some("")));
        let token = ensure_token(&mut session);
        assert!(verify(&session, Some(&token)));
        assert!(!verify(&session, Some("forged")));
        assert!(!verify(&session, None));
    }
}
