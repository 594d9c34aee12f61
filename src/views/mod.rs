//! Application views
//!
//! The route table is built here, once, at startup. Routes are tried in
//! registration order and the first pattern that fits wins.

mod errors;
mod pages;

use hyper::{Method, StatusCode};

use crate::config::AppState;
use crate::routing::{Router, RouterError};

/// Build the application's route table and error handlers
pub fn build_router() -> Result<Router<AppState>, RouterError> {
    let mut router = Router::new();
    router.register(Method::GET, "/", pages::index)?;
    router.register(Method::GET, "/home/{year:int}/{name:string}", pages::home)?;
    router.register(Method::GET, "/global_variables", pages::global_variables)?;
    router.register(Method::GET, "/setcookie", pages::set_cookie)?;
    router.register(Method::GET, "/redirect", pages::redirect)?;
    router.register(Method::GET, "/abort/{id:int}", pages::abort_unless_known)?;
    router.register(Method::GET, "/template/{user:string}", pages::template_user)?;
    router.register(Method::GET, "/h", pages::herdado)?;
    router.register_many(&[Method::GET, Method::POST], "/form", pages::form)?;
    router.register_many(&[Method::GET, Method::POST], "/usersession", pages::user_session)?;

    router.error_handler(StatusCode::NOT_FOUND, errors::page_not_found)?;
    router.error_handler(StatusCode::INTERNAL_SERVER_ERROR, errors::internal_server_error)?;
    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::forms::csrf;
    use crate::mail::RecordingMailer;
    use crate::routing::{HandlerError, Request, RequestContext};
    use crate::session::Session;
    use crate::store::Store;
    use http_body_util::BodyExt;
    use hyper::body::Bytes;
    use hyper::header::{HeaderMap, LOCATION, SET_COOKIE};
    use std::sync::Arc;

    struct Harness {
        router: Router<AppState>,
        state: AppState,
        mailer: Arc<RecordingMailer>,
    }

    fn harness() -> Harness {
        let mailer = Arc::new(RecordingMailer::default());
        let store = Store::open_in_memory().unwrap();
        let state = AppState::new(test_config(), store, mailer.clone());
        Harness {
            router: build_router().unwrap(),
            state,
            mailer,
        }
    }

    struct Outcome {
        status: StatusCode,
        headers: HeaderMap,
        body: String,
    }

    impl Harness {
        async fn call(&self, request: &Request, session: &mut Session) -> Outcome {
            let response = self.router.dispatch(&self.state, request, session);
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            Outcome {
                status,
                headers,
                body: String::from_utf8(bytes.to_vec()).unwrap(),
            }
        }

        async fn get(&self, path: &str) -> Outcome {
            self.call(&Request::new(Method::GET, path), &mut Session::default())
                .await
        }
    }

    /// Poll until the recording step running on the blocking pool is visible
    async fn eventually(check: impl Fn() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    fn post(path: &str, body: &str) -> Request {
        let mut request = Request::new(Method::POST, path);
        request.body = Bytes::from(body.to_string());
        request
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut router = build_router().unwrap();
        let err = router
            .register(Method::GET, "/home/{year:int}/{name:string}", pages::home)
            .unwrap_err();
        assert!(matches!(err, RouterError::DuplicateRoute { .. }));
    }

    #[test]
    fn test_route_table() {
        let router = build_router().unwrap();
        assert_eq!(router.routes().count(), 12);
    }

    #[tokio::test]
    async fn test_index_repeated() {
        let h = harness();
        let mut session = Session::default();
        for _ in 0..3 {
            let out = h.call(&Request::new(Method::GET, "/"), &mut session).await;
            assert_eq!(out.status, StatusCode::OK);
            assert!(out.body.contains("Hello, Stranger!"));
            assert!(out.body.contains("flash-info"));
        }
    }

    #[tokio::test]
    async fn test_index_trusted_name_skips_flash() {
        let h = harness();
        let mut session = Session::default();
        session.insert("name", "okok");
        let out = h.call(&Request::new(Method::GET, "/"), &mut session).await;
        assert_eq!(out.status, StatusCode::OK);
        assert!(out.body.contains("Hello, okok!"));
        assert!(!out.body.contains("flash-info"));
    }

    #[tokio::test]
    async fn test_home() {
        let h = harness();
        let out = h.get("/home/2024/Alice").await;
        assert_eq!(out.status, StatusCode::OK);
        assert_eq!(out.body, "Happy new year (2024), Alice");

        let out = h.get("/home/abc/Alice").await;
        assert_eq!(out.status, StatusCode::NOT_FOUND);
        assert!(out.body.contains("404 Not Found"));
        assert!(out.body.contains("UTC"));

        for path in ["/home/-5/Alice", "/home/%2D5/Alice", "/home/2024/"] {
            let out = h.get(path).await;
            assert_eq!(out.status, StatusCode::NOT_FOUND, "{path}");
        }
    }

    #[tokio::test]
    async fn test_template_needs_a_user() {
        let h = harness();
        assert_eq!(h.get("/template/").await.status, StatusCode::NOT_FOUND);
        assert_eq!(h.get("/template/Ana").await.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_abort() {
        let h = harness();
        for id in ["1", "2", "3"] {
            let out = h.get(&format!("/abort/{id}")).await;
            assert_eq!(out.status, StatusCode::OK);
            assert_eq!(out.body, "<h1>OK</h1>");
        }
        for id in ["0", "4", "99"] {
            let out = h.get(&format!("/abort/{id}")).await;
            assert_eq!(out.status, StatusCode::NOT_FOUND);
            assert!(out.body.contains("Message"));
        }
        // Unsigned ints only, so these never reach the handler
        for id in ["one", "-1", "%2D1"] {
            let out = h.get(&format!("/abort/{id}")).await;
            assert_eq!(out.status, StatusCode::NOT_FOUND);
            assert!(!out.body.contains("Message"));
        }
    }

    #[tokio::test]
    async fn test_redirect_is_stable() {
        let h = harness();
        for _ in 0..2 {
            let out = h.get("/redirect").await;
            assert_eq!(out.status, StatusCode::FOUND);
            assert_eq!(out.headers[LOCATION], "https://www.youtube.com.br");
        }
    }

    #[tokio::test]
    async fn test_setcookie() {
        let h = harness();
        let mut session = Session::default();
        let out = h
            .call(&Request::new(Method::GET, "/setcookie"), &mut session)
            .await;
        assert_eq!(out.status, StatusCode::OK);
        assert_eq!(out.body, "This document carries a cookie!");
        let cookie = out.headers[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("Key=value"));
        assert_eq!(session.take_flashes()[0].message, "Strange name!");
    }

    #[tokio::test]
    async fn test_template_escapes() {
        let h = harness();
        let out = h.get("/template/%3Cb%3E").await;
        assert_eq!(out.status, StatusCode::OK);
        assert!(out.body.contains("Hello, &lt;b&gt;!"));
    }

    #[tokio::test]
    async fn test_herdado_and_globals() {
        let h = harness();
        let out = h.get("/h").await;
        assert_eq!(out.status, StatusCode::OK);
        assert!(out.body.contains("Inherited page"));

        let out = h.get("/global_variables").await;
        assert_eq!(out.status, StatusCode::OK);
        assert_eq!(out.body, "Ready");
    }

    #[tokio::test]
    async fn test_unmatched_and_wrong_method() {
        let h = harness();
        let out = h.get("/nowhere").await;
        assert_eq!(out.status, StatusCode::NOT_FOUND);
        assert!(out.body.contains("The requested URL was not found on the server."));

        let out = h
            .call(&Request::new(Method::POST, "/"), &mut Session::default())
            .await;
        assert_eq!(out.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_fault_renders_500_without_detail() {
        let mut h = harness();
        h.router
            .register(Method::GET, "/boom", |_: &mut RequestContext<'_, AppState>| {
                Err(HandlerError::fault("database password is hunter2"))
            })
            .unwrap();
        let out = h.get("/boom").await;
        assert_eq!(out.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(out.body.contains("500 Internal Server Error"));
        assert!(!out.body.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_usersession_get_renders_form() {
        let h = harness();
        let out = h.get("/usersession").await;
        assert_eq!(out.status, StatusCode::OK);
        assert!(out.body.contains("name=\"name\""));
        assert!(out.body.contains("name=\"csrf_token\""));
    }

    #[tokio::test]
    async fn test_usersession_post_stores_and_redirects() {
        let h = harness();
        let mut session = Session::default();
        let out = h.call(&post("/usersession", "name=Alice"), &mut session).await;

        assert_eq!(out.status, StatusCode::FOUND);
        assert_eq!(out.headers[LOCATION], "/");
        assert_eq!(session.get_str("name"), Some("Alice"));
        assert_eq!(session.take_flashes()[0].category, "success");

        eventually(|| h.mailer.sent().len() == 1).await;
        assert!(h.state.store.user_by_username("Alice").unwrap().is_some());
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["admin@example.com"]);
        assert!(sent[0].text.contains("Alice"));
    }

    #[tokio::test]
    async fn test_usersession_known_user_not_mailed_twice() {
        let h = harness();
        for _ in 0..2 {
            let out = h
                .call(&post("/usersession", "name=Bob"), &mut Session::default())
                .await;
            assert_eq!(out.status, StatusCode::FOUND);
            eventually(|| h.mailer.sent().len() == 1).await;
        }
        // Let the second recording step finish before counting again
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(h.mailer.sent().len(), 1);
    }

    #[test]
    fn test_usersession_records_inline_without_runtime() {
        let h = harness();
        let mut session = Session::default();
        let response = h
            .router
            .dispatch(&h.state, &post("/usersession", "name=Carol"), &mut session);
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(h.state.store.user_by_username("Carol").unwrap().is_some());
        assert_eq!(h.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_usersession_redirects_before_recording_settles() {
        let h = harness();
        let out = h
            .call(&post("/usersession", "name=Dana"), &mut Session::default())
            .await;
        // The reply does not wait on the store; the row shows up afterwards
        assert_eq!(out.status, StatusCode::FOUND);
        eventually(|| matches!(h.state.store.user_by_username("Dana"), Ok(Some(_)))).await;
    }

    #[tokio::test]
    async fn test_usersession_empty_name_not_recorded() {
        let h = harness();
        let out = h
            .call(&post("/usersession", "name="), &mut Session::default())
            .await;
        assert_eq!(out.status, StatusCode::FOUND);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_form_get_issues_token() {
        let h = harness();
        let mut session = Session::default();
        let out = h.call(&Request::new(Method::GET, "/form"), &mut session).await;
        assert_eq!(out.status, StatusCode::OK);
        let token = session.get_str(csrf::SESSION_KEY).unwrap().to_string();
        assert!(out.body.contains(&token));
    }

    #[tokio::test]
    async fn test_form_post_valid() {
        let h = harness();
        let mut session = Session::default();
        let token = csrf::ensure_token(&mut session);
        let body = format!(
            "csrf_token={token}&name=Alice&email=alice%40example.com&password=pw&confirm_password=pw&submit=Submit"
        );
        let out = h.call(&post("/form", &body), &mut session).await;
        assert_eq!(out.status, StatusCode::OK);
        assert_eq!(session.get_str("name"), Some("Alice"));
        assert!(out.body.contains("Hello, Alice!"));
        assert!(!out.body.contains("value=\"alice@example.com\""));
    }

    #[tokio::test]
    async fn test_form_post_invalid_shows_errors() {
        let h = harness();
        let mut session = Session::default();
        let token = csrf::ensure_token(&mut session);
        let body = format!("csrf_token={token}&name=&email=nope&password=a&confirm_password=b");
        let out = h.call(&post("/form", &body), &mut session).await;
        assert_eq!(out.status, StatusCode::OK);
        assert!(session.get_str("name").is_none());
        assert!(out.body.contains("This field is required."));
        assert!(out.body.contains("Invalid email address."));
        assert!(out.body.contains("Both password fields must be equal!"));
    }

    #[tokio::test]
    async fn test_form_post_without_token() {
        let h = harness();
        let mut session = Session::default();
        let body = "name=Alice&email=alice%40example.com&password=pw&confirm_password=pw";
        let out = h.call(&post("/form", body), &mut session).await;
        assert_eq!(out.status, StatusCode::OK);
        assert!(session.get_str("name").is_none());
        assert!(out.body.contains(csrf::MISSING_MESSAGE));
    }
}
