// Error page handlers for 404 and 500

use askama::Template;
use chrono::Utc;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

use crate::config::AppState;
use crate::http;
use crate::routing::ErrorCondition;
use crate::templates::ErrorPage;

fn render_error_page(page: &ErrorPage, status: StatusCode) -> Response<Full<Bytes>> {
    match page.render() {
        Ok(body) => http::build_html_response(body, status),
        Err(e) => {
            crate::logger::log_error(&format!("Failed to render error page: {e}"));
            http::build_error_response(status, &page.description)
        }
    }
}

pub fn page_not_found(condition: &ErrorCondition, _app: &AppState) -> Response<Full<Bytes>> {
    let page = ErrorPage {
        code: condition.status.as_u16(),
        name: condition.name().to_string(),
        description: condition.message.clone(),
        current_time: Some(Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    };
    render_error_page(&page, StatusCode::NOT_FOUND)
}

pub fn internal_server_error(condition: &ErrorCondition, _app: &AppState) -> Response<Full<Bytes>> {
    let page = ErrorPage {
        code: condition.status.as_u16(),
        name: condition.name().to_string(),
        description: condition.message.clone(),
        current_time: None,
    };
    render_error_page(&page, StatusCode::INTERNAL_SERVER_ERROR)
}
