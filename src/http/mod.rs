//! HTTP protocol layer module
//!
//! Response builders and cookie handling, independent of the views.

pub mod cookie;
pub mod response;

// Re-export commonly used items
pub use cookie::{find_cookie, SameSite, SetCookie};
pub use response::{
    build_400_response, build_413_response, build_error_response, build_html_response,
    build_redirect_response, build_text_response, escape_html,
};
