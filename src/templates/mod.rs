//! Compiled page and mail templates (files under `templates/`)

use askama::Template;

use crate::forms::FormView;
use crate::session::Flash;

/// Values every page extending `base.html` needs
#[derive(Debug, Clone)]
pub struct Layout {
    pub app_name: String,
    pub flashes: Vec<Flash>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub layout: Layout,
    pub user: String,
}

#[derive(Template)]
#[template(path = "herdado.html")]
pub struct HerdadoPage {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "form.html")]
pub struct FormPage {
    pub layout: Layout,
    /// Name stored by the last valid submission
    pub name: Option<String>,
    pub form: FormView,
}

#[derive(Template)]
#[template(path = "user.html")]
pub struct UserPage {
    pub layout: Layout,
    pub form: FormView,
}

#[derive(Template)]
#[template(path = "custom_error_page.html")]
pub struct ErrorPage {
    pub code: u16,
    pub name: String,
    pub description: String,
    pub current_time: Option<String>,
}

/// A mail with a plain text and an HTML body
pub trait MailTemplate {
    fn render_text(&self) -> Result<String, askama::Error>;
    fn render_html(&self) -> Result<String, askama::Error>;
}

#[derive(Template)]
#[template(path = "mail/new_user.txt")]
struct NewUserText<'a> {
    username: &'a str,
}

#[derive(Template)]
#[template(path = "mail/new_user.html")]
struct NewUserHtml<'a> {
    username: &'a str,
}

/// Sent to the administrator when an unknown name signs in
pub struct NewUserMail {
    pub username: String,
}

impl MailTemplate for NewUserMail {
    fn render_text(&self) -> Result<String, askama::Error> {
        NewUserText {
            username: &self.username,
        }
        .render()
    }

    fn render_html(&self) -> Result<String, askama::Error> {
        NewUserHtml {
            username: &self.username,
        }
        .render()
    }
}
