// Page handlers
// Each one takes the request context and returns a reply or a handler error.

use askama::Template;
use chrono::Utc;
use hyper::header::{HeaderValue, SET_COOKIE};
use hyper::{Method, StatusCode};
use std::sync::Arc;

use crate::config::{AppState, MailConfig};
use crate::forms::{self, csrf, FieldErrors, FormView};
use crate::http::{self, SetCookie};
use crate::logger;
use crate::mail::{self, Mailer};
use crate::routing::{HandlerError, HandlerResult, Reply, RequestContext};
use crate::store::{Store, StoreError};
use crate::templates::{FormPage, HerdadoPage, IndexPage, Layout, NewUserMail, UserPage};

type Ctx<'a> = RequestContext<'a, AppState>;

/// Session name that does not get the greeting flash
const TRUSTED_NAME: &str = "okok";

const SESSION_NAME_KEY: &str = "name";

fn render(page: &impl Template) -> HandlerResult {
    let body = page.render().map_err(HandlerError::fault)?;
    Ok((body, StatusCode::OK).into())
}

/// Layout values; consumes the pending flashes
fn layout(ctx: &mut Ctx<'_>) -> Layout {
    Layout {
        app_name: ctx.app.config.app.name.clone(),
        flashes: ctx.session.take_flashes(),
    }
}

fn session_name(ctx: &Ctx<'_>) -> Option<String> {
    ctx.session.get_str(SESSION_NAME_KEY).map(ToString::to_string)
}

pub fn index(ctx: &mut Ctx<'_>) -> HandlerResult {
    let name = session_name(ctx);
    if name.as_deref() != Some(TRUSTED_NAME) {
        logger::log_debug(&format!("[View] Greeting flash for session name {name:?}"));
        ctx.session.flash("OK", "info");
    }
    let page = IndexPage {
        layout: layout(ctx),
        user: name.unwrap_or_else(|| "Stranger".to_string()),
    };
    render(&page)
}

pub fn home(ctx: &mut Ctx<'_>) -> HandlerResult {
    let year = ctx.params.require_int("year")?;
    let name = http::escape_html(ctx.params.require_string("name")?);
    Ok((format!("Happy new year ({year}), {name}"), StatusCode::OK).into())
}

/// Logs what a handler can see about the current request
pub fn global_variables(ctx: &mut Ctx<'_>) -> HandlerResult {
    ctx.locals
        .insert("started_at".to_string(), Utc::now().to_rfc3339());

    logger::log_info(&format!("Request host: {}", ctx.request.host().unwrap_or("-")));
    for (name, value) in &ctx.request.headers {
        logger::log_info(&format!(
            "Request header: {name}: {}",
            value.to_str().unwrap_or("<binary>")
        ));
    }
    logger::log_info(&format!("Request locals: {:?}", ctx.locals));
    logger::log_info(&format!("Current app: {}", ctx.app.config.app.name));
    let items: Vec<String> = ctx
        .session
        .items()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    logger::log_info(&format!("Session: [{}]", items.join(", ")));

    Ok(("Ready", StatusCode::OK).into())
}

pub fn set_cookie(ctx: &mut Ctx<'_>) -> HandlerResult {
    let mut response =
        http::build_html_response("This document carries a cookie!".to_string(), StatusCode::OK);
    let cookie = SetCookie::new("Key", "value").to_header_value();
    response.headers_mut().append(
        SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(HandlerError::fault)?,
    );
    if session_name(ctx).as_deref() != Some(TRUSTED_NAME) {
        ctx.session.flash("Strange name!", "message");
    }
    Ok(Reply::Response(response))
}

pub fn redirect(ctx: &mut Ctx<'_>) -> HandlerResult {
    Ok(http::build_redirect_response(&ctx.app.config.app.redirect_target).into())
}

pub fn abort_unless_known(ctx: &mut Ctx<'_>) -> HandlerResult {
    let id = ctx.params.require_int("id")?;
    if matches!(id, 1..=3) {
        Ok(("<h1>OK</h1>", StatusCode::OK).into())
    } else {
        Err(HandlerError::abort(StatusCode::NOT_FOUND, "Message"))
    }
}

pub fn template_user(ctx: &mut Ctx<'_>) -> HandlerResult {
    let user = ctx.params.require_string("user")?.to_string();
    let page = IndexPage {
        layout: layout(ctx),
        user,
    };
    render(&page)
}

pub fn herdado(ctx: &mut Ctx<'_>) -> HandlerResult {
    let page = HerdadoPage {
        layout: layout(ctx),
    };
    render(&page)
}

fn csrf_token(ctx: &mut Ctx<'_>) -> Option<String> {
    ctx.app
        .config
        .app
        .csrf_enabled
        .then(|| csrf::ensure_token(ctx.session))
}

/// GET renders the name form. POST validates it and, when valid, stores
/// the name in the session. Field values are never echoed back.
pub fn form(ctx: &mut Ctx<'_>) -> HandlerResult {
    let schema = forms::name_form();
    let mut errors = FieldErrors::default();

    if ctx.request.method == Method::POST {
        let pairs = ctx.request.form_pairs();
        let submitted = forms::collect_pairs(&pairs);
        let token_ok = !ctx.app.config.app.csrf_enabled
            || csrf::verify(
                ctx.session,
                submitted.get(csrf::FIELD_NAME).map(String::as_str),
            );

        match forms::validate(&schema, &pairs) {
            Ok(values) if token_ok => {
                let name = values.get("name").cloned().unwrap_or_default();
                logger::log_debug(&format!("[View] Form accepted for {name}"));
                ctx.session.insert(SESSION_NAME_KEY, name);
            }
            Ok(_) => {}
            Err(field_errors) => errors = field_errors,
        }
        if !token_ok {
            ctx.session.flash(csrf::MISSING_MESSAGE, "error");
        }
    }

    let token = csrf_token(ctx);
    let page = FormPage {
        name: session_name(ctx),
        form: FormView::new(&schema, &Default::default(), &errors, token),
        layout: layout(ctx),
    };
    render(&page)
}

/// GET renders the form. POST stores the submitted name, records the user
/// and sends the client back to `/`.
pub fn user_session(ctx: &mut Ctx<'_>) -> HandlerResult {
    if ctx.request.method != Method::POST {
        let token = csrf_token(ctx);
        let page = UserPage {
            form: FormView::empty(&forms::name_form(), token),
            layout: layout(ctx),
        };
        return render(&page);
    }

    let submitted = forms::collect_pairs(&ctx.request.form_pairs());
    let name = submitted.get("name").cloned().unwrap_or_default();
    ctx.session.flash("OK", "success");
    ctx.session.insert(SESSION_NAME_KEY, name.clone());
    record_user(ctx.app, &name);

    Ok(http::build_redirect_response("/").into())
}

/// Record a new name off the dispatch thread. The store commit syncs to
/// disk, so it runs on the blocking pool when a runtime is available.
/// The response never depends on the outcome.
fn record_user(app: &AppState, name: &str) {
    if name.is_empty() {
        return;
    }
    let store = app.store.clone();
    let mailer = Arc::clone(&app.mailer);
    let admin = app.config.app.admin_email.clone();
    let mail_config = app.config.mail.clone();
    let name = name.to_string();
    let job = move || {
        insert_and_notify(&store, mailer.as_ref(), admin.as_deref(), &mail_config, &name);
    };

    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => drop(runtime.spawn_blocking(job)),
        Err(_) => job(),
    }
}

/// Insert an unknown name into the store and tell the administrator.
/// A concurrent insert of the same name loses on the store's unique index.
fn insert_and_notify(
    store: &Store,
    mailer: &dyn Mailer,
    admin: Option<&str>,
    mail_config: &MailConfig,
    name: &str,
) {
    match store.user_by_username(name) {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(e) => {
            logger::log_warning(&format!("[View] User lookup failed: {e}"));
            return;
        }
    }
    match store.insert_user(name, None) {
        Ok(_) => {}
        Err(StoreError::Duplicate { .. }) => return,
        Err(e) => {
            logger::log_warning(&format!("[View] Could not record user {name}: {e}"));
            return;
        }
    }

    let Some(admin) = admin else {
        return;
    };
    let template = NewUserMail {
        username: name.to_string(),
    };
    if let Err(e) = mail::send_mail(mailer, mail_config, &[admin], "New User", &template) {
        logger::log_warning(&format!("[View] New user mail not queued: {e}"));
    }
}
