//! ログイン・ログアウト・認証コールバック
//!
//! 認証後の遷移先は必ず [`sanitize_admin_redirect`] を通す。

use std::sync::Arc;

use log::{info, warn};
use serde::Deserialize;
use tera::Context;

use crate::audit::AuditAction;
use crate::auth::{clear_session_cookie, session_cookie, Session, SESSION_COOKIE};
use crate::common::{Request, Response, ResponseBuilder};
use crate::content::BackendError;
use crate::error::Error;
use crate::handler::{async_action, async_get, async_post};
use crate::redirect::sanitize_admin_redirect;
use crate::ui::views::{notice, Field, InputKind};
use crate::ui::Page;
use crate::AppBuilder;

use super::{bind, bind_body, AppState};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";
const MISSING_CREDENTIALS: &str = "Enter your email and password.";
const NOT_AN_ADMIN: &str = "This account does not have access to the admin area.";
const INVALID_LINK: &str = "That sign-in link is invalid or has expired.";

/// `POST /login` のフォーム
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

pub fn register(builder: AppBuilder, state: &Arc<AppState>) -> AppBuilder {
    builder
        .handler(async_get("/login", bind(state, login_page)))
        .handler(async_post("/login", bind_body(state, login)))
        .handler(async_action("/logout", bind(state, logout)))
        .handler(async_get("/auth/callback", bind(state, callback)))
}

/// `?error=` の値を表示用メッセージにする
fn error_message(code: &str) -> Option<&'static str> {
    match code {
        "invalid" => Some(INVALID_CREDENTIALS),
        "forbidden" => Some(NOT_AN_ADMIN),
        "callback" => Some(INVALID_LINK),
        _ => None,
    }
}

fn login_response(
    state: &AppState,
    status: u16,
    next: &str,
    email: &str,
    error: Option<&str>,
    info: Option<&str>,
) -> Result<Response, Error> {
    let banner = match (error, info) {
        (Some(message), _) => Some(notice(message, true)),
        (None, Some(message)) => Some(notice(message, false)),
        (None, None) => None,
    };
    let fields = vec![
        Field::input("email", "Email", email, InputKind::Email).required(),
        Field::input("password", "Password", "", InputKind::Password).required(),
    ];
    let mut context = Context::new();
    context.insert("notice", &banner);
    context.insert("next", next);
    context.insert("fields", &fields);
    let html = state
        .templates
        .public("public/login.html", &Page::new("Sign in", "/login"), context)?;
    Ok(ResponseBuilder::new(status)
        .cache_control("no-store")
        .html(html)
        .build())
}

/// セッションを開始してクッキーを設定し、`next` へ遷移する
async fn start_session(state: &AppState, session: &Session, next: &str) -> Result<Response, Error> {
    let cookie = session_cookie(session, state.config.secure_cookies)?;
    state
        .audit
        .record(Some(&session.user), AuditAction::SignIn, "session", Some(&session.user.id), None)
        .await;
    info!("Admin {} signed in", session.user.id);
    Ok(Response::redirect(next).with_cookie(&cookie))
}

/// 許可リスト外のアカウントはすぐにトークンを失効させる
async fn reject_non_admin(state: &AppState, session: &Session) {
    warn!("Sign-in by non-admin account {}", session.user.id);
    if let Err(e) = state.auth.sign_out(&session.access_token).await {
        warn!("Failed to revoke session for {}: {}", session.user.id, e);
    }
}

/// `GET /login`（ログイン済みなら `next` へ）
pub async fn login_page(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let next = sanitize_admin_redirect(req.query("next"));

    if let Some(token) = req.cookie(SESSION_COOKIE) {
        if let Ok(user) = state.auth.get_user(&token).await {
            if state.config.is_admin_email(&user.email) {
                return Ok(Response::redirect(next));
            }
        }
    }

    let error = req.query("error").and_then(error_message);
    let info = req
        .query("notice")
        .filter(|n| *n == "signed_out")
        .map(|_| "You have been signed out.");
    login_response(&state, 200, &next, "", error, info)
}

/// `POST /login`
pub async fn login(state: Arc<AppState>, _req: Request, form: LoginForm) -> Result<Response, Error> {
    let next = sanitize_admin_redirect(form.next.as_deref());
    let email = form.email.trim();
    if email.is_empty() || form.password.is_empty() {
        return login_response(&state, 422, &next, email, Some(MISSING_CREDENTIALS), None);
    }

    let session = match state.auth.sign_in(email, &form.password).await {
        Ok(session) => session,
        Err(BackendError::Unauthorized(_)) => {
            return login_response(&state, 401, &next, email, Some(INVALID_CREDENTIALS), None);
        }
        Err(e) => return Err(e.into()),
    };

    if !state.config.is_admin_email(&session.user.email) {
        reject_non_admin(&state, &session).await;
        return login_response(&state, 403, &next, email, Some(NOT_AN_ADMIN), None);
    }
    start_session(&state, &session, &next).await
}

/// `POST /logout`
pub async fn logout(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    if let Some(token) = req.cookie(SESSION_COOKIE) {
        let user = state.auth.get_user(&token).await.ok();
        if let Err(e) = state.auth.sign_out(&token).await {
            warn!("Sign-out failed: {}", e);
        }
        if let Some(user) = user {
            state
                .audit
                .record(Some(&user), AuditAction::SignOut, "session", Some(&user.id), None)
                .await;
        }
    }
    let cookie = clear_session_cookie(state.config.secure_cookies)?;
    Ok(Response::redirect("/login?notice=signed_out").with_cookie(&cookie))
}

/// `GET /auth/callback?code=...&next=...`
pub async fn callback(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let next = sanitize_admin_redirect(req.query("next"));
    let code = match req.query("code").map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => code,
        None => return Ok(Response::redirect("/login?error=callback")),
    };

    let session = match state.auth.exchange_code(code).await {
        Ok(session) => session,
        Err(BackendError::Unauthorized(_)) | Err(BackendError::NotFound(_)) => {
            warn!("Auth callback with an invalid code");
            return Ok(Response::redirect("/login?error=callback"));
        }
        Err(e) => return Err(e.into()),
    };

    if !state.config.is_admin_email(&session.user.email) {
        reject_non_admin(&state, &session).await;
        return Ok(Response::redirect("/login?error=forbidden"));
    }
    start_session(&state, &session, &next).await
}
