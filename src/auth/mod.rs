//! 管理者の認証
//!
//! 認証そのものは外部の認証API（[`RestAuthProvider`]）またはプロセス内の
//! [`MemoryAuthProvider`] に任せ、このサイトはアクセストークンを
//! セッションクッキーに保持するだけにする。

pub mod guard;
pub mod memory;
pub mod rest;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::{Cookie, SameSite};
use crate::content::BackendError;
use crate::error::Error;

pub use guard::AdminGuard;
pub use memory::MemoryAuthProvider;
pub use rest::RestAuthProvider;

/// セッションクッキー名
pub const SESSION_COOKIE: &str = "dental_session";

/// ログイン中の管理者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: String,
    pub email: String,
}

/// サインイン結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    /// トークンの有効期間
    pub expires_in: Duration,
    pub user: AdminUser,
}

/// 認証APIの抽象
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// メールアドレスとパスワードでサインイン
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError>;

    /// メールリンク等で受け取った認可コードをセッションに交換
    async fn exchange_code(&self, code: &str) -> Result<Session, BackendError>;

    /// アクセストークンからユーザーを取得（無効なら `Unauthorized`）
    async fn get_user(&self, access_token: &str) -> Result<AdminUser, BackendError>;

    /// トークンを失効させる
    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;
}

/// セッションクッキーを作成
pub fn session_cookie(session: &Session, secure: bool) -> Result<Cookie, Error> {
    Ok(Cookie::try_new(SESSION_COOKIE, session.access_token.clone())?
        .with_path("/")
        .with_max_age(session.expires_in)
        .secure(secure)
        .http_only(true)
        .with_same_site(SameSite::Lax))
}

/// セッションクッキーを消すためのクッキー
pub fn clear_session_cookie(secure: bool) -> Result<Cookie, Error> {
    Ok(Cookie::removal(SESSION_COOKIE)?
        .secure(secure)
        .http_only(true)
        .with_same_site(SameSite::Lax))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            access_token: "tok.en-1".to_string(),
            expires_in: Duration::from_secs(3600),
            user: AdminUser { id: "u1".into(), email: "dr@example.com".into() },
        }
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(&session(), true).unwrap();
        assert_eq!(
            cookie.to_header_value(),
            "dental_session=tok.en-1; Path=/; Max-Age=3600; Secure; HttpOnly; SameSite=Lax"
        );

        let insecure = session_cookie(&session(), false).unwrap();
        assert!(!insecure.to_header_value().contains("Secure"));
    }

    #[test]
    fn test_token_with_invalid_characters_is_rejected() {
        let bad = Session { access_token: "a;b".into(), ..session() };
        assert!(matches!(session_cookie(&bad, true), Err(Error::InvalidCookie(_))));
    }

    #[test]
    fn test_clear_cookie() {
        let cookie = clear_session_cookie(false).unwrap();
        assert_eq!(
            cookie.to_header_value(),
            "dental_session=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"
        );
    }
}
