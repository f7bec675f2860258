//! 管理画面へのアクセス制御ミドルウェア

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use super::{AdminUser, AuthProvider, SESSION_COOKIE};
use crate::common::{percent_encode, Middleware, Request};
use crate::content::BackendError;
use crate::error::Error;
use crate::redirect::{is_within, ADMIN_ROOT};

/// ログインページへのリダイレクト先（元のパスを `next` に載せる）
pub fn login_redirect(path: &str) -> String {
    format!("/login?next={}", percent_encode(path))
}

/// `/admin` 以下のリクエストにログイン済み管理者を要求する
///
/// - セッションが無い・無効: `/login?next=...` へ303
/// - ログイン済みだが許可リストに無い: 403
///
/// 通過したリクエストのコンテキストには [`AdminUser`] が入る。
pub struct AdminGuard {
    auth: Arc<dyn AuthProvider>,
    admin_emails: Vec<String>,
}

impl AdminGuard {
    /// `admin_emails` が空なら認証済みユーザー全員を許可する
    pub fn new(auth: Arc<dyn AuthProvider>, admin_emails: Vec<String>) -> Self {
        Self { auth, admin_emails }
    }

    fn is_allowed(&self, user: &AdminUser) -> bool {
        self.admin_emails.is_empty()
            || self
                .admin_emails
                .iter()
                .any(|e| e.eq_ignore_ascii_case(&user.email))
    }
}

#[async_trait]
impl Middleware for AdminGuard {
    async fn pre_process(&self, mut req: Request) -> Result<Request, Error> {
        if !is_within(&req.path, ADMIN_ROOT) {
            return Ok(req);
        }

        let token = match req.cookie(SESSION_COOKIE) {
            Some(token) => token,
            None => {
                debug!("No session cookie for {}", req.path);
                return Err(Error::Redirect(login_redirect(&req.path)));
            }
        };

        let user = match self.auth.get_user(&token).await {
            Ok(user) => user,
            Err(BackendError::Unauthorized(_)) | Err(BackendError::NotFound(_)) => {
                debug!("Session rejected for {}", req.path);
                return Err(Error::Redirect(login_redirect(&req.path)));
            }
            Err(other) => return Err(other.into()),
        };

        if !self.is_allowed(&user) {
            warn!("User {} is not an administrator", user.id);
            return Err(Error::AuthorizationError(format!("{} is not an administrator", user.id)));
        }

        req.context_mut().insert(user);
        Ok(req)
    }
}

/// ガードを通過したリクエストから管理者を取り出す
pub fn current_admin(req: &Request) -> Result<&AdminUser, Error> {
    req.context()
        .get::<AdminUser>()
        .ok_or_else(|| Error::AuthenticationError("no authenticated administrator".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockAuthProvider;
    use crate::common::Method;
    use mockall::predicate::eq;

    fn user(email: &str) -> AdminUser {
        AdminUser { id: "u-1".into(), email: email.into() }
    }

    fn request(path: &str, cookie: Option<&str>) -> Request {
        let req = Request::new(Method::GET, path.to_string());
        match cookie {
            Some(c) => req.with_header("Cookie", c),
            None => req,
        }
    }

    #[tokio::test]
    async fn test_public_paths_pass_through() {
        let mut auth = MockAuthProvider::new();
        auth.expect_get_user().never();
        let guard = AdminGuard::new(Arc::new(auth), vec![]);

        for path in ["/", "/blog/first-visit", "/administrator", "/login"] {
            let req = guard.pre_process(request(path, None)).await.unwrap();
            assert!(current_admin(&req).is_err());
        }
    }

    #[tokio::test]
    async fn test_missing_session_redirects_to_login() {
        let guard = AdminGuard::new(Arc::new(MockAuthProvider::new()), vec![]);
        match guard.pre_process(request("/admin/blog/3", None)).await {
            Err(Error::Redirect(location)) => assert_eq!(location, "/login?next=/admin/blog/3"),
            other => panic!("expected redirect, got {:?}", other.map(|r| r.path)),
        }
    }

    #[tokio::test]
    async fn test_invalid_session_redirects_to_login() {
        let mut auth = MockAuthProvider::new();
        auth.expect_get_user()
            .with(eq("stale"))
            .returning(|_| Err(BackendError::Unauthorized("expired".into())));
        let guard = AdminGuard::new(Arc::new(auth), vec![]);

        let result = guard.pre_process(request("/admin", Some("dental_session=stale"))).await;
        assert!(matches!(result, Err(Error::Redirect(ref l)) if l == "/login?next=/admin"));
    }

    #[tokio::test]
    async fn test_valid_admin_is_stored_in_context() {
        let mut auth = MockAuthProvider::new();
        auth.expect_get_user()
            .with(eq("good"))
            .times(1)
            .returning(|_| Ok(user("Dr@Example.com")));
        let guard = AdminGuard::new(Arc::new(auth), vec!["dr@example.com".into()]);

        let req = guard
            .pre_process(request("/admin/services", Some("theme=x; dental_session=good")))
            .await
            .unwrap();
        assert_eq!(current_admin(&req).unwrap().email, "Dr@Example.com");
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden() {
        let mut auth = MockAuthProvider::new();
        auth.expect_get_user().returning(|_| Ok(user("patient@example.com")));
        let guard = AdminGuard::new(Arc::new(auth), vec!["dr@example.com".into()]);

        let result = guard.pre_process(request("/admin", Some("dental_session=t"))).await;
        assert!(matches!(result, Err(Error::AuthorizationError(_))));
    }

    #[tokio::test]
    async fn test_auth_outage_is_not_a_redirect() {
        let mut auth = MockAuthProvider::new();
        auth.expect_get_user()
            .returning(|_| Err(BackendError::Transport("timeout".into())));
        let guard = AdminGuard::new(Arc::new(auth), vec![]);

        let result = guard.pre_process(request("/admin", Some("dental_session=t"))).await;
        assert!(matches!(result, Err(Error::ExternalServiceError(_))));
    }

    #[test]
    fn test_login_redirect_encoding() {
        assert_eq!(login_redirect("/admin/blog/new"), "/login?next=/admin/blog/new");
        assert_eq!(login_redirect("/admin/a b"), "/login?next=/admin/a%20b");
    }
}
