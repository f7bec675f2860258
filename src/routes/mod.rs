//! ルーティング
//!
//! - [`public`]: 公開ページ（キャッシュ付き）
//! - [`session`]: ログイン・ログアウト・認証コールバック
//! - [`admin`]: 管理画面のCRUD
//! - [`api`]: ヘルスチェック・再検証・サイトマップ

pub mod admin;
pub mod api;
pub mod public;
pub mod session;

use std::future::Future;
use std::sync::Arc;

use crate::audit::AuditLog;
use crate::auth::{AdminGuard, AuthProvider};
use crate::cache::PageCache;
use crate::common::{Request, Response};
use crate::config::SiteConfig;
use crate::content::{ContentRepository, ContentStore};
use crate::error::Error;
use crate::rate_limit::{RateLimitMiddleware, RateLimiter};
use crate::ui::Templates;
use crate::App;

/// 全ハンドラーで共有する状態
pub struct AppState {
    pub config: SiteConfig,
    pub content: ContentRepository,
    pub auth: Arc<dyn AuthProvider>,
    pub audit: AuditLog,
    pub cache: PageCache,
    pub templates: Templates,
}

impl AppState {
    /// コンテンツと監査ログは同じストアに置く
    ///
    /// テンプレートのパースに失敗した場合はエラー。
    pub fn new(config: SiteConfig, store: Arc<dyn ContentStore>, auth: Arc<dyn AuthProvider>) -> Result<Self, Error> {
        Ok(Self {
            content: ContentRepository::new(Arc::clone(&store)),
            audit: AuditLog::new(store),
            cache: PageCache::new(config.page_cache_ttl),
            templates: Templates::new(&config.site_name)?,
            auth,
            config,
        })
    }
}

/// 状態を束縛したGET/アクション用ハンドラー
pub(crate) fn bind<F, Fut>(state: &Arc<AppState>, f: F) -> impl Fn(Request) -> Fut + Send + Sync + 'static
where
    F: Fn(Arc<AppState>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Error>> + Send + 'static,
{
    let state = Arc::clone(state);
    move |req| f(Arc::clone(&state), req)
}

/// 状態を束縛したボディ付きハンドラー
pub(crate) fn bind_body<F, T, Fut>(state: &Arc<AppState>, f: F) -> impl Fn(Request, T) -> Fut + Send + Sync + 'static
where
    F: Fn(Arc<AppState>, Request, T) -> Fut + Send + Sync + 'static,
    T: Send + 'static,
    Fut: Future<Output = Result<Response, Error>> + Send + 'static,
{
    let state = Arc::clone(state);
    move |req, body| f(Arc::clone(&state), req, body)
}

/// アプリケーション全体を組み立てる
///
/// ミドルウェアはレート制限 → 管理画面ガードの順に適用する。
pub fn build_app(state: Arc<AppState>) -> App {
    let limiter = RateLimiter::new(state.config.rate_limit_max, state.config.rate_limit_window);
    let builder = App::builder()
        .middleware(RateLimitMiddleware::new(limiter))
        .middleware(AdminGuard::new(Arc::clone(&state.auth), state.config.admin_emails.clone()));

    let builder = public::register(builder, &state);
    let builder = session::register(builder, &state);
    let builder = admin::register(builder, &state);
    api::register(builder, &state).build()
}
