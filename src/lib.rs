//! dentalsite: 歯科医院の公開サイトとコンテンツ管理画面
//!
//! 公開ページ（トップ・診療メニュー・患者さんの声・ブログ）と、
//! ログインした管理者だけが使える編集画面を1つのアプリケーションとして提供する。
//! コンテンツと認証は外部のバックエンド（PostgREST互換API + 認証API）に置き、
//! 未設定の場合はプロセス内のストアで動作する。

pub mod audit;
pub mod auth;
pub mod cache;
pub mod common;
pub mod config;
pub mod content;
pub mod error;
pub mod handler;
pub mod rate_limit;
pub mod redirect;
pub mod routes;
pub mod ui;

#[cfg(feature = "server")]
pub mod server;

pub use common::*;
pub use error::*;
pub use handler::*;

use log::{debug, error, warn};

/// パターン中の `/` の数（多いほど具体的なルートとみなす）
fn pattern_depth(handler: &dyn common::Handler) -> usize {
    handler.path_pattern().matches('/').count()
}

/// アプリケーションを構築するためのビルダー
#[derive(Default)]
pub struct AppBuilder {
    handlers: Vec<Box<dyn common::Handler>>,
    middlewares: Vec<Box<dyn common::Middleware>>,
}

impl AppBuilder {
    /// 新しいAppBuilderインスタンスを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// ハンドラを追加
    pub fn handler<H>(mut self, handler: H) -> Self
    where
        H: common::Handler + 'static,
    {
        self.handlers.push(Box::new(handler));
        // `/` の数で降順。同じ深さなら登録順を保つ
        self.handlers
            .sort_by(|a, b| pattern_depth(b.as_ref()).cmp(&pattern_depth(a.as_ref())));
        self
    }

    /// ミドルウェアを追加（登録順に前処理される）
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: common::Middleware + 'static,
    {
        self.middlewares.push(Box::new(middleware));
        self
    }

    /// アプリケーションをビルドして返却
    pub fn build(self) -> App {
        App {
            handlers: self.handlers,
            middlewares: self.middlewares,
        }
    }
}

/// リクエストを処理するアプリケーション
pub struct App {
    handlers: Vec<Box<dyn common::Handler>>,
    middlewares: Vec<Box<dyn common::Middleware>>,
}

impl App {
    /// 新しいAppBuilderインスタンスを作成
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// 指定されたパスにマッチするハンドラを取得
    pub fn find_handler(&self, path: &str, method: &common::Method) -> Option<&dyn common::Handler> {
        self.handlers
            .iter()
            .find(|handler| handler.matches(path, method))
            .map(|handler| handler.as_ref())
    }

    /// ミドルウェアのリストを取得
    pub fn middlewares(&self) -> &[Box<dyn common::Middleware>] {
        &self.middlewares
    }

    /// 1リクエストを処理してレスポンスを返す
    ///
    /// ハンドラー検索 → ミドルウェア前処理 → ハンドラー → ミドルウェア後処理の順。
    /// どの段階のエラーも `Response::from_error` でレスポンスに変換する。
    /// HEADはGETのハンドラーで処理し、ボディを捨てる。
    pub async fn dispatch(&self, request: common::Request) -> common::Response {
        let is_head = request.method == common::Method::HEAD;
        let lookup_method = if is_head { common::Method::GET } else { request.method };

        let handler = match self.find_handler(&request.path, &lookup_method) {
            Some(handler) => handler,
            None => {
                debug!("Route not found: {} {}", request.method, request.path);
                return common::Response::from_error(&Error::RouteNotFound(request.path));
            }
        };

        let mut req_processed = request;
        for middleware in self.middlewares() {
            match middleware.pre_process(req_processed).await {
                Ok(processed) => req_processed = processed,
                Err(e) => {
                    log_error("Middleware", &e);
                    return common::Response::from_error(&e);
                }
            }
        }

        let response = match handler.handle(req_processed).await {
            Ok(res) => res,
            Err(e) => {
                log_error("Handler", &e);
                common::Response::from_error(&e)
            }
        };

        let mut res_processed = response;
        for middleware in self.middlewares() {
            match middleware.post_process(res_processed).await {
                Ok(processed) => res_processed = processed,
                Err(e) => {
                    error!("Middleware error in post-processing: {}", e);
                    res_processed = common::Response::from_error(&e);
                }
            }
        }

        if is_head {
            res_processed.body = None;
        }
        res_processed
    }
}

/// ステータスに応じてログレベルを変える
fn log_error(stage: &str, e: &Error) {
    match e.status_code() {
        303 => debug!("{} redirect: {}", stage, e),
        status if status < 500 => warn!("{} rejected request: {}", stage, e),
        _ => error!("{} error: {}", stage, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Tag(&'static str);

    #[async_trait]
    impl Middleware for Tag {
        async fn pre_process(&self, req: Request) -> Result<Request, Error> {
            if req.header("x-block").is_some() {
                return Err(Error::AuthorizationError("blocked".into()));
            }
            Ok(req)
        }

        async fn post_process(&self, res: Response) -> Result<Response, Error> {
            Ok(res.with_header("X-Tag", self.0))
        }
    }

    fn app() -> App {
        App::builder()
            .middleware(Tag("one"))
            .handler(get("^/blog/.*$", |_req| Ok(Response::ok().text("catch-all"))))
            .handler(get("/blog", |_req| Ok(Response::ok().text("index"))))
            .handler(get(r"^/blog/([a-z-]+)/comments$", |_req| Ok(Response::ok().text("comments"))))
            .handler(get(r"^/blog/new$", |_req| Ok(Response::ok().text("first"))))
            .handler(get(r"^/blog/(new)$", |_req| Ok(Response::ok().text("second"))))
            .build()
    }

    #[tokio::test]
    async fn test_more_specific_routes_win() {
        let app = app();
        let res = app.dispatch(Request::new(Method::GET, "/blog/a-b/comments".into())).await;
        assert_eq!(res.body_text(), "comments");
        let res = app.dispatch(Request::new(Method::GET, "/blog".into())).await;
        assert_eq!(res.body_text(), "index");
    }

    #[tokio::test]
    async fn test_equal_depth_keeps_registration_order() {
        let res = app().dispatch(Request::new(Method::GET, "/blog/new".into())).await;
        // "^/blog/.*$" も同じ深さで先に登録されている
        assert_eq!(res.body_text(), "catch-all");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let res = app().dispatch(Request::new(Method::GET, "/nope".into())).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body_text(), "Not Found");
        let res = app().dispatch(Request::new(Method::POST, "/blog".into())).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn test_middleware_runs_around_handler() {
        let app = app();
        let res = app.dispatch(Request::new(Method::GET, "/blog".into())).await;
        assert_eq!(res.headers.get("X-Tag"), Some(&"one".to_string()));

        let blocked = Request::new(Method::GET, "/blog".into()).with_header("X-Block", "1");
        let res = app.dispatch(blocked).await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body_text(), "Forbidden");
    }

    #[tokio::test]
    async fn test_head_uses_get_handler_without_body() {
        let res = app().dispatch(Request::new(Method::HEAD, "/blog".into())).await;
        assert_eq!(res.status, 200);
        assert!(res.body.is_none());
        assert_eq!(res.headers.get("Content-Type"), Some(&"text/plain; charset=utf-8".to_string()));
    }
}
