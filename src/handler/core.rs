use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;

use crate::common::{Handler, Method, Request, Response};
use crate::error::Error;

use super::body::{is_form_content_type, is_json_like_content_type};
use super::pattern::RoutePattern;
use super::response::ResponseWrapper;

/// ボディの扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// ボディを読まない（GETや削除フォームなど）
    Ignore,
    /// 空でなければJSONまたはurlencodedフォームとしてデコード
    Decode,
}

fn log_registration(kind: &str, method: &Method, pattern: &str) {
    // 開発時はinfo、本番相当ではdebugに落とす
    #[cfg(debug_assertions)]
    info!("Registering {} for {} with pattern: {}", kind, method, pattern);
    #[cfg(not(debug_assertions))]
    debug!("Registering {} for {} with pattern: {}", kind, method, pattern);
}

/// Content-Typeに応じてボディをデコード（空ボディはNone）
fn decode_body<T: DeserializeOwned>(req: &Request) -> Result<Option<T>, Error> {
    let has_non_empty_body = req.body.as_ref().map(|b| !b.is_empty()).unwrap_or(false);
    if !has_non_empty_body {
        return Ok(None);
    }

    let ct = req.header("content-type").ok_or_else(|| {
        warn!("Request with body missing Content-Type header");
        Error::InvalidRequestBody("Missing Content-Type header".to_string())
    })?;

    if is_json_like_content_type(ct) {
        Ok(Some(req.json::<T>()?))
    } else if is_form_content_type(ct) {
        Ok(Some(req.form::<T>()?))
    } else {
        warn!("Unsupported Content-Type for body parsing: {}", ct);
        Err(Error::InvalidRequestBody(format!(
            "Unsupported Content-Type: {} (expected JSON or urlencoded form)",
            ct
        )))
    }
}

/// ルートハンドラー
pub struct RouteHandler<F, T, R>
where
    F: Fn(Request, Option<T>) -> Result<R, Error> + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: ResponseWrapper + Send + 'static,
{
    /// ルートパス（正規表現パターン）
    pub pattern: RoutePattern,
    /// HTTPメソッド
    pub method: Method,
    /// ボディの扱い
    pub body_mode: BodyMode,
    /// ハンドラー関数
    pub handler_fn: F,
    _types: PhantomData<fn() -> (T, R)>,
}

impl<F, T, R> RouteHandler<F, T, R>
where
    F: Fn(Request, Option<T>) -> Result<R, Error> + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: ResponseWrapper + Send + 'static,
{
    /// 新しいRouteHandlerを作成
    pub fn new(method: Method, path_pattern: &str, body_mode: BodyMode, handler_fn: F) -> Self {
        let pattern = RoutePattern::new(path_pattern);
        log_registration("handler", &method, pattern.as_str());
        Self {
            pattern,
            method,
            body_mode,
            handler_fn,
            _types: PhantomData,
        }
    }
}

/// 非同期ルートハンドラー
pub struct AsyncRouteHandler<F, T, R, Fut>
where
    F: Fn(Request, Option<T>) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: ResponseWrapper + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    /// ルートパス（正規表現パターン）
    pub pattern: RoutePattern,
    /// HTTPメソッド
    pub method: Method,
    /// ボディの扱い
    pub body_mode: BodyMode,
    /// 非同期ハンドラー関数
    pub handler_fn: F,
    _types: PhantomData<fn() -> (T, R, Fut)>,
}

impl<F, T, R, Fut> AsyncRouteHandler<F, T, R, Fut>
where
    F: Fn(Request, Option<T>) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: ResponseWrapper + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    /// 新しいAsyncRouteHandlerを作成
    pub fn new(method: Method, path_pattern: &str, body_mode: BodyMode, handler_fn: F) -> Self {
        let pattern = RoutePattern::new(path_pattern);
        log_registration("async handler", &method, pattern.as_str());
        Self {
            pattern,
            method,
            body_mode,
            handler_fn,
            _types: PhantomData,
        }
    }
}

/// キャプチャを詰めてボディをデコードする共通前処理
fn prepare<T: DeserializeOwned>(
    pattern: &RoutePattern,
    body_mode: BodyMode,
    mut req: Request,
) -> Result<(Request, Option<T>), Error> {
    req.path_params = pattern.captures(&req.path);
    let body = match body_mode {
        BodyMode::Ignore => None,
        BodyMode::Decode => decode_body::<T>(&req)?,
    };
    Ok((req, body))
}

#[async_trait]
impl<F, T, R> Handler for RouteHandler<F, T, R>
where
    F: Fn(Request, Option<T>) -> Result<R, Error> + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: ResponseWrapper + Send + 'static,
{
    fn matches(&self, path: &str, method: &Method) -> bool {
        method == &self.method && self.pattern.is_match(path)
    }

    fn path_pattern(&self) -> &str {
        self.pattern.as_str()
    }

    async fn handle(&self, req: Request) -> Result<Response, Error> {
        let (req, body) = prepare::<T>(&self.pattern, self.body_mode, req)?;
        let result = (self.handler_fn)(req, body)?;
        result.into_response()
    }
}

#[async_trait]
impl<F, T, R, Fut> Handler for AsyncRouteHandler<F, T, R, Fut>
where
    F: Fn(Request, Option<T>) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: ResponseWrapper + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    fn matches(&self, path: &str, method: &Method) -> bool {
        method == &self.method && self.pattern.is_match(path)
    }

    fn path_pattern(&self) -> &str {
        self.pattern.as_str()
    }

    async fn handle(&self, req: Request) -> Result<Response, Error> {
        let (req, body) = prepare::<T>(&self.pattern, self.body_mode, req)?;
        let result = (self.handler_fn)(req, body).await?;
        result.into_response()
    }
}
