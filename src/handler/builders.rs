use std::future::Future;

use futures::future::{self, Ready};
use serde::de::DeserializeOwned;

use crate::common::{Method, Request};
use crate::error::Error;

use super::core::{AsyncRouteHandler, BodyMode, RouteHandler};
use super::response::ResponseWrapper;

// 可読性のための型エイリアス（ボディ必須の非同期ハンドラー）
pub type BodyOrError<Fut, R> = future::Either<Ready<Result<R, Error>>, Fut>;

// 非同期: Option<T> から T を要求し、なければ即時エラーfutureを返すアダプタ
fn require_body_async<F, T, R, Fut>(handler: F) -> impl Fn(Request, Option<T>) -> BodyOrError<Fut, R> + Send + Sync + 'static
where
    F: Fn(Request, T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: ResponseWrapper + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    move |req, body_data| match body_data {
        Some(data) => future::Either::Right(handler(req, data)),
        None => future::Either::Left(future::ready(Err(Error::InvalidRequestBody(
            "Missing request body".to_string(),
        )))),
    }
}

/// 同期GETハンドラーを作成（静的なレスポンス向け）
pub fn get<F, R>(path: &str, handler: F) -> RouteHandler<impl Fn(Request, Option<()>) -> Result<R, Error> + Send + Sync + 'static, (), R>
where
    F: Fn(Request) -> Result<R, Error> + Send + Sync + 'static,
    R: ResponseWrapper + Send + 'static,
{
    RouteHandler::new(Method::GET, path, BodyMode::Ignore, move |req, _| handler(req))
}

/// 非同期GETハンドラーを作成
pub fn async_get<F, R, Fut>(path: &str, handler: F) -> AsyncRouteHandler<impl Fn(Request, Option<()>) -> Fut + Send + Sync + 'static, (), R, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    R: ResponseWrapper + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    AsyncRouteHandler::new(Method::GET, path, BodyMode::Ignore, move |req, _| handler(req))
}

/// 同期POSTハンドラーを作成（ボディ必須）
pub fn post<F, T, R>(path: &str, handler: F) -> RouteHandler<impl Fn(Request, Option<T>) -> Result<R, Error> + Send + Sync + 'static, T, R>
where
    F: Fn(Request, T) -> Result<R, Error> + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: ResponseWrapper + Send + 'static,
{
    RouteHandler::new(Method::POST, path, BodyMode::Decode, move |req, body_data| match body_data {
        Some(data) => handler(req, data),
        None => Err(Error::InvalidRequestBody("Missing request body".to_string())),
    })
}

/// 非同期POSTハンドラーを作成（JSONまたはフォームのボディ必須）
pub fn async_post<F, T, R, Fut>(path: &str, handler: F) -> AsyncRouteHandler<impl Fn(Request, Option<T>) -> BodyOrError<Fut, R> + Send + Sync + 'static, T, R, BodyOrError<Fut, R>>
where
    F: Fn(Request, T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: ResponseWrapper + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    AsyncRouteHandler::new(Method::POST, path, BodyMode::Decode, require_body_async(handler))
}

/// 非同期POSTハンドラーを作成（ボディは任意、デコードできればSome）
pub fn async_post_optional<F, T, R, Fut>(path: &str, handler: F) -> AsyncRouteHandler<F, T, R, Fut>
where
    F: Fn(Request, Option<T>) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: ResponseWrapper + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    AsyncRouteHandler::new(Method::POST, path, BodyMode::Decode, handler)
}

/// 非同期POSTハンドラーを作成（ボディを読まない。削除・ログアウト用）
pub fn async_action<F, R, Fut>(path: &str, handler: F) -> AsyncRouteHandler<impl Fn(Request, Option<()>) -> Fut + Send + Sync + 'static, (), R, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    R: ResponseWrapper + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    AsyncRouteHandler::new(Method::POST, path, BodyMode::Ignore, move |req, _| handler(req))
}
