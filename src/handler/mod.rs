//! ルートハンドラーの実装（正規表現パターン + 同期/非同期ハンドラー）

pub mod response;
pub mod pattern;
pub mod body;
pub mod core;
pub mod builders;

pub use response::{Redirect, ResponseWrapper};
pub use core::{AsyncRouteHandler, BodyMode, RouteHandler};
pub use builders::{async_action, async_get, async_post, async_post_optional, get, post};

#[cfg(test)]
mod tests;
