use serde::Serialize;

use crate::common::Response;
use crate::error::Error;

/// ハンドラーの戻り値をResponseへ変換するトレイト
pub trait ResponseWrapper {
    /// 自身をResponseに変換
    fn into_response(self) -> Result<Response, Error>;
}

/// シリアライズ可能な値はJSONレスポンスにする（APIエンドポイント用）
impl<T: Serialize> ResponseWrapper for T {
    fn into_response(self) -> Result<Response, Error> {
        Response::ok().json(&self)
    }
}

/// 組み立て済みのResponseはそのまま返す
impl ResponseWrapper for Response {
    fn into_response(self) -> Result<Response, Error> {
        Ok(self)
    }
}

/// フォーム処理後の303リダイレクト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect(pub String);

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self(location.into())
    }
}

impl ResponseWrapper for Redirect {
    fn into_response(self) -> Result<Response, Error> {
        Ok(Response::redirect(self.0))
    }
}
