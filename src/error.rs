//! エラー型の定義

use thiserror::Error;

use crate::content::store::BackendError;

/// アプリケーションのエラー型
#[derive(Error, Debug)]
pub enum Error {
    /// リクエストのルーティングエラー
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// 対象のコンテンツが存在しない
    #[error("Not found: {0}")]
    NotFound(String),

    /// 無効なリクエストボディ
    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    /// フォーム入力の検証エラー
    #[error("Validation failed: {0}")]
    Validation(String),

    /// レスポンスのシリアライズエラー
    #[error("Failed to serialize response: {0}")]
    ResponseSerializationError(String),

    /// ミドルウェアエラー
    #[error("Middleware error: {0}")]
    MiddlewareError(String),

    /// 内部サーバーエラー
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    /// テンプレートの読み込み・レンダリングエラー
    #[error("Template error: {0}")]
    TemplateError(String),

    /// 設定エラー
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// 外部サービスエラー
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// 認証エラー
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// 認可エラー
    #[error("Authorization error: {0}")]
    AuthorizationError(String),

    /// ボディサイズ超過
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// 不正なヘッダー
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// 不正なCookie
    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),

    /// レート制限超過（再試行までの秒数）
    #[error("Rate limit exceeded, retry after {0}s")]
    RateLimited(u64),

    /// 別のパスへのリダイレクト（ミドルウェアからの早期応答に使用）
    #[error("Redirect to {0}")]
    Redirect(String),
}

impl Error {
    /// エラーからHTTPステータスコードを取得
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) => 404,
            Error::NotFound(_) => 404,
            Error::InvalidRequestBody(_) => 400,
            Error::Validation(_) => 422,
            Error::ResponseSerializationError(_) => 500,
            Error::MiddlewareError(_) => 500,
            Error::InternalServerError(_) => 500,
            Error::TemplateError(_) => 500,
            Error::ConfigurationError(_) => 500,
            Error::ExternalServiceError(_) => 502,
            Error::AuthenticationError(_) => 401,
            Error::AuthorizationError(_) => 403,
            Error::PayloadTooLarge(_) => 413,
            Error::InvalidHeader(_) => 400,
            Error::InvalidCookie(_) => 400,
            Error::RateLimited(_) => 429,
            Error::Redirect(_) => 303,
        }
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(what) => Error::NotFound(what),
            BackendError::Unauthorized(msg) => Error::AuthenticationError(msg),
            other => Error::ExternalServiceError(other.to_string()),
        }
    }
}

impl From<tera::Error> for Error {
    fn from(err: tera::Error) -> Self {
        // teraのエラーは原因が入れ子になるため連結して残す
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Error::TemplateError(message)
    }
}
