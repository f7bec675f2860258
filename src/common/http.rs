//! HTTP関連の基本型とユーティリティ

use std::collections::HashMap;
use std::fmt;
use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;
use crate::error::Error;
use super::context::RequestContext;
use super::cookie::{parse_cookie_header, Cookie};
use super::utils::{is_header_value_valid, parse_query_string};

/// 既定のContent-Security-Policy
///
/// スタイルは `/assets/site.css` のみ、画像はHTTPSの外部URLも許可する
/// （ブログのカバー画像は外部ストレージに置かれる）。
pub const DEFAULT_CSP: &str =
    "default-src 'self'; img-src 'self' https: data:; base-uri 'self'; form-action 'self'; frame-ancestors 'none'";

/// HTTPステータスコード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    // 2xx Success
    Ok = 200,
    Created = 201,
    NoContent = 204,

    // 3xx Redirection
    SeeOther = 303,

    // 4xx Client Error
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    PayloadTooLarge = 413,
    UnprocessableEntity = 422,
    TooManyRequests = 429,

    // 5xx Server Error
    InternalServerError = 500,
    BadGateway = 502,
    ServiceUnavailable = 503,
}

impl StatusCode {
    /// u16の値を取得
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// 理由句を取得
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::SeeOther => "See Other",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::UnprocessableEntity => "Unprocessable Entity",
            StatusCode::TooManyRequests => "Too Many Requests",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::BadGateway => "Bad Gateway",
            StatusCode::ServiceUnavailable => "Service Unavailable",
        }
    }

    /// u16からStatusCodeに変換（未定義のコードはNone）
    pub fn from_u16(code: u16) -> Option<Self> {
        let status = match code {
            200 => StatusCode::Ok,
            201 => StatusCode::Created,
            204 => StatusCode::NoContent,
            303 => StatusCode::SeeOther,
            400 => StatusCode::BadRequest,
            401 => StatusCode::Unauthorized,
            403 => StatusCode::Forbidden,
            404 => StatusCode::NotFound,
            405 => StatusCode::MethodNotAllowed,
            413 => StatusCode::PayloadTooLarge,
            422 => StatusCode::UnprocessableEntity,
            429 => StatusCode::TooManyRequests,
            500 => StatusCode::InternalServerError,
            502 => StatusCode::BadGateway,
            503 => StatusCode::ServiceUnavailable,
            _ => return None,
        };
        Some(status)
    }

    /// 成功ステータスかどうか判定
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    /// クライアントエラーかどうか判定
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.as_u16())
    }

    /// サーバーエラーかどうか判定
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.as_u16())
    }
}

impl From<StatusCode> for u16 {
    fn from(status: StatusCode) -> u16 {
        status.as_u16()
    }
}

/// HTTPメソッド
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::PATCH => "PATCH",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
        };
        f.write_str(name)
    }
}

impl Method {
    /// 文字列からMethodに変換
    pub fn from_str(method: &str) -> Option<Self> {
        match method.to_uppercase().as_str() {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "PATCH" => Some(Method::PATCH),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            _ => None,
        }
    }
}

/// HTTPリクエスト
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTPメソッド
    pub method: Method,
    /// リクエストパス
    pub path: String,
    /// クエリパラメータ
    pub query_params: HashMap<String, String>,
    /// HTTPヘッダー（キーは小文字）
    pub headers: HashMap<String, String>,
    /// リクエストボディ
    pub body: Option<Vec<u8>>,
    /// ルートパターンのキャプチャグループ
    pub path_params: Vec<String>,
    /// サーバーが決めたクライアントのアドレス
    pub client_addr: Option<String>,
    /// リクエストコンテキスト
    context: RequestContext,
}

impl Request {
    /// 新しいリクエストを作成
    pub fn new(method: Method, path: String) -> Self {
        Self {
            method,
            path,
            query_params: HashMap::new(),
            headers: HashMap::new(),
            body: None,
            path_params: Vec::new(),
            client_addr: None,
            context: RequestContext::new(),
        }
    }

    /// クエリパラメータを追加
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// ヘッダーを追加（キーは小文字化、不正な値は破棄）
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into().to_ascii_lowercase();
        let value = value.into();
        if is_header_value_valid(&value) {
            self.headers.insert(key, value);
        } else {
            warn!("Dropped request header with invalid value: {}", key);
        }
        self
    }

    /// ボディを追加
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// クライアントのアドレスを設定
    pub fn with_client_addr(mut self, addr: &str) -> Self {
        self.client_addr = Some(addr.to_string());
        self
    }

    /// ヘッダー値を取得（大文字小文字を区別しない）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    /// クエリパラメータを取得
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query_params.get(key).map(|v| v.as_str())
    }

    /// Cookieヘッダーから指定名の値を取得
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.header("cookie")
            .and_then(|raw| parse_cookie_header(raw).remove(name))
            .filter(|v| !v.is_empty())
    }

    /// パスパターンのn番目のキャプチャを取得
    pub fn param(&self, index: usize) -> Option<&str> {
        self.path_params.get(index).map(|v| v.as_str())
    }

    /// クライアント識別子
    ///
    /// サーバーが接続から決めた値だけを使う。`X-Forwarded-For` などのヘッダーはここでは読まない。
    pub fn client_ip(&self) -> String {
        self.client_addr
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string()
    }

    /// ボディをJSONとしてパース
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if let Some(body) = &self.body {
            serde_json::from_slice(body)
                .map_err(|e| Error::InvalidRequestBody(e.to_string()))
        } else {
            Err(Error::InvalidRequestBody("No request body".to_string()))
        }
    }

    /// ボディを`application/x-www-form-urlencoded`としてパース
    ///
    /// 値はすべて文字列として渡されるため、受け側の型は `String` /
    /// `Option<String>` フィールドで定義する。
    pub fn form<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let body = self
            .body
            .as_ref()
            .ok_or_else(|| Error::InvalidRequestBody("No request body".to_string()))?;
        let raw = std::str::from_utf8(body)
            .map_err(|_| Error::InvalidRequestBody("Form body is not valid UTF-8".to_string()))?;
        let fields: serde_json::Map<String, serde_json::Value> = parse_query_string(raw)
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        serde_json::from_value(serde_json::Value::Object(fields))
            .map_err(|e| Error::InvalidRequestBody(e.to_string()))
    }

    /// リクエストコンテキストの不変参照を取得
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// リクエストコンテキストの可変参照を取得
    pub fn context_mut(&mut self) -> &mut RequestContext {
        &mut self.context
    }
}

/// 既定のセキュリティヘッダー
fn default_security_headers() -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("X-Content-Type-Options".to_string(), "nosniff".to_string());
    headers.insert("X-Frame-Options".to_string(), "DENY".to_string());
    headers.insert("Referrer-Policy".to_string(), "strict-origin-when-cross-origin".to_string());
    headers.insert("Content-Security-Policy".to_string(), DEFAULT_CSP.to_string());
    headers
}

/// 不正なヘッダー値を拒否しつつ挿入する
fn insert_checked_header(headers: &mut HashMap<String, String>, key: String, value: String) {
    if is_header_value_valid(&value) {
        headers.insert(key, value);
    } else {
        warn!("Dropped response header with invalid value: {}", key);
    }
}

/// HTTPレスポンス
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTPステータスコード
    pub status: u16,
    /// HTTPヘッダー
    pub headers: HashMap<String, String>,
    /// レスポンスボディ
    pub body: Option<Vec<u8>>,
}

impl Response {
    /// 新しいレスポンスを作成（セキュリティヘッダー付き）
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: default_security_headers(),
            body: None,
        }
    }

    /// StatusCodeから新しいレスポンスを作成
    pub fn with_status(status: StatusCode) -> Self {
        Self::new(status.as_u16())
    }

    /// ヘッダーを追加（不正な値は破棄）
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        insert_checked_header(&mut self.headers, key.into(), value.into());
        self
    }

    /// Set-Cookieヘッダーを追加
    pub fn with_cookie(self, cookie: &Cookie) -> Self {
        self.with_header("Set-Cookie", cookie.to_header_value())
    }

    /// ボディを追加
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// JSONをボディとして設定
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, Error> {
        let json = serde_json::to_vec(value)
            .map_err(|e| Error::ResponseSerializationError(e.to_string()))?;

        self.headers.insert("Content-Type".to_string(), "application/json".to_string());
        self.body = Some(json);
        Ok(self)
    }

    /// HTMLをボディとして設定
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.headers.insert("Content-Type".to_string(), "text/html; charset=utf-8".to_string());
        self.body = Some(html.into().into_bytes());
        self
    }

    /// テキストをボディとして設定
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.headers.insert("Content-Type".to_string(), "text/plain; charset=utf-8".to_string());
        self.body = Some(text.into().into_bytes());
        self
    }

    /// 200 OKレスポンスを作成
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// 303 See Otherでリダイレクト（フォームPOST後の遷移に使用）
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(303).with_header("Location", location)
    }

    /// ボディを文字列として取得（テスト・ログ用）
    pub fn body_text(&self) -> String {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    /// Error型から固定メッセージのレスポンスを生成
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::Redirect(location) => return Response::redirect(location.clone()),
            Error::RateLimited(retry_after) => {
                return Response::new(429)
                    .with_header("Retry-After", retry_after.to_string())
                    .text("Too Many Requests");
            }
            _ => {}
        }

        let status = error.status_code();
        let message = match status {
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            413 => "Payload Too Large",
            422 => "Unprocessable Entity",
            500 | 502 => "Internal Server Error",
            _ => "Error",
        };
        Response::new(status)
            .with_header("Content-Type", "text/plain")
            .with_body(message.as_bytes().to_vec())
    }
}

/// レスポンス構築のためのビルダー
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    status: u16,
    headers: HashMap<String, String>,
    body: Option<Vec<u8>>,
}

impl ResponseBuilder {
    /// 新しいResponseBuilderを作成（u16ステータスコード）
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: default_security_headers(),
            body: None,
        }
    }

    /// 新しいResponseBuilderを作成（StatusCode）
    pub fn with_status(status: StatusCode) -> Self {
        Self::new(status.as_u16())
    }

    /// ヘッダーを追加（不正な値は破棄）
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        insert_checked_header(&mut self.headers, key.into(), value.into());
        self
    }

    /// キャッシュ制御ヘッダーを設定
    pub fn cache_control(self, value: &str) -> Self {
        self.header("Cache-Control", value)
    }

    /// テキストボディを設定
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.headers.insert("Content-Type".to_string(), "text/plain; charset=utf-8".to_string());
        self.body = Some(text.into().into_bytes());
        self
    }

    /// HTMLボディを設定
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.headers.insert("Content-Type".to_string(), "text/html; charset=utf-8".to_string());
        self.body = Some(html.into().into_bytes());
        self
    }

    /// 任意のContent-Typeでボディを設定
    pub fn body_with_type(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.headers.insert("Content-Type".to_string(), content_type.to_string());
        self.body = Some(body.into());
        self
    }

    /// Responseを構築
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}
