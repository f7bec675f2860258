//! actix-webによるHTTPサーバー
//!
//! すべてのリクエストを共通形式の [`Request`] に変換して [`App::dispatch`] に渡す。

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::http::header::HeaderMap;
use actix_web::web::{self, Bytes};
use actix_web::{App as ActixApp, HttpRequest, HttpResponse, HttpServer};
use log::{info, warn};

use crate::common::{parse_query_string, Method, Request, Response};
use crate::App;

/// actix-webのHeaderMapから共通形式のヘッダーに変換（キーは小文字）
fn convert_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut result = HashMap::new();
    for (key, value) in headers.iter() {
        if let Ok(value_str) = value.to_str() {
            result.insert(key.as_str().to_ascii_lowercase(), value_str.to_string());
        }
    }
    result
}

/// クライアントのアドレスを決める
///
/// `trust_proxy` のときは前段のプロキシが末尾に追記した `X-Forwarded-For` の値を使う。
/// 先頭側はクライアントが自由に書けるので使わない。
fn client_addr(req: &HttpRequest, headers: &HashMap<String, String>, trust_proxy: bool) -> Option<String> {
    if trust_proxy {
        let last = headers
            .get("x-forwarded-for")
            .and_then(|forwarded| forwarded.rsplit(',').map(str::trim).find(|s| !s.is_empty()));
        if let Some(last) = last {
            return Some(last.to_string());
        }
    }
    req.peer_addr().map(|peer| peer.ip().to_string())
}

/// actix-webのリクエストから共通形式のRequestに変換
fn convert_request(req: &HttpRequest, method: Method, body: Bytes, trust_proxy: bool) -> Request {
    let headers = convert_headers(req.headers());

    let mut request = Request::new(method, req.uri().path().to_string());
    request.client_addr = client_addr(req, &headers, trust_proxy);
    request.query_params = parse_query_string(req.query_string());
    request.headers = headers;
    request.body = if body.is_empty() { None } else { Some(body.to_vec()) };
    request
}

/// 共通形式のResponseからactix-webのHttpResponseに変換
fn convert_to_http_response(response: Response) -> HttpResponse {
    let status = actix_web::http::StatusCode::from_u16(response.status)
        .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);
    for (key, value) in response.headers {
        builder.insert_header((key, value));
    }
    match response.body {
        Some(body) => builder.body(body),
        None => builder.finish(),
    }
}

/// サーバー全体で共有する状態
struct ServerState {
    app: App,
    max_body_size: usize,
    trust_proxy: bool,
}

async fn handle_request(req: HttpRequest, body: Bytes, state: web::Data<Arc<ServerState>>) -> HttpResponse {
    let method = match Method::from_str(req.method().as_str()) {
        Some(method) => method,
        None => {
            warn!("Unsupported method: {}", req.method());
            return convert_to_http_response(Response::new(405).text("Method Not Allowed"));
        }
    };
    info!("{} {}", method, req.uri().path());

    if body.len() > state.max_body_size {
        warn!("Request body too large: {} bytes (limit {})", body.len(), state.max_body_size);
        return convert_to_http_response(Response::new(413).text("Payload Too Large"));
    }

    let request = convert_request(&req, method, body, state.trust_proxy);
    let response = state.app.dispatch(request).await;
    convert_to_http_response(response)
}

/// アプリケーションをHTTPサーバーとして実行
pub async fn run_server(
    app: App,
    host: &str,
    port: u16,
    max_body_size: usize,
    trust_proxy: bool,
) -> std::io::Result<()> {
    info!("Starting HTTP server on {}:{}", host, port);
    if trust_proxy {
        info!("Client addresses are taken from X-Forwarded-For");
    }

    let state = Arc::new(ServerState { app, max_body_size, trust_proxy });

    HttpServer::new(move || {
        ActixApp::new()
            .app_data(web::Data::new(Arc::clone(&state)))
            // 上限を超えるボディはハンドラー内で413にするため1バイト多く受け付ける
            .app_data(web::PayloadConfig::new(max_body_size.saturating_add(1)))
            .default_service(web::to(handle_request))
    })
    .bind((host, port))?
    .run()
    .await
}
