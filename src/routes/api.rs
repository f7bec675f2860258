//! API・クローラー向けエンドポイント

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tera::Context;

use crate::common::utils::constant_time_eq;
use crate::common::{Request, Response, ResponseBuilder};
use crate::error::Error;
use crate::handler::{async_get, async_post_optional, get};
use crate::AppBuilder;

use super::{bind, AppState};

/// 再検証シークレットを載せるヘッダー
pub const REVALIDATE_SECRET_HEADER: &str = "x-revalidate-secret";

/// サイトマップに載せる固定ページ
const STATIC_PAGES: &[&str] = &["/", "/services", "/testimonials", "/blog"];

pub fn register(builder: AppBuilder, state: &Arc<AppState>) -> AppBuilder {
    let revalidate_state = Arc::clone(state);
    let robots_state = Arc::clone(state);
    builder
        .handler(get("/api/health", |_req| Ok(health())))
        .handler(async_post_optional("/api/revalidate", move |req, body: Option<RevalidateBody>| {
            revalidate(Arc::clone(&revalidate_state), req, body)
        }))
        .handler(async_get("/sitemap.xml", bind(state, sitemap)))
        .handler(get("/robots.txt", move |_req| Ok(robots(&robots_state))))
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Health {
    pub status: &'static str,
}

pub fn health() -> Health {
    Health { status: "ok" }
}

/// `POST /api/revalidate` のJSONボディ
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RevalidateBody {
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Revalidated {
    pub revalidated: bool,
    /// 指定されたパス（全体の場合はnull）
    pub path: Option<String>,
    /// 処理時刻（UNIXミリ秒）
    pub now: i64,
}

/// キャッシュを破棄する
///
/// シークレットはヘッダーかクエリの `secret`、パスはクエリかJSONボディの `path`。
/// パスが無ければ全ページを破棄する。
pub async fn revalidate(state: Arc<AppState>, req: Request, body: Option<RevalidateBody>) -> Result<Response, Error> {
    let expected = state.config.revalidate_secret.as_deref().ok_or_else(|| {
        Error::ConfigurationError("DENTAL_REVALIDATE_SECRET is not configured".to_string())
    })?;
    let provided = req
        .header(REVALIDATE_SECRET_HEADER)
        .or_else(|| req.query("secret"))
        .unwrap_or_default();
    if !constant_time_eq(provided, expected) {
        warn!("Revalidation rejected for {}", req.client_ip());
        return Err(Error::AuthenticationError("invalid revalidation secret".to_string()));
    }

    let path = req
        .query("path")
        .map(str::to_string)
        .or_else(|| body.and_then(|b| b.path))
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    match path.as_deref() {
        Some(p) if !p.starts_with('/') => {
            return Err(Error::InvalidRequestBody(format!("path must start with '/': {}", p)));
        }
        Some(p) => {
            let removed = state.cache.revalidate_prefix(p);
            info!("Revalidated {} ({} cached pages)", p, removed);
        }
        None => {
            state.cache.clear();
            info!("Revalidated all pages");
        }
    }

    Response::ok().json(&Revalidated {
        revalidated: true,
        path,
        now: Utc::now().timestamp_millis(),
    })
}

/// サイトマップの1エントリ
#[derive(Debug, Serialize)]
struct SitemapUrl {
    loc: String,
    lastmod: Option<String>,
}

/// `GET /sitemap.xml`（公開済み記事を含む）
pub async fn sitemap(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let st: &AppState = &state;
    let xml = st
        .cache
        .get_or_render(&req.path, move || async move {
            let posts = st.content.published_posts(None).await?;
            let mut urls: Vec<SitemapUrl> = STATIC_PAGES
                .iter()
                .map(|path| SitemapUrl { loc: st.config.absolute_url(path), lastmod: None })
                .collect();
            urls.extend(posts.iter().map(|post| {
                let modified = post.updated_at.unwrap_or_else(|| post.display_date());
                SitemapUrl {
                    loc: st.config.absolute_url(&post.public_path()),
                    lastmod: Some(modified.format("%Y-%m-%d").to_string()),
                }
            }));
            let mut context = Context::new();
            context.insert("urls", &urls);
            st.templates.render("sitemap.xml", &context)
        })
        .await?;
    Ok(ResponseBuilder::new(200)
        .cache_control("public, max-age=3600")
        .body_with_type("application/xml; charset=utf-8", xml)
        .build())
}

/// `GET /robots.txt`
pub fn robots(state: &AppState) -> Response {
    let body = format!(
        "User-agent: *\nAllow: /\nDisallow: /admin\nDisallow: /api/\nDisallow: /login\n\nSitemap: {}\n",
        state.config.absolute_url("/sitemap.xml")
    );
    ResponseBuilder::new(200)
        .cache_control("public, max-age=86400")
        .text(body)
        .build()
}
