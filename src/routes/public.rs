//! 公開ページ
//!
//! HTMLは [`PageCache`](crate::cache::PageCache) にパス単位で保存し、
//! 管理画面での更新や `/api/revalidate` で破棄されるまで再利用する。

use std::future::Future;
use std::sync::Arc;

use log::error;
use tera::Context;

use crate::common::{Request, Response, ResponseBuilder};
use crate::content::{BlogPost, Service, Testimonial};
use crate::error::Error;
use crate::handler::{async_get, get};
use crate::ui::views::{PostView, ServiceView, TestimonialView};
use crate::ui::{Page, SITE_CSS, STYLESHEET_PATH};
use crate::AppBuilder;

use super::{bind, AppState};

/// トップページのキャッチコピー
pub const TAGLINE: &str = "Gentle, modern dental care for the whole family.";

const HTML_CACHE_CONTROL: &str = "public, max-age=0, must-revalidate";
const ASSET_CACHE_CONTROL: &str = "public, max-age=86400";

/// トップページに出す件数
const HOME_POSTS: usize = 3;
const HOME_TESTIMONIALS: usize = 3;

pub fn register(builder: AppBuilder, state: &Arc<AppState>) -> AppBuilder {
    builder
        .handler(async_get("/", bind(state, home)))
        .handler(async_get("/services", bind(state, services)))
        .handler(async_get("/testimonials", bind(state, testimonials)))
        .handler(async_get("/blog", bind(state, blog_index)))
        .handler(async_get(r"^/blog/([a-z0-9-]+)$", bind(state, blog_post)))
        .handler(get(STYLESHEET_PATH, |_req| Ok(stylesheet())))
}

fn html_response(status: u16, body: String) -> Response {
    ResponseBuilder::new(status)
        .cache_control(HTML_CACHE_CONTROL)
        .html(body)
        .build()
}

/// キャッシュ経由でページを返す
async fn cached_page<F, Fut>(state: &AppState, path: &str, render: F) -> Result<Response, Error>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, Error>>,
{
    let body = state.cache.get_or_render(path, render).await?;
    Ok(html_response(200, body))
}

fn service_views(services: &[Service]) -> Vec<ServiceView> {
    services.iter().map(ServiceView::from).collect()
}

fn testimonial_views(testimonials: &[Testimonial]) -> Vec<TestimonialView> {
    testimonials.iter().map(TestimonialView::from).collect()
}

fn post_views(posts: &[BlogPost]) -> Vec<PostView> {
    posts.iter().map(PostView::from).collect()
}

pub fn stylesheet() -> Response {
    ResponseBuilder::new(200)
        .cache_control(ASSET_CACHE_CONTROL)
        .body_with_type("text/css; charset=utf-8", SITE_CSS)
        .build()
}

/// 404ページ（キャッシュしない）
pub fn not_found_page(state: &AppState, path: &str) -> Response {
    match state
        .templates
        .public("public/not_found.html", &Page::new("Not found", path), Context::new())
    {
        Ok(html) => ResponseBuilder::new(404).html(html).build(),
        Err(e) => {
            error!("Failed to render the not-found page: {}", e);
            Response::from_error(&Error::NotFound(path.to_string()))
        }
    }
}

pub async fn home(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let st: &AppState = &state;
    cached_page(st, &req.path, move || async move {
        let services = st.content.active_services().await?;
        let testimonials = st.content.featured_testimonials(HOME_TESTIMONIALS).await?;
        let posts = st.content.published_posts(Some(HOME_POSTS)).await?;

        let mut context = Context::new();
        context.insert("tagline", TAGLINE);
        context.insert("services", &service_views(&services));
        context.insert("testimonials", &testimonial_views(&testimonials));
        context.insert("posts", &post_views(&posts));
        let page = Page::new("", "/")
            .with_description(TAGLINE)
            .with_canonical(st.config.absolute_url("/"));
        st.templates.public("public/home.html", &page, context)
    })
    .await
}

pub async fn services(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let st: &AppState = &state;
    cached_page(st, &req.path, move || async move {
        let services = st.content.active_services().await?;
        let mut context = Context::new();
        context.insert("services", &service_views(&services));
        let page = Page::new("Services", "/services")
            .with_description("Preventive, restorative and cosmetic dental treatments.")
            .with_canonical(st.config.absolute_url("/services"));
        st.templates.public("public/services.html", &page, context)
    })
    .await
}

pub async fn testimonials(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let st: &AppState = &state;
    cached_page(st, &req.path, move || async move {
        let testimonials = st.content.published_testimonials().await?;
        let mut context = Context::new();
        context.insert("testimonials", &testimonial_views(&testimonials));
        let page = Page::new("Testimonials", "/testimonials")
            .with_description("What our patients say about their visits.")
            .with_canonical(st.config.absolute_url("/testimonials"));
        st.templates.public("public/testimonials.html", &page, context)
    })
    .await
}

pub async fn blog_index(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let st: &AppState = &state;
    cached_page(st, &req.path, move || async move {
        let posts = st.content.published_posts(None).await?;
        let mut context = Context::new();
        context.insert("posts", &post_views(&posts));
        let page = Page::new("Blog", "/blog")
            .with_description("Tips and news from our dental team.")
            .with_canonical(st.config.absolute_url("/blog"));
        st.templates.public("public/blog_index.html", &page, context)
    })
    .await
}

/// 記事ページ（下書きや存在しないスラッグは404）
pub async fn blog_post(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    if let Some(hit) = state.cache.get(&req.path) {
        return Ok(html_response(200, hit));
    }
    let slug = req.param(0).unwrap_or_default();
    let post = match state.content.published_post_by_slug(slug).await? {
        Some(post) => post,
        None => return Ok(not_found_page(&state, &req.path)),
    };

    let description = post.summary(160);
    let page = Page::new(&post.title, &req.path)
        .with_description(&description)
        .with_canonical(state.config.absolute_url(&post.public_path()));
    let mut context = Context::new();
    context.insert("post", &PostView::from(&post));
    let html = state.templates.public("public/blog_post.html", &page, context)?;
    state.cache.put(&req.path, html.clone());
    Ok(html_response(200, html))
}
