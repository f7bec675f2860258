//! 管理画面
//!
//! すべてのハンドラーは [`AdminGuard`](crate::auth::AdminGuard) を通過した後に呼ばれる。
//! 更新系は監査ログの記録と公開ページの再検証を行い、一覧へ303で戻す。

use std::sync::Arc;

use log::warn;
use serde::Serialize;
use tera::Context;

use crate::audit::AuditAction;
use crate::auth::guard::current_admin;
use crate::auth::AdminUser;
use crate::common::{Request, Response, ResponseBuilder};
use crate::content::forms::is_checked;
use crate::content::{
    BlogPost, BlogPostDraft, BlogPostForm, DashboardCounts, Service, ServiceDraft, ServiceForm, Table,
    Testimonial, TestimonialDraft, TestimonialForm, ValidationErrors,
};
use crate::error::Error;
use crate::handler::{async_action, async_get, async_post};
use crate::ui::views::{notice, AuditRow, Field, InputKind, NoticeView, PostView, ServiceView, TestimonialView};
use crate::ui::Page;
use crate::AppBuilder;

use super::{bind, bind_body, AppState};

/// ダッシュボードに出す監査ログの件数
const RECENT_AUDIT_ENTRIES: usize = 10;

pub fn register(builder: AppBuilder, state: &Arc<AppState>) -> AppBuilder {
    builder
        .handler(async_get("/admin", bind(state, dashboard)))
        // blog
        .handler(async_get("/admin/blog", bind(state, blog_list)))
        .handler(async_get("/admin/blog/new", bind(state, blog_new)))
        .handler(async_post("/admin/blog", bind_body(state, blog_create)))
        .handler(async_get(r"^/admin/blog/(\d+)$", bind(state, blog_edit)))
        .handler(async_post(r"^/admin/blog/(\d+)$", bind_body(state, blog_update)))
        .handler(async_action(r"^/admin/blog/(\d+)/delete$", bind(state, blog_delete)))
        // services
        .handler(async_get("/admin/services", bind(state, service_list)))
        .handler(async_get("/admin/services/new", bind(state, service_new)))
        .handler(async_post("/admin/services", bind_body(state, service_create)))
        .handler(async_get(r"^/admin/services/(\d+)$", bind(state, service_edit)))
        .handler(async_post(r"^/admin/services/(\d+)$", bind_body(state, service_update)))
        .handler(async_action(r"^/admin/services/(\d+)/delete$", bind(state, service_delete)))
        // testimonials
        .handler(async_get("/admin/testimonials", bind(state, testimonial_list)))
        .handler(async_get("/admin/testimonials/new", bind(state, testimonial_new)))
        .handler(async_post("/admin/testimonials", bind_body(state, testimonial_create)))
        .handler(async_get(r"^/admin/testimonials/(\d+)$", bind(state, testimonial_edit)))
        .handler(async_post(r"^/admin/testimonials/(\d+)$", bind_body(state, testimonial_update)))
        .handler(async_action(r"^/admin/testimonials/(\d+)/delete$", bind(state, testimonial_delete)))
}

// ---- 共通 ----

/// フォーム検証の結果
enum Submission<D> {
    Valid(D),
    Invalid(ValidationErrors),
}

/// スラッグを持つドラフト
trait Slugged {
    fn slug(&self) -> &str;
}

impl Slugged for BlogPostDraft {
    fn slug(&self) -> &str {
        &self.slug
    }
}

impl Slugged for ServiceDraft {
    fn slug(&self) -> &str {
        &self.slug
    }
}

/// 入力検証に加えて、スラッグが他の行と重複しないかを確認する
async fn check_slug<D: Slugged>(
    state: &AppState,
    table: Table,
    parsed: Result<D, ValidationErrors>,
    except_id: Option<i64>,
) -> Result<Submission<D>, Error> {
    let draft = match parsed {
        Ok(draft) => draft,
        Err(errors) => return Ok(Submission::Invalid(errors)),
    };
    if state.content.slug_taken(table, draft.slug(), except_id).await? {
        let mut errors = ValidationErrors::new();
        errors.push("slug", "is already used by another entry");
        return Ok(Submission::Invalid(errors));
    }
    Ok(Submission::Valid(draft))
}

fn record_id(req: &Request) -> Result<i64, Error> {
    req.param(0)
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| Error::NotFound(req.path.clone()))
}

fn admin_page(
    state: &AppState,
    req: &Request,
    status: u16,
    title: &str,
    template: &str,
    context: Context,
) -> Result<Response, Error> {
    let user = current_admin(req)?;
    let html = state
        .templates
        .admin(template, &Page::new(title, &req.path), user, context)?;
    Ok(ResponseBuilder::new(status)
        .cache_control("no-store")
        .html(html)
        .build())
}

/// 一覧ページ上部のお知らせ（`?notice=`）
fn notice_from_query(req: &Request) -> Option<NoticeView> {
    let message = match req.query("notice") {
        Some("created") => "Created. The public site has been refreshed.",
        Some("updated") => "Changes saved. The public site has been refreshed.",
        Some("deleted") => "Deleted.",
        _ => return None,
    };
    Some(notice(message, false))
}

/// 一覧ページ
fn list_page<T: Serialize>(
    state: &AppState,
    req: &Request,
    title: &str,
    template: &str,
    key: &str,
    items: &T,
) -> Result<Response, Error> {
    let mut context = Context::new();
    context.insert("notice", &notice_from_query(req));
    context.insert(key, items);
    admin_page(state, req, 200, title, template, context)
}

/// 作成・編集フォームの画面
struct Editor<'a> {
    /// `/admin/{section}` の部分
    section: &'static str,
    heading: &'static str,
    submit: &'static str,
    record_id: Option<i64>,
    delete_label: Option<&'static str>,
    /// 公開中の記事なら公開ページへのリンクを出す
    view_slug: Option<&'a str>,
    fields: Vec<Field>,
}

impl<'a> Editor<'a> {
    fn create(section: &'static str, heading: &'static str, submit: &'static str, fields: Vec<Field>) -> Self {
        Self { section, heading, submit, record_id: None, delete_label: None, view_slug: None, fields }
    }

    fn edit(section: &'static str, heading: &'static str, id: i64, delete_label: &'static str, fields: Vec<Field>) -> Self {
        Self {
            section,
            heading,
            submit: "Save changes",
            record_id: Some(id),
            delete_label: Some(delete_label),
            view_slug: None,
            fields,
        }
    }

    fn render(self, state: &AppState, req: &Request, status: u16, errors: &ValidationErrors) -> Result<Response, Error> {
        let summary = (!errors.is_empty()).then(|| notice("Please correct the highlighted fields.", true));
        let mut context = Context::new();
        context.insert("section", self.section);
        context.insert("heading", self.heading);
        context.insert("submit", self.submit);
        context.insert("record_id", &self.record_id);
        context.insert("delete_label", &self.delete_label);
        context.insert("view_slug", &self.view_slug);
        context.insert("fields", &self.fields);
        context.insert("notice", &summary);
        admin_page(state, req, status, self.heading, "admin/editor.html", context)
    }
}

/// 監査ログを残し、影響する公開ページを破棄する
async fn finish_mutation(
    state: &AppState,
    user: &AdminUser,
    action: AuditAction,
    entity: &str,
    id: i64,
    detail: &str,
    paths: &[String],
) {
    state
        .audit
        .record(Some(user), action, entity, Some(&id.to_string()), Some(detail))
        .await;
    for path in paths {
        state.cache.revalidate_path(path);
    }
}

fn paths_with(base: &[&str], extra: impl IntoIterator<Item = String>) -> Vec<String> {
    base.iter().map(|p| p.to_string()).chain(extra).collect()
}

fn blog_paths(slugs: &[&str]) -> Vec<String> {
    paths_with(&["/", "/blog", "/sitemap.xml"], slugs.iter().map(|s| format!("/blog/{}", s)))
}

fn service_paths() -> Vec<String> {
    paths_with(&["/", "/services", "/sitemap.xml"], None)
}

fn testimonial_paths() -> Vec<String> {
    paths_with(&["/", "/testimonials"], None)
}

// ---- ダッシュボード ----

#[derive(Debug, Serialize)]
struct Stat {
    value: usize,
    label: &'static str,
}

fn stats(counts: &DashboardCounts) -> Vec<Stat> {
    vec![
        Stat { value: counts.published_posts, label: "Published posts" },
        Stat { value: counts.draft_posts, label: "Drafts" },
        Stat { value: counts.services, label: "Services" },
        Stat { value: counts.testimonials, label: "Testimonials" },
    ]
}

pub async fn dashboard(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let counts = state.content.dashboard_counts().await?;
    let recent = state.audit.recent(RECENT_AUDIT_ENTRIES).await.unwrap_or_else(|e| {
        warn!("Failed to load audit log: {}", e);
        Vec::new()
    });

    let mut context = Context::new();
    context.insert("stats", &stats(&counts));
    context.insert("activity", &recent.iter().map(AuditRow::from).collect::<Vec<_>>());
    admin_page(&state, &req, 200, "Dashboard", "admin/dashboard.html", context)
}

// ---- blog ----

fn blog_fields(form: &BlogPostForm, errors: &ValidationErrors) -> Vec<Field> {
    vec![
        Field::input("title", "Title", &form.title, InputKind::Text)
            .required()
            .error(errors.for_field("title")),
        Field::input("slug", "Slug", &form.slug, InputKind::Text)
            .error(errors.for_field("slug"))
            .hint("Leave blank to generate it from the title."),
        Field::textarea("excerpt", "Excerpt", &form.excerpt, 3).error(errors.for_field("excerpt")),
        Field::textarea("content", "Content", &form.content, 14)
            .required()
            .error(errors.for_field("content"))
            .hint("Separate paragraphs with a blank line."),
        Field::input("cover_image_url", "Cover image URL", &form.cover_image_url, InputKind::Url)
            .error(errors.for_field("cover_image_url")),
        Field::checkbox("published", "Published", is_checked(&form.published)),
    ]
}

fn blog_editor(
    state: &AppState,
    req: &Request,
    status: u16,
    existing: Option<&BlogPost>,
    form: &BlogPostForm,
    errors: &ValidationErrors,
) -> Result<Response, Error> {
    let fields = blog_fields(form, errors);
    let editor = match existing {
        Some(post) => Editor {
            view_slug: post.published.then_some(post.slug.as_str()),
            ..Editor::edit("blog", "Edit post", post.id, "Delete post", fields)
        },
        None => Editor::create("blog", "New post", "Create post", fields),
    };
    editor.render(state, req, status, errors)
}

pub async fn blog_list(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let posts = state.content.all_posts().await?;
    let views: Vec<PostView> = posts.iter().map(PostView::from).collect();
    list_page(&state, &req, "Blog posts", "admin/blog_list.html", "posts", &views)
}

pub async fn blog_new(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    blog_editor(&state, &req, 200, None, &BlogPostForm::default(), &ValidationErrors::new())
}

pub async fn blog_create(state: Arc<AppState>, req: Request, form: BlogPostForm) -> Result<Response, Error> {
    let user = current_admin(&req)?;
    let draft = match check_slug(&state, Table::BlogPosts, BlogPostDraft::try_from(&form), None).await? {
        Submission::Valid(draft) => draft,
        Submission::Invalid(errors) => return blog_editor(&state, &req, 422, None, &form, &errors),
    };
    let post = state.content.create_post(&draft).await?;
    finish_mutation(&state, user, AuditAction::Create, "blog_post", post.id, &post.title, &blog_paths(&[post.slug.as_str()])).await;
    Ok(Response::redirect("/admin/blog?notice=created"))
}

pub async fn blog_edit(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let post = state.content.post(record_id(&req)?).await?;
    blog_editor(&state, &req, 200, Some(&post), &BlogPostForm::from(&post), &ValidationErrors::new())
}

pub async fn blog_update(state: Arc<AppState>, req: Request, form: BlogPostForm) -> Result<Response, Error> {
    let user = current_admin(&req)?;
    let id = record_id(&req)?;
    let existing = state.content.post(id).await?;
    let draft = match check_slug(&state, Table::BlogPosts, BlogPostDraft::try_from(&form), Some(id)).await? {
        Submission::Valid(draft) => draft,
        Submission::Invalid(errors) => return blog_editor(&state, &req, 422, Some(&existing), &form, &errors),
    };
    let post = state.content.update_post(id, &draft).await?;
    // スラッグが変わった場合は旧URLも破棄する
    let paths = blog_paths(&[existing.slug.as_str(), post.slug.as_str()]);
    finish_mutation(&state, user, AuditAction::Update, "blog_post", id, &post.title, &paths).await;
    Ok(Response::redirect("/admin/blog?notice=updated"))
}

pub async fn blog_delete(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let user = current_admin(&req)?;
    let post = state.content.delete_post(record_id(&req)?).await?;
    finish_mutation(&state, user, AuditAction::Delete, "blog_post", post.id, &post.title, &blog_paths(&[post.slug.as_str()])).await;
    Ok(Response::redirect("/admin/blog?notice=deleted"))
}

// ---- services ----

fn service_fields(form: &ServiceForm, errors: &ValidationErrors) -> Vec<Field> {
    vec![
        Field::input("name", "Name", &form.name, InputKind::Text)
            .required()
            .error(errors.for_field("name")),
        Field::input("slug", "Slug", &form.slug, InputKind::Text)
            .error(errors.for_field("slug"))
            .hint("Leave blank to generate it from the name."),
        Field::input("summary", "Summary", &form.summary, InputKind::Text)
            .required()
            .error(errors.for_field("summary")),
        Field::textarea("description", "Description", &form.description, 8).error(errors.for_field("description")),
        Field::input("price_from", "Price", &form.price_from, InputKind::Text)
            .error(errors.for_field("price_from"))
            .hint("For example: from $95"),
        Field::input("sort_order", "Sort order", &form.sort_order, InputKind::Number)
            .error(errors.for_field("sort_order")),
        Field::checkbox("active", "Shown on the site", is_checked(&form.active)),
    ]
}

fn service_editor(
    state: &AppState,
    req: &Request,
    status: u16,
    existing: Option<&Service>,
    form: &ServiceForm,
    errors: &ValidationErrors,
) -> Result<Response, Error> {
    let fields = service_fields(form, errors);
    let editor = match existing {
        Some(service) => Editor::edit("services", "Edit service", service.id, "Delete service", fields),
        None => Editor::create("services", "New service", "Create service", fields),
    };
    editor.render(state, req, status, errors)
}

pub async fn service_list(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let services = state.content.all_services().await?;
    let views: Vec<ServiceView> = services.iter().map(ServiceView::from).collect();
    list_page(&state, &req, "Services", "admin/service_list.html", "services", &views)
}

pub async fn service_new(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let form = ServiceForm {
        sort_order: "0".to_string(),
        active: Some("on".to_string()),
        ..ServiceForm::default()
    };
    service_editor(&state, &req, 200, None, &form, &ValidationErrors::new())
}

pub async fn service_create(state: Arc<AppState>, req: Request, form: ServiceForm) -> Result<Response, Error> {
    let user = current_admin(&req)?;
    let draft = match check_slug(&state, Table::Services, ServiceDraft::try_from(&form), None).await? {
        Submission::Valid(draft) => draft,
        Submission::Invalid(errors) => return service_editor(&state, &req, 422, None, &form, &errors),
    };
    let service = state.content.create_service(&draft).await?;
    finish_mutation(&state, user, AuditAction::Create, "service", service.id, &service.name, &service_paths()).await;
    Ok(Response::redirect("/admin/services?notice=created"))
}

pub async fn service_edit(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let service = state.content.service(record_id(&req)?).await?;
    service_editor(&state, &req, 200, Some(&service), &ServiceForm::from(&service), &ValidationErrors::new())
}

pub async fn service_update(state: Arc<AppState>, req: Request, form: ServiceForm) -> Result<Response, Error> {
    let user = current_admin(&req)?;
    let id = record_id(&req)?;
    let existing = state.content.service(id).await?;
    let draft = match check_slug(&state, Table::Services, ServiceDraft::try_from(&form), Some(id)).await? {
        Submission::Valid(draft) => draft,
        Submission::Invalid(errors) => return service_editor(&state, &req, 422, Some(&existing), &form, &errors),
    };
    let service = state.content.update_service(id, &draft).await?;
    finish_mutation(&state, user, AuditAction::Update, "service", id, &service.name, &service_paths()).await;
    Ok(Response::redirect("/admin/services?notice=updated"))
}

pub async fn service_delete(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let user = current_admin(&req)?;
    let service = state.content.delete_service(record_id(&req)?).await?;
    finish_mutation(&state, user, AuditAction::Delete, "service", service.id, &service.name, &service_paths()).await;
    Ok(Response::redirect("/admin/services?notice=deleted"))
}

// ---- testimonials ----

fn testimonial_fields(form: &TestimonialForm, errors: &ValidationErrors) -> Vec<Field> {
    vec![
        Field::input("author_name", "Patient name", &form.author_name, InputKind::Text)
            .required()
            .error(errors.for_field("author_name")),
        Field::input("author_detail", "Detail", &form.author_detail, InputKind::Text)
            .error(errors.for_field("author_detail"))
            .hint("For example: Patient since 2019"),
        Field::textarea("quote", "Quote", &form.quote, 5)
            .required()
            .error(errors.for_field("quote")),
        Field::input("rating", "Rating (1-5)", &form.rating, InputKind::Number)
            .required()
            .error(errors.for_field("rating")),
        Field::checkbox("featured", "Featured on the home page", is_checked(&form.featured)),
        Field::checkbox("published", "Published", is_checked(&form.published)),
    ]
}

fn testimonial_editor(
    state: &AppState,
    req: &Request,
    status: u16,
    existing: Option<&Testimonial>,
    form: &TestimonialForm,
    errors: &ValidationErrors,
) -> Result<Response, Error> {
    let fields = testimonial_fields(form, errors);
    let editor = match existing {
        Some(t) => Editor::edit("testimonials", "Edit testimonial", t.id, "Delete testimonial", fields),
        None => Editor::create("testimonials", "New testimonial", "Create testimonial", fields),
    };
    editor.render(state, req, status, errors)
}

fn parse_testimonial(form: &TestimonialForm) -> Submission<TestimonialDraft> {
    match TestimonialDraft::try_from(form) {
        Ok(draft) => Submission::Valid(draft),
        Err(errors) => Submission::Invalid(errors),
    }
}

pub async fn testimonial_list(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let testimonials = state.content.all_testimonials().await?;
    let views: Vec<TestimonialView> = testimonials.iter().map(TestimonialView::from).collect();
    list_page(&state, &req, "Testimonials", "admin/testimonial_list.html", "testimonials", &views)
}

pub async fn testimonial_new(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let form = TestimonialForm {
        rating: "5".to_string(),
        published: Some("on".to_string()),
        ..TestimonialForm::default()
    };
    testimonial_editor(&state, &req, 200, None, &form, &ValidationErrors::new())
}

pub async fn testimonial_create(state: Arc<AppState>, req: Request, form: TestimonialForm) -> Result<Response, Error> {
    let user = current_admin(&req)?;
    let draft = match parse_testimonial(&form) {
        Submission::Valid(draft) => draft,
        Submission::Invalid(errors) => return testimonial_editor(&state, &req, 422, None, &form, &errors),
    };
    let t = state.content.create_testimonial(&draft).await?;
    finish_mutation(&state, user, AuditAction::Create, "testimonial", t.id, &t.author_name, &testimonial_paths()).await;
    Ok(Response::redirect("/admin/testimonials?notice=created"))
}

pub async fn testimonial_edit(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let t = state.content.testimonial(record_id(&req)?).await?;
    testimonial_editor(&state, &req, 200, Some(&t), &TestimonialForm::from(&t), &ValidationErrors::new())
}

pub async fn testimonial_update(state: Arc<AppState>, req: Request, form: TestimonialForm) -> Result<Response, Error> {
    let user = current_admin(&req)?;
    let id = record_id(&req)?;
    let existing = state.content.testimonial(id).await?;
    let draft = match parse_testimonial(&form) {
        Submission::Valid(draft) => draft,
        Submission::Invalid(errors) => return testimonial_editor(&state, &req, 422, Some(&existing), &form, &errors),
    };
    let t = state.content.update_testimonial(id, &draft).await?;
    finish_mutation(&state, user, AuditAction::Update, "testimonial", id, &t.author_name, &testimonial_paths()).await;
    Ok(Response::redirect("/admin/testimonials?notice=updated"))
}

pub async fn testimonial_delete(state: Arc<AppState>, req: Request) -> Result<Response, Error> {
    let user = current_admin(&req)?;
    let t = state.content.delete_testimonial(record_id(&req)?).await?;
    finish_mutation(&state, user, AuditAction::Delete, "testimonial", t.id, &t.author_name, &testimonial_paths()).await;
    Ok(Response::redirect("/admin/testimonials?notice=deleted"))
}
