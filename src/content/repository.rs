//! 型付きのコンテンツ操作
//!
//! ストアから受け取ったJSON行はここで型にデコードする。デコードできない行は
//! `BackendError::Decode` として呼び出し元へ返し、空の一覧として扱うことはしない。

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::forms::{BlogPostDraft, ServiceDraft, TestimonialDraft};
use super::model::{BlogPost, Service, Testimonial};
use super::store::{BackendError, ContentStore, Query, Table};

/// 管理画面ダッシュボードの件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardCounts {
    pub published_posts: usize,
    pub draft_posts: usize,
    pub services: usize,
    pub testimonials: usize,
}

/// 公開状態から `published_at` を決める
///
/// 公開中は既存の公開日を保ち、無ければ `now`。非公開にすると消える。
pub fn resolve_published_at(
    published: bool,
    existing: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if published {
        Some(existing.unwrap_or(now))
    } else {
        None
    }
}

fn decode<T: DeserializeOwned>(table: Table, row: Value) -> Result<T, BackendError> {
    serde_json::from_value(row).map_err(|e| BackendError::Decode(format!("{} row: {}", table, e)))
}

fn decode_all<T: DeserializeOwned>(table: Table, rows: Vec<Value>) -> Result<Vec<T>, BackendError> {
    rows.into_iter().map(|row| decode(table, row)).collect()
}

fn encode<T: Serialize>(value: &T) -> Result<Value, BackendError> {
    serde_json::to_value(value).map_err(|e| BackendError::Decode(e.to_string()))
}

/// ストアに書き込むタイムスタンプ表記（文字列比較でも時刻順になるよう桁を固定）
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn with_published_at(mut row: Value, published_at: Option<DateTime<Utc>>) -> Value {
    if let Some(obj) = row.as_object_mut() {
        obj.insert(
            "published_at".to_string(),
            published_at.map_or(Value::Null, |at| json!(timestamp(at))),
        );
    }
    row
}

/// ストアをラップして型付きの操作を提供する
#[derive(Clone)]
pub struct ContentRepository {
    store: Arc<dyn ContentStore>,
}

impl ContentRepository {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn ContentStore> {
        Arc::clone(&self.store)
    }

    async fn fetch<T: DeserializeOwned>(&self, table: Table, query: Query) -> Result<Vec<T>, BackendError> {
        let rows = self.store.select(table, &query).await?;
        decode_all(table, rows)
    }

    async fn fetch_one<T: DeserializeOwned>(&self, table: Table, query: Query) -> Result<Option<T>, BackendError> {
        let mut rows = self.store.select(table, &query.limit(1)).await?;
        match rows.pop() {
            Some(row) => decode(table, row).map(Some),
            None => Ok(None),
        }
    }

    async fn by_id<T: DeserializeOwned>(&self, table: Table, id: i64) -> Result<T, BackendError> {
        self.fetch_one(table, Query::new().eq("id", id))
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("{}#{}", table, id)))
    }

    /// スラッグが他の行で使われているか
    pub async fn slug_taken(&self, table: Table, slug: &str, except_id: Option<i64>) -> Result<bool, BackendError> {
        let rows = self.store.select(table, &Query::new().eq("slug", slug)).await?;
        Ok(rows
            .iter()
            .any(|row| row.get("id").and_then(Value::as_i64) != except_id))
    }

    // ---- blog ----

    /// 公開済み記事（新しい順）
    pub async fn published_posts(&self, limit: Option<usize>) -> Result<Vec<BlogPost>, BackendError> {
        let mut query = Query::new().eq("published", true).order_by_desc("published_at").order_by_desc("id");
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        self.fetch(Table::BlogPosts, query).await
    }

    /// 公開済み記事をスラッグで取得
    pub async fn published_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, BackendError> {
        self.fetch_one(Table::BlogPosts, Query::new().eq("slug", slug).eq("published", true))
            .await
    }

    /// 管理画面用の全記事（下書き含む）
    pub async fn all_posts(&self) -> Result<Vec<BlogPost>, BackendError> {
        self.fetch(Table::BlogPosts, Query::new().order_by_desc("created_at").order_by_desc("id"))
            .await
    }

    pub async fn post(&self, id: i64) -> Result<BlogPost, BackendError> {
        self.by_id(Table::BlogPosts, id).await
    }

    pub async fn create_post(&self, draft: &BlogPostDraft) -> Result<BlogPost, BackendError> {
        let published_at = resolve_published_at(draft.published, None, Utc::now());
        let row = with_published_at(encode(draft)?, published_at);
        let created = self.store.insert(Table::BlogPosts, row).await?;
        let post: BlogPost = decode(Table::BlogPosts, created)?;
        info!("Created blog post #{} ({})", post.id, post.slug);
        Ok(post)
    }

    pub async fn update_post(&self, id: i64, draft: &BlogPostDraft) -> Result<BlogPost, BackendError> {
        let existing = self.post(id).await?;
        let published_at = resolve_published_at(draft.published, existing.published_at, Utc::now());
        let patch = with_published_at(encode(draft)?, published_at);
        let updated = self.store.update(Table::BlogPosts, id, patch).await?;
        decode(Table::BlogPosts, updated)
    }

    /// 記事を削除し、削除前の内容を返す（キャッシュ破棄にスラッグが要る）
    pub async fn delete_post(&self, id: i64) -> Result<BlogPost, BackendError> {
        let existing = self.post(id).await?;
        self.store.delete(Table::BlogPosts, id).await?;
        info!("Deleted blog post #{}", id);
        Ok(existing)
    }

    // ---- services ----

    /// 公開中の診療メニュー（表示順）
    pub async fn active_services(&self) -> Result<Vec<Service>, BackendError> {
        self.fetch(Table::Services, Query::new().eq("active", true).order_by("sort_order").order_by("id"))
            .await
    }

    pub async fn all_services(&self) -> Result<Vec<Service>, BackendError> {
        self.fetch(Table::Services, Query::new().order_by("sort_order").order_by("id"))
            .await
    }

    pub async fn service(&self, id: i64) -> Result<Service, BackendError> {
        self.by_id(Table::Services, id).await
    }

    pub async fn create_service(&self, draft: &ServiceDraft) -> Result<Service, BackendError> {
        let created = self.store.insert(Table::Services, encode(draft)?).await?;
        decode(Table::Services, created)
    }

    pub async fn update_service(&self, id: i64, draft: &ServiceDraft) -> Result<Service, BackendError> {
        let updated = self.store.update(Table::Services, id, encode(draft)?).await?;
        decode(Table::Services, updated)
    }

    pub async fn delete_service(&self, id: i64) -> Result<Service, BackendError> {
        let existing = self.service(id).await?;
        self.store.delete(Table::Services, id).await?;
        Ok(existing)
    }

    // ---- testimonials ----

    /// 公開中の患者さんの声（新しい順）
    pub async fn published_testimonials(&self) -> Result<Vec<Testimonial>, BackendError> {
        self.fetch(
            Table::Testimonials,
            Query::new().eq("published", true).order_by_desc("created_at").order_by_desc("id"),
        )
        .await
    }

    /// トップページ用のおすすめ
    pub async fn featured_testimonials(&self, limit: usize) -> Result<Vec<Testimonial>, BackendError> {
        self.fetch(
            Table::Testimonials,
            Query::new()
                .eq("published", true)
                .eq("featured", true)
                .order_by_desc("created_at")
                .order_by_desc("id")
                .limit(limit),
        )
        .await
    }

    pub async fn all_testimonials(&self) -> Result<Vec<Testimonial>, BackendError> {
        self.fetch(Table::Testimonials, Query::new().order_by_desc("created_at").order_by_desc("id"))
            .await
    }

    pub async fn testimonial(&self, id: i64) -> Result<Testimonial, BackendError> {
        self.by_id(Table::Testimonials, id).await
    }

    pub async fn create_testimonial(&self, draft: &TestimonialDraft) -> Result<Testimonial, BackendError> {
        let created = self.store.insert(Table::Testimonials, encode(draft)?).await?;
        decode(Table::Testimonials, created)
    }

    pub async fn update_testimonial(&self, id: i64, draft: &TestimonialDraft) -> Result<Testimonial, BackendError> {
        let updated = self.store.update(Table::Testimonials, id, encode(draft)?).await?;
        decode(Table::Testimonials, updated)
    }

    pub async fn delete_testimonial(&self, id: i64) -> Result<Testimonial, BackendError> {
        let existing = self.testimonial(id).await?;
        self.store.delete(Table::Testimonials, id).await?;
        Ok(existing)
    }

    /// ダッシュボードの件数
    pub async fn dashboard_counts(&self) -> Result<DashboardCounts, BackendError> {
        let posts = self.store.select(Table::BlogPosts, &Query::new()).await?;
        let published_posts = posts
            .iter()
            .filter(|p| p.get("published").and_then(Value::as_bool).unwrap_or(false))
            .count();
        let services = self.store.select(Table::Services, &Query::new()).await?.len();
        let testimonials = self.store.select(Table::Testimonials, &Query::new()).await?.len();
        debug!("dashboard counts: {} posts, {} services", posts.len(), services);
        Ok(DashboardCounts {
            published_posts,
            draft_posts: posts.len() - published_posts,
            services,
            testimonials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::memory::MemoryStore;
    use crate::content::store::MockContentStore;
    use chrono::TimeZone;
    use mockall::predicate::eq;

    fn repo() -> ContentRepository {
        ContentRepository::new(Arc::new(MemoryStore::new()))
    }

    fn draft(title: &str, slug: &str, published: bool) -> BlogPostDraft {
        BlogPostDraft {
            title: title.to_string(),
            slug: slug.to_string(),
            excerpt: None,
            content: "Body".to_string(),
            cover_image_url: None,
            published,
        }
    }

    #[test]
    fn test_resolve_published_at() {
        let then = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(resolve_published_at(true, None, now), Some(now));
        assert_eq!(resolve_published_at(true, Some(then), now), Some(then));
        assert_eq!(resolve_published_at(false, Some(then), now), None);
        assert_eq!(resolve_published_at(false, None, now), None);
    }

    #[tokio::test]
    async fn test_publication_lifecycle() {
        let repo = repo();
        let created = repo.create_post(&draft("Draft", "draft", false)).await.unwrap();
        assert!(created.published_at.is_none());
        assert!(repo.published_post_by_slug("draft").await.unwrap().is_none());

        let published = repo.update_post(created.id, &draft("Draft", "draft", true)).await.unwrap();
        let first_published_at = published.published_at.unwrap();
        assert!(repo.published_post_by_slug("draft").await.unwrap().is_some());

        // 公開中の再保存では公開日が変わらない
        let resaved = repo.update_post(created.id, &draft("Draft v2", "draft", true)).await.unwrap();
        assert_eq!(resaved.published_at, Some(first_published_at));
        assert_eq!(resaved.title, "Draft v2");

        let unpublished = repo.update_post(created.id, &draft("Draft v2", "draft", false)).await.unwrap();
        assert!(unpublished.published_at.is_none());
    }

    #[tokio::test]
    async fn test_listing_order_and_counts() {
        let repo = repo();
        repo.create_post(&draft("One", "one", true)).await.unwrap();
        repo.create_post(&draft("Two", "two", true)).await.unwrap();
        repo.create_post(&draft("Hidden", "hidden", false)).await.unwrap();

        let posts = repo.published_posts(None).await.unwrap();
        let slugs: Vec<&str> = posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["two", "one"]);
        assert_eq!(repo.published_posts(Some(1)).await.unwrap().len(), 1);
        assert_eq!(repo.all_posts().await.unwrap().len(), 3);

        let counts = repo.dashboard_counts().await.unwrap();
        assert_eq!(counts.published_posts, 2);
        assert_eq!(counts.draft_posts, 1);
        assert_eq!(counts.services, 0);
    }

    #[tokio::test]
    async fn test_slug_taken() {
        let repo = repo();
        let post = repo.create_post(&draft("One", "one", true)).await.unwrap();
        assert!(repo.slug_taken(Table::BlogPosts, "one", None).await.unwrap());
        assert!(!repo.slug_taken(Table::BlogPosts, "one", Some(post.id)).await.unwrap());
        assert!(!repo.slug_taken(Table::BlogPosts, "two", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_services_and_testimonials() {
        let repo = repo();
        let service = ServiceDraft {
            name: "Cleaning".into(),
            slug: "cleaning".into(),
            summary: "s".into(),
            description: None,
            price_from: None,
            sort_order: 2,
            active: true,
        };
        let hidden = ServiceDraft { name: "Old".into(), slug: "old".into(), active: false, sort_order: 1, ..service.clone() };
        repo.create_service(&service).await.unwrap();
        repo.create_service(&hidden).await.unwrap();
        let active = repo.active_services().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(repo.all_services().await.unwrap()[0].slug, "old");

        let t = TestimonialDraft {
            author_name: "Ana".into(),
            author_detail: None,
            quote: "Great".into(),
            rating: 5,
            featured: true,
            published: true,
        };
        let created = repo.create_testimonial(&t).await.unwrap();
        assert_eq!(repo.featured_testimonials(3).await.unwrap().len(), 1);
        let deleted = repo.delete_testimonial(created.id).await.unwrap();
        assert_eq!(deleted.author_name, "Ana");
        assert!(matches!(repo.testimonial(created.id).await, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_malformed_rows_are_errors() {
        let mut store = MockContentStore::new();
        store
            .expect_select()
            .withf(|table, _| *table == Table::BlogPosts)
            .returning(|_, _| Ok(vec![json!({ "id": "not-a-number" })]));
        let repo = ContentRepository::new(Arc::new(store));
        assert!(matches!(repo.published_posts(None).await, Err(BackendError::Decode(_))));
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let mut store = MockContentStore::new();
        store
            .expect_select()
            .returning(|_, _| Err(BackendError::Transport("connection refused".into())));
        store.expect_delete().with(eq(Table::Services), eq(7)).never();
        let repo = ContentRepository::new(Arc::new(store));

        assert!(matches!(repo.active_services().await, Err(BackendError::Transport(_))));
        // 取得に失敗したら削除は呼ばれない
        assert!(matches!(repo.delete_service(7).await, Err(BackendError::Transport(_))));
    }
}
