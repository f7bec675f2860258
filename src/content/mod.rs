//! サイトのコンテンツ（ブログ・診療メニュー・患者さんの声）
//!
//! - [`model`]: バックエンドの行を表す型
//! - [`forms`]: 管理画面のフォーム入力と検証済みドラフト
//! - [`store`]: 行単位のCRUDを行うバックエンドの抽象
//! - [`repository`]: ストアの上の型付き操作

pub mod forms;
pub mod memory;
pub mod model;
pub mod repository;
pub mod rest;
pub mod slug;
pub mod store;

pub use forms::{
    BlogPostDraft, BlogPostForm, ServiceDraft, ServiceForm, TestimonialDraft, TestimonialForm,
    ValidationErrors,
};
pub use memory::MemoryStore;
pub use model::{BlogPost, Service, Testimonial};
pub use repository::{ContentRepository, DashboardCounts};
pub use rest::RestStore;
pub use slug::{is_valid_slug, slugify};
pub use store::{BackendError, ContentStore, Query, Table};
