//! 管理画面フォームの入力と検証済みドラフト
//!
//! フォームは生の文字列のまま受け取り、`TryFrom` でドラフトへ変換する際に
//! まとめて検証する。検証に失敗した場合は入力値を保ったままフォームを再表示できる。

use std::fmt;

use serde::{Deserialize, Serialize};

use super::model::{BlogPost, Service, Testimonial};
use super::slug::{is_valid_slug, slugify, MAX_SLUG_LEN};
use crate::error::Error;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_EXCERPT_LEN: usize = 500;
pub const MAX_CONTENT_LEN: usize = 50_000;
pub const MAX_NAME_LEN: usize = 120;
pub const MAX_SUMMARY_LEN: usize = 300;
pub const MAX_DESCRIPTION_LEN: usize = 10_000;
pub const MAX_PRICE_LEN: usize = 60;
pub const MAX_QUOTE_LEN: usize = 2_000;
pub const MAX_URL_LEN: usize = 2_048;

/// 1項目分の検証エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// フォーム全体の検証エラー
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError { field, message: message.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// 指定項目の最初のエラーメッセージ
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.0.iter().find(|e| e.field == field).map(|e| e.message.as_str())
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| format!("{}: {}", e.field, e.message)).collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors.to_string())
    }
}

/// チェックボックスの値（未送信はNone）
pub fn is_checked(value: &Option<String>) -> bool {
    matches!(
        value.as_deref().map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("on" | "true" | "1" | "yes")
    )
}

fn required(errors: &mut ValidationErrors, field: &'static str, value: &str, max: usize) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(field, "is required");
    } else if trimmed.chars().count() > max {
        errors.push(field, format!("must be at most {} characters", max));
    }
    trimmed.to_string()
}

fn optional(errors: &mut ValidationErrors, field: &'static str, value: &str, max: usize) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() > max {
        errors.push(field, format!("must be at most {} characters", max));
    }
    Some(trimmed.to_string())
}

/// 任意のURL（http/httpsのみ）
fn optional_url(errors: &mut ValidationErrors, field: &'static str, value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        errors.push(field, "must start with http:// or https://");
    } else if trimmed.len() > MAX_URL_LEN {
        errors.push(field, "is too long");
    } else if trimmed.chars().any(|c| c.is_whitespace() || c == '"' || c == '<' || c == '>') {
        errors.push(field, "contains invalid characters");
    }
    Some(trimmed.to_string())
}

/// 入力されたスラッグ、空なら元の文字列から生成したもの
fn slug_or_derived(errors: &mut ValidationErrors, value: &str, source: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        let derived = slugify(source);
        if derived.is_empty() && !source.trim().is_empty() {
            errors.push("slug", "could not be derived from the title; please enter one");
        }
        return derived;
    }
    if !is_valid_slug(trimmed) {
        errors.push(
            "slug",
            format!(
                "may only contain lowercase letters, digits and hyphens (max {} characters)",
                MAX_SLUG_LEN
            ),
        );
    }
    trimmed.to_string()
}

/// ブログ記事フォーム
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlogPostForm {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub cover_image_url: String,
    pub published: Option<String>,
}

/// 検証済みのブログ記事
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BlogPostDraft {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image_url: Option<String>,
    pub published: bool,
}

impl TryFrom<&BlogPostForm> for BlogPostDraft {
    type Error = ValidationErrors;

    fn try_from(form: &BlogPostForm) -> Result<Self, Self::Error> {
        let mut errors = ValidationErrors::new();
        let title = required(&mut errors, "title", &form.title, MAX_TITLE_LEN);
        let slug = slug_or_derived(&mut errors, &form.slug, &form.title);
        let excerpt = optional(&mut errors, "excerpt", &form.excerpt, MAX_EXCERPT_LEN);
        let content = required(&mut errors, "content", &form.content, MAX_CONTENT_LEN);
        let cover_image_url = optional_url(&mut errors, "cover_image_url", &form.cover_image_url);

        errors.finish(BlogPostDraft {
            title,
            slug,
            excerpt,
            content,
            cover_image_url,
            published: is_checked(&form.published),
        })
    }
}

impl From<&BlogPost> for BlogPostForm {
    fn from(post: &BlogPost) -> Self {
        Self {
            title: post.title.clone(),
            slug: post.slug.clone(),
            excerpt: post.excerpt.clone().unwrap_or_default(),
            content: post.content.clone(),
            cover_image_url: post.cover_image_url.clone().unwrap_or_default(),
            published: post.published.then(|| "on".to_string()),
        }
    }
}

/// 診療メニューフォーム
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceForm {
    pub name: String,
    pub slug: String,
    pub summary: String,
    pub description: String,
    pub price_from: String,
    pub sort_order: String,
    pub active: Option<String>,
}

/// 検証済みの診療メニュー
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceDraft {
    pub name: String,
    pub slug: String,
    pub summary: String,
    pub description: Option<String>,
    pub price_from: Option<String>,
    pub sort_order: i32,
    pub active: bool,
}

impl TryFrom<&ServiceForm> for ServiceDraft {
    type Error = ValidationErrors;

    fn try_from(form: &ServiceForm) -> Result<Self, Self::Error> {
        let mut errors = ValidationErrors::new();
        let name = required(&mut errors, "name", &form.name, MAX_NAME_LEN);
        let slug = slug_or_derived(&mut errors, &form.slug, &form.name);
        let summary = required(&mut errors, "summary", &form.summary, MAX_SUMMARY_LEN);
        let description = optional(&mut errors, "description", &form.description, MAX_DESCRIPTION_LEN);
        let price_from = optional(&mut errors, "price_from", &form.price_from, MAX_PRICE_LEN);

        let raw_order = form.sort_order.trim();
        let sort_order = if raw_order.is_empty() {
            0
        } else {
            raw_order.parse::<i32>().unwrap_or_else(|_| {
                errors.push("sort_order", "must be a whole number");
                0
            })
        };

        errors.finish(ServiceDraft {
            name,
            slug,
            summary,
            description,
            price_from,
            sort_order,
            active: is_checked(&form.active),
        })
    }
}

impl From<&Service> for ServiceForm {
    fn from(service: &Service) -> Self {
        Self {
            name: service.name.clone(),
            slug: service.slug.clone(),
            summary: service.summary.clone(),
            description: service.description.clone().unwrap_or_default(),
            price_from: service.price_from.clone().unwrap_or_default(),
            sort_order: service.sort_order.to_string(),
            active: service.active.then(|| "on".to_string()),
        }
    }
}

/// 患者さんの声フォーム
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TestimonialForm {
    pub author_name: String,
    pub author_detail: String,
    pub quote: String,
    pub rating: String,
    pub featured: Option<String>,
    pub published: Option<String>,
}

/// 検証済みの患者さんの声
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TestimonialDraft {
    pub author_name: String,
    pub author_detail: Option<String>,
    pub quote: String,
    pub rating: u8,
    pub featured: bool,
    pub published: bool,
}

impl TryFrom<&TestimonialForm> for TestimonialDraft {
    type Error = ValidationErrors;

    fn try_from(form: &TestimonialForm) -> Result<Self, Self::Error> {
        let mut errors = ValidationErrors::new();
        let author_name = required(&mut errors, "author_name", &form.author_name, MAX_NAME_LEN);
        let author_detail = optional(&mut errors, "author_detail", &form.author_detail, MAX_NAME_LEN);
        let quote = required(&mut errors, "quote", &form.quote, MAX_QUOTE_LEN);

        let rating = match form.rating.trim().parse::<u8>() {
            Ok(r) if (1..=5).contains(&r) => r,
            _ => {
                errors.push("rating", "must be between 1 and 5");
                0
            }
        };

        errors.finish(TestimonialDraft {
            author_name,
            author_detail,
            quote,
            rating,
            featured: is_checked(&form.featured),
            published: is_checked(&form.published),
        })
    }
}

impl From<&Testimonial> for TestimonialForm {
    fn from(t: &Testimonial) -> Self {
        Self {
            author_name: t.author_name.clone(),
            author_detail: t.author_detail.clone().unwrap_or_default(),
            quote: t.quote.clone(),
            rating: t.rating.to_string(),
            featured: t.featured.then(|| "on".to_string()),
            published: t.published.then(|| "on".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_form() -> BlogPostForm {
        BlogPostForm {
            title: "  What to Expect at Your First Visit ".into(),
            content: "We start with a gentle exam.".into(),
            published: Some("on".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_blog_post_draft_derives_slug() {
        let draft = BlogPostDraft::try_from(&post_form()).unwrap();
        assert_eq!(draft.title, "What to Expect at Your First Visit");
        assert_eq!(draft.slug, "what-to-expect-at-your-first-visit");
        assert_eq!(draft.excerpt, None);
        assert!(draft.published);
    }

    #[test]
    fn test_blog_post_draft_collects_all_errors() {
        let form = BlogPostForm {
            title: " ".into(),
            slug: "Bad Slug".into(),
            cover_image_url: "javascript:alert(1)".into(),
            ..Default::default()
        };
        let errors = BlogPostDraft::try_from(&form).unwrap_err();
        assert_eq!(errors.for_field("title"), Some("is required"));
        assert!(errors.for_field("slug").is_some());
        assert_eq!(errors.for_field("content"), Some("is required"));
        assert_eq!(errors.for_field("cover_image_url"), Some("must start with http:// or https://"));

        let err: Error = errors.into();
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn test_underivable_slug() {
        let form = BlogPostForm { title: "矯正歯科".into(), content: "x".into(), ..Default::default() };
        let errors = BlogPostDraft::try_from(&form).unwrap_err();
        assert!(errors.for_field("slug").is_some());
        assert!(errors.for_field("title").is_none());
    }

    #[test]
    fn test_title_length_limit() {
        let form = BlogPostForm { title: "a".repeat(MAX_TITLE_LEN + 1), ..post_form() };
        let errors = BlogPostDraft::try_from(&form).unwrap_err();
        assert_eq!(errors.for_field("title"), Some("must be at most 200 characters"));
    }

    #[test]
    fn test_service_draft() {
        let form = ServiceForm {
            name: "Teeth Whitening".into(),
            summary: "Brighter smile in one visit".into(),
            price_from: "from $250".into(),
            sort_order: " 3 ".into(),
            active: Some("on".into()),
            ..Default::default()
        };
        let draft = ServiceDraft::try_from(&form).unwrap();
        assert_eq!(draft.slug, "teeth-whitening");
        assert_eq!(draft.sort_order, 3);
        assert_eq!(draft.price_from.as_deref(), Some("from $250"));
        assert!(draft.active);
        assert_eq!(draft.description, None);

        let bad = ServiceForm { sort_order: "first".into(), ..form };
        let errors = ServiceDraft::try_from(&bad).unwrap_err();
        assert_eq!(errors.for_field("sort_order"), Some("must be a whole number"));
    }

    #[test]
    fn test_testimonial_rating_bounds() {
        let mut form = TestimonialForm {
            author_name: "Maria G.".into(),
            quote: "Painless and friendly!".into(),
            rating: "5".into(),
            published: Some("true".into()),
            ..Default::default()
        };
        let draft = TestimonialDraft::try_from(&form).unwrap();
        assert_eq!(draft.rating, 5);
        assert!(draft.published);
        assert!(!draft.featured);

        for bad in ["0", "6", "", "four", "-1"] {
            form.rating = bad.into();
            let errors = TestimonialDraft::try_from(&form).unwrap_err();
            assert_eq!(errors.for_field("rating"), Some("must be between 1 and 5"), "{}", bad);
        }
    }

    #[test]
    fn test_is_checked() {
        assert!(is_checked(&Some("on".into())));
        assert!(is_checked(&Some("TRUE".into())));
        assert!(is_checked(&Some("1".into())));
        assert!(!is_checked(&Some("off".into())));
        assert!(!is_checked(&Some(String::new())));
        assert!(!is_checked(&None));
    }

    #[test]
    fn test_validation_errors_display() {
        let mut errors = ValidationErrors::new();
        errors.push("title", "is required");
        errors.push("rating", "must be between 1 and 5");
        assert_eq!(errors.to_string(), "title: is required; rating: must be between 1 and 5");
    }
}
