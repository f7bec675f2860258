//! テンプレートに渡す表示用の値
//!
//! 行の型をそのまま渡さず、日付の整形やクラス名の決定はここで済ませる。
//! エスケープはテンプレート側の自動エスケープに任せるため、ここでは行わない。

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::audit::AuditEntry;
use crate::class_names;
use crate::content::{BlogPost, Service, Testimonial};

use super::styles::{BADGE, CARD, FIELD, NOTICE};

/// 本文を段落ごとの行に分ける（空行区切り）
pub fn paragraphs(text: &str) -> Vec<Vec<String>> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.lines().map(str::to_string).collect())
        .collect()
}

/// 表示用の日付（例: `March 1, 2024`）
pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%B %-d, %Y").to_string()
}

/// `<time>` 要素に使う日付
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DateView {
    pub iso: String,
    pub display: String,
}

impl From<DateTime<Utc>> for DateView {
    fn from(at: DateTime<Utc>) -> Self {
        Self { iso: at.format("%Y-%m-%d").to_string(), display: format_date(at) }
    }
}

/// 状態バッジ
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BadgeView {
    pub label: &'static str,
    pub class: String,
}

pub fn badge(label: &'static str, positive: bool) -> BadgeView {
    BadgeView {
        label,
        class: class_names!(BADGE.base, if positive { BADGE.success } else { BADGE.muted }),
    }
}

/// お知らせバナー
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NoticeView {
    pub message: String,
    pub class: String,
    pub role: &'static str,
}

pub fn notice(message: &str, is_error: bool) -> NoticeView {
    NoticeView {
        message: message.to_string(),
        class: class_names!(NOTICE.base, is_error.then_some(NOTICE.error)),
        role: if is_error { "alert" } else { "status" },
    }
}

/// ブログ記事
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub date: DateView,
    pub paragraphs: Vec<Vec<String>>,
    pub cover_image_url: Option<String>,
    pub published: bool,
    pub status: BadgeView,
}

impl PostView {
    /// カードに出す要約の長さ
    pub const CARD_SUMMARY: usize = 200;
}

impl From<&BlogPost> for PostView {
    fn from(post: &BlogPost) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            slug: post.slug.clone(),
            summary: post.summary(Self::CARD_SUMMARY),
            date: post.display_date().into(),
            paragraphs: paragraphs(&post.content),
            cover_image_url: post.cover_image_url.clone(),
            published: post.published,
            status: badge(if post.published { "Published" } else { "Draft" }, post.published),
        }
    }
}

/// 診療メニュー
#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub summary: String,
    pub description: Vec<Vec<String>>,
    pub price_from: Option<String>,
    pub sort_order: i32,
    pub status: BadgeView,
}

impl From<&Service> for ServiceView {
    fn from(service: &Service) -> Self {
        Self {
            id: service.id,
            name: service.name.clone(),
            slug: service.slug.clone(),
            summary: service.summary.clone(),
            description: service.description.as_deref().map(paragraphs).unwrap_or_default(),
            price_from: service.price_from.clone(),
            sort_order: service.sort_order,
            status: badge(if service.active { "Shown" } else { "Hidden" }, service.active),
        }
    }
}

/// 患者の声
#[derive(Debug, Clone, Serialize)]
pub struct TestimonialView {
    pub id: i64,
    pub author_name: String,
    pub author_detail: Option<String>,
    pub quote: String,
    /// 0〜5に丸めた評価
    pub rating: u8,
    /// `★★★★☆` 形式
    pub stars: String,
    pub class: String,
    pub badges: Vec<BadgeView>,
}

impl From<&Testimonial> for TestimonialView {
    fn from(t: &Testimonial) -> Self {
        let rating = t.rating.min(5);
        let filled = usize::from(rating);
        let mut badges = vec![badge(if t.published { "Published" } else { "Hidden" }, t.published)];
        if t.featured {
            badges.push(badge("Featured", true));
        }
        Self {
            id: t.id,
            author_name: t.author_name.clone(),
            author_detail: t.author_detail.clone(),
            quote: t.quote.clone(),
            rating,
            stars: format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled)),
            class: class_names!(CARD.base, t.featured.then_some(CARD.highlighted)),
            badges,
        }
    }
}

/// ダッシュボードの監査ログ1行
#[derive(Debug, Clone, Serialize)]
pub struct AuditRow {
    pub when: String,
    pub who: String,
    pub action: String,
    pub item: String,
}

impl From<&AuditEntry> for AuditRow {
    fn from(e: &AuditEntry) -> Self {
        Self {
            when: e.created_at.format("%Y-%m-%d %H:%M").to_string(),
            who: e.actor_email.clone().unwrap_or_else(|| "system".to_string()),
            action: e.action.to_string(),
            item: format!(
                "{} {}",
                e.entity,
                e.detail.as_deref().or(e.entity_id.as_deref()).unwrap_or_default()
            ),
        }
    }
}

/// テキスト入力の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Email,
    Password,
    Url,
    Number,
}

impl InputKind {
    fn as_str(&self) -> &'static str {
        match self {
            InputKind::Text => "text",
            InputKind::Email => "email",
            InputKind::Password => "password",
            InputKind::Url => "url",
            InputKind::Number => "number",
        }
    }
}

/// フォーム項目
///
/// `kind` は `input` の `type` 値か、`textarea` / `checkbox`。
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: &'static str,
    pub value: String,
    pub error: Option<String>,
    pub required: bool,
    pub hint: Option<&'static str>,
    pub rows: u32,
    pub checked: bool,
    pub class: String,
}

impl Field {
    fn new(name: &'static str, label: &'static str, kind: &'static str, value: &str) -> Self {
        Self {
            name,
            label,
            kind,
            value: value.to_string(),
            error: None,
            required: false,
            hint: None,
            rows: 0,
            checked: false,
            class: class_names!(FIELD.input),
        }
    }

    pub fn input(name: &'static str, label: &'static str, value: &str, kind: InputKind) -> Self {
        Self::new(name, label, kind.as_str(), value)
    }

    pub fn textarea(name: &'static str, label: &'static str, value: &str, rows: u32) -> Self {
        Self { rows, ..Self::new(name, label, "textarea", value) }
    }

    pub fn checkbox(name: &'static str, label: &'static str, checked: bool) -> Self {
        Self { checked, ..Self::new(name, label, "checkbox", "on") }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn error(mut self, error: Option<&str>) -> Self {
        self.error = error.map(str::to_string);
        self.class = class_names!(FIELD.input, self.error.is_some().then_some(FIELD.invalid));
        self
    }

    pub fn hint(mut self, hint: &'static str) -> Self {
        self.hint = Some(hint);
        self
    }
}
