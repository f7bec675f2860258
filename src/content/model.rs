//! バックエンドの行を表す型
//!
//! バックエンドから返るJSONはこの型へデコードできた時点で検証済みとみなす。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ブログ記事
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlogPost {
    pub id: i64,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BlogPost {
    /// 一覧やカードに出す要約（未設定なら本文の先頭）
    pub fn summary(&self, max_chars: usize) -> String {
        if let Some(excerpt) = self.excerpt.as_deref().filter(|e| !e.trim().is_empty()) {
            return excerpt.to_string();
        }
        let flat = self.content.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() <= max_chars {
            flat
        } else {
            let cut: String = flat.chars().take(max_chars).collect();
            format!("{}…", cut.trim_end())
        }
    }

    /// 表示用の日付（公開日、なければ作成日）
    pub fn display_date(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.created_at)
    }

    pub fn public_path(&self) -> String {
        format!("/blog/{}", self.slug)
    }
}

/// 診療メニュー
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    /// 表示用の料金目安（例: "from $120"）
    #[serde(default)]
    pub price_from: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// 患者さんの声
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Testimonial {
    pub id: i64,
    pub author_name: String,
    /// 補足（例: "Patient since 2019"）
    #[serde(default)]
    pub author_detail: Option<String>,
    pub quote: String,
    pub rating: u8,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}
