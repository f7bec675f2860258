//! コンテンツを保存するバックエンドの抽象
//!
//! 行はJSONのまま受け渡し、型への変換は [`super::ContentRepository`] が行う。

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// バックエンドアクセスのエラー
#[derive(Error, Debug)]
pub enum BackendError {
    /// 接続できない・タイムアウトなど
    #[error("backend transport error: {0}")]
    Transport(String),

    /// 2xx以外の応答
    #[error("backend responded with {status}: {message}")]
    Status { status: u16, message: String },

    /// 応答の形が想定と違う
    #[error("failed to decode backend response: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// トークンや資格情報が無効
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// バックエンドが構成されていない
    #[error("backend unavailable")]
    Unavailable,
}

/// テーブル名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    BlogPosts,
    Services,
    Testimonials,
    AuditLogs,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::BlogPosts => "blog_posts",
            Table::Services => "services",
            Table::Testimonials => "testimonials",
            Table::AuditLogs => "audit_logs",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 並び順
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// select の条件（等価フィルタ・並び順・件数）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value` の条件を追加
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str) -> Self {
        self.order.push(Order { column: column.to_string(), descending: false });
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order.push(Order { column: column.to_string(), descending: true });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// 行がすべてのフィルタを満たすか
    pub fn matches(&self, row: &Value) -> bool {
        self.filters
            .iter()
            .all(|(column, expected)| row.get(column).unwrap_or(&Value::Null) == expected)
    }

    /// 並び順に従って2行を比較する
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        for order in &self.order {
            let lhs = a.get(&order.column).unwrap_or(&Value::Null);
            let rhs = b.get(&order.column).unwrap_or(&Value::Null);
            let ordering = compare_values(lhs, rhs);
            let ordering = if order.descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// JSON値の比較（nullは非nullより大きい。昇順では末尾、降順では先頭になる。型が違えば等価とみなす）
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// 行単位のCRUDを提供するバックエンド
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// 条件に合う行を取得
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, BackendError>;

    /// 行を挿入し、採番済みの行を返す
    async fn insert(&self, table: Table, row: Value) -> Result<Value, BackendError>;

    /// 指定IDの行を部分更新し、更新後の行を返す
    async fn update(&self, table: Table, id: i64, patch: Value) -> Result<Value, BackendError>;

    /// 指定IDの行を削除（存在しなければ NotFound）
    async fn delete(&self, table: Table, id: i64) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_matches() {
        let row = json!({ "slug": "cleaning", "active": true, "sort_order": 2 });
        assert!(Query::new().matches(&row));
        assert!(Query::new().eq("slug", "cleaning").eq("active", true).matches(&row));
        assert!(!Query::new().eq("active", false).matches(&row));
        assert!(!Query::new().eq("missing", "x").matches(&row));
        assert!(Query::new().eq("missing", Value::Null).matches(&row));
    }

    #[test]
    fn test_query_compare() {
        let query = Query::new().order_by_desc("published_at").order_by("id");
        let older = json!({ "id": 1, "published_at": "2024-01-01T00:00:00Z" });
        let newer = json!({ "id": 2, "published_at": "2024-05-01T00:00:00Z" });
        let unpublished = json!({ "id": 3, "published_at": null });

        let mut rows = vec![older.clone(), unpublished.clone(), newer.clone()];
        rows.sort_by(|a, b| query.compare(a, b));
        // 降順ではnullが先頭に来る
        assert_eq!(rows, vec![unpublished, newer, older]);
    }

    #[test]
    fn test_ascending_puts_null_last() {
        let query = Query::new().order_by("sort_order");
        let first = json!({ "id": 1, "sort_order": 1 });
        let second = json!({ "id": 2, "sort_order": 2 });
        let unordered = json!({ "id": 3, "sort_order": null });

        let mut rows = vec![unordered.clone(), second.clone(), first.clone()];
        rows.sort_by(|a, b| query.compare(a, b));
        assert_eq!(rows, vec![first, second, unordered]);
    }

    #[test]
    fn test_table_names() {
        assert_eq!(Table::BlogPosts.as_str(), "blog_posts");
        assert_eq!(Table::AuditLogs.to_string(), "audit_logs");
    }
}
