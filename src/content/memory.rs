//! プロセス内で完結するストア（開発・テスト用）

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::debug;
use serde_json::{json, Value};

use super::repository::timestamp;
use super::store::{BackendError, ContentStore, Query, Table};

#[derive(Debug, Default)]
struct TableData {
    next_id: i64,
    rows: Vec<Value>,
}

/// テーブルごとに行を保持するストア
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Table, TableData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// デモ用のコンテンツを投入したストア
    pub fn seeded() -> Self {
        let store = Self::new();
        let now = Utc::now();
        let rows: Vec<(Table, Value)> = vec![
            (
                Table::Services,
                json!({
                    "name": "Preventive Cleaning",
                    "slug": "preventive-cleaning",
                    "summary": "Thorough cleaning and polish to keep gums healthy.",
                    "description": "Our hygienists remove plaque and tartar, polish enamel and check for early signs of decay.",
                    "price_from": "from $95",
                    "sort_order": 1,
                    "active": true
                }),
            ),
            (
                Table::Services,
                json!({
                    "name": "Teeth Whitening",
                    "slug": "teeth-whitening",
                    "summary": "In-office whitening for a brighter smile in one visit.",
                    "price_from": "from $250",
                    "sort_order": 2,
                    "active": true
                }),
            ),
            (
                Table::Services,
                json!({
                    "name": "Dental Implants",
                    "slug": "dental-implants",
                    "summary": "Permanent replacement for missing teeth.",
                    "sort_order": 3,
                    "active": true
                }),
            ),
            (
                Table::Testimonials,
                json!({
                    "author_name": "Maria G.",
                    "author_detail": "Patient since 2019",
                    "quote": "The team made my first cleaning in years completely stress free.",
                    "rating": 5,
                    "featured": true,
                    "published": true
                }),
            ),
            (
                Table::Testimonials,
                json!({
                    "author_name": "James T.",
                    "quote": "Friendly staff and they explained every step.",
                    "rating": 4,
                    "featured": false,
                    "published": true
                }),
            ),
            (
                Table::BlogPosts,
                json!({
                    "title": "What to Expect at Your First Visit",
                    "slug": "first-visit",
                    "excerpt": "A quick walkthrough of your first appointment with us.",
                    "content": "We begin with a conversation about your dental history.\n\nNext comes a gentle exam and, if needed, X-rays.",
                    "published": true,
                    "published_at": timestamp(now - Duration::days(7))
                }),
            ),
            (
                Table::BlogPosts,
                json!({
                    "title": "Flossing Tips (draft)",
                    "slug": "flossing-tips",
                    "content": "Work in progress.",
                    "published": false,
                    "published_at": null
                }),
            ),
        ];

        if let Ok(mut tables) = store.tables.lock() {
            for (table, row) in rows {
                Self::insert_locked(&mut tables, table, row);
            }
        }
        store
    }

    fn insert_locked(tables: &mut HashMap<Table, TableData>, table: Table, row: Value) -> Value {
        let data = tables.entry(table).or_default();
        data.next_id += 1;
        let mut row = row;
        if let Some(obj) = row.as_object_mut() {
            obj.insert("id".to_string(), json!(data.next_id));
            obj.entry("created_at").or_insert_with(|| json!(timestamp(Utc::now())));
        }
        data.rows.push(row.clone());
        row
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Table, TableData>>, BackendError> {
        self.tables
            .lock()
            .map_err(|_| BackendError::Transport("memory store lock poisoned".to_string()))
    }
}

fn row_id(row: &Value) -> Option<i64> {
    row.get("id").and_then(Value::as_i64)
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, BackendError> {
        let tables = self.lock()?;
        let mut rows: Vec<Value> = tables
            .get(&table)
            .map(|data| data.rows.iter().filter(|row| query.matches(row)).cloned().collect())
            .unwrap_or_default();
        // 安定ソートなので同順位は挿入順のまま
        rows.sort_by(|a, b| query.compare(a, b));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        debug!("memory select {} -> {} rows", table, rows.len());
        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, BackendError> {
        if !row.is_object() {
            return Err(BackendError::Status { status: 400, message: "row must be an object".to_string() });
        }
        let mut tables = self.lock()?;
        Ok(Self::insert_locked(&mut tables, table, row))
    }

    async fn update(&self, table: Table, id: i64, patch: Value) -> Result<Value, BackendError> {
        let patch = match patch {
            Value::Object(map) => map,
            _ => return Err(BackendError::Status { status: 400, message: "patch must be an object".to_string() }),
        };
        let mut tables = self.lock()?;
        let row = tables
            .get_mut(&table)
            .and_then(|data| data.rows.iter_mut().find(|row| row_id(row) == Some(id)))
            .ok_or_else(|| BackendError::NotFound(format!("{}#{}", table, id)))?;

        if let Some(obj) = row.as_object_mut() {
            for (key, value) in patch {
                if key != "id" {
                    obj.insert(key, value);
                }
            }
            obj.insert("updated_at".to_string(), json!(timestamp(Utc::now())));
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: Table, id: i64) -> Result<(), BackendError> {
        let mut tables = self.lock()?;
        let data = tables
            .get_mut(&table)
            .ok_or_else(|| BackendError::NotFound(format!("{}#{}", table, id)))?;
        let before = data.rows.len();
        data.rows.retain(|row| row_id(row) != Some(id));
        if data.rows.len() == before {
            return Err(BackendError::NotFound(format!("{}#{}", table, id)));
        }
        Ok(())
    }
}
