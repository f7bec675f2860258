//! PostgREST互換APIを介したストア
//!
//! `GET /rest/v1/{table}?col=eq.value&order=col.desc&limit=n` の形式で問い合わせ、
//! 書き込みは `Prefer: return=representation` で更新後の行を受け取る。

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

use super::store::{BackendError, ContentStore, Query, Table};
use crate::config::BackendConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTPクライアントを作成（ストアと認証プロバイダーで共有する設定）
pub(crate) fn build_client() -> Result<Client, BackendError> {
    Client::builder()
        .user_agent(concat!("dentalsite/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| BackendError::Transport(format!("failed to create HTTP client: {}", e)))
}

/// 2xx以外を `BackendError` に変換する
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    warn!("Backend request failed with {}", status);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BackendError::Unauthorized(message)),
        _ => Err(BackendError::Status { status: status.as_u16(), message }),
    }
}

pub(crate) fn transport_error(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

/// フィルタ値をPostgRESTの `eq.` 演算子の右辺に変換
fn filter_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// クエリをURLパラメータに変換
fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = query
        .filters
        .iter()
        .map(|(column, value)| match value {
            // nullの比較は `is.null`
            Value::Null => (column.clone(), "is.null".to_string()),
            _ => (column.clone(), format!("eq.{}", filter_literal(value))),
        })
        .collect();

    if !query.order.is_empty() {
        let order = query
            .order
            .iter()
            .map(|o| format!("{}.{}", o.column, if o.descending { "desc" } else { "asc" }))
            .collect::<Vec<_>>()
            .join(",");
        params.push(("order".to_string(), order));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

/// PostgREST互換APIのクライアント
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_client()?,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows(response: reqwest::Response) -> Result<Vec<Value>, BackendError> {
        let response = check_status(response).await?;
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ContentStore for RestStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, BackendError> {
        debug!("REST select {}", table);
        let response = self
            .authorized(self.client.get(self.table_url(table)))
            .query(&query_params(query))
            .send()
            .await
            .map_err(transport_error)?;
        Self::rows(response).await
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, BackendError> {
        debug!("REST insert into {}", table);
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(transport_error)?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode(format!("insert into {} returned no rows", table)))
    }

    async fn update(&self, table: Table, id: i64, patch: Value) -> Result<Value, BackendError> {
        debug!("REST update {}#{}", table, id);
        let response = self
            .authorized(self.client.patch(self.table_url(table)))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await
            .map_err(transport_error)?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("{}#{}", table, id)))
    }

    async fn delete(&self, table: Table, id: i64) -> Result<(), BackendError> {
        debug!("REST delete {}#{}", table, id);
        let response = self
            .authorized(self.client.delete(self.table_url(table)))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(transport_error)?;
        if Self::rows(response).await?.is_empty() {
            return Err(BackendError::NotFound(format!("{}#{}", table, id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method::PATCH;
    use serde_json::json;

    fn store_for(server: &MockServer) -> RestStore {
        RestStore::new(&BackendConfig { url: server.base_url(), api_key: "anon-key".to_string() }).unwrap()
    }

    #[test]
    fn test_query_params() {
        let query = Query::new()
            .eq("published", true)
            .eq("slug", "first-visit")
            .eq("published_at", Value::Null)
            .order_by_desc("published_at")
            .order_by("id")
            .limit(5);
        assert_eq!(
            query_params(&query),
            vec![
                ("published".to_string(), "eq.true".to_string()),
                ("slug".to_string(), "eq.first-visit".to_string()),
                ("published_at".to_string(), "is.null".to_string()),
                ("order".to_string(), "published_at.desc,id.asc".to_string()),
                ("limit".to_string(), "5".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_select_sends_filters_and_keys() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/services")
                    .query_param("active", "eq.true")
                    .query_param("order", "sort_order.asc")
                    .header("apikey", "anon-key")
                    .header("authorization", "Bearer anon-key");
                then.status(200).json_body(json!([{ "id": 1, "name": "Cleaning" }]));
            })
            .await;

        let store = store_for(&server);
        let rows = store
            .select(Table::Services, &Query::new().eq("active", true).order_by("sort_order"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(rows, vec![json!({ "id": 1, "name": "Cleaning" })]);
    }

    #[tokio::test]
    async fn test_insert_returns_representation() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/testimonials")
                    .header("prefer", "return=representation")
                    .json_body(json!({ "author_name": "Ana", "rating": 5 }));
                then.status(201).json_body(json!([{ "id": 9, "author_name": "Ana", "rating": 5 }]));
            })
            .await;

        let row = store_for(&server)
            .insert(Table::Testimonials, json!({ "author_name": "Ana", "rating": 5 }))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(row["id"], 9);
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PATCH).path("/rest/v1/blog_posts").query_param("id", "eq.42");
                then.status(200).json_body(json!([]));
            })
            .await;

        let result = store_for(&server).update(Table::BlogPosts, 42, json!({ "title": "x" })).await;
        assert!(matches!(result, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/rest/v1/services").query_param("id", "eq.3");
                then.status(200).json_body(json!([{ "id": 3 }]));
            })
            .await;

        store_for(&server).delete(Table::Services, 3).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/blog_posts");
                then.status(401).body(r#"{"message":"Invalid API key"}"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/services");
                then.status(500).body("boom");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/testimonials");
                then.status(200).body("not json");
            })
            .await;

        let store = store_for(&server);
        assert!(matches!(
            store.select(Table::BlogPosts, &Query::new()).await,
            Err(BackendError::Unauthorized(_))
        ));
        assert!(matches!(
            store.select(Table::Services, &Query::new()).await,
            Err(BackendError::Status { status: 500, .. })
        ));
        assert!(matches!(
            store.select(Table::Testimonials, &Query::new()).await,
            Err(BackendError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let store = RestStore::new(&BackendConfig {
            url: "http://127.0.0.1:9".to_string(),
            api_key: "k".to_string(),
        })
        .unwrap();
        assert!(matches!(
            store.select(Table::Services, &Query::new()).await,
            Err(BackendError::Transport(_))
        ));
    }
}
