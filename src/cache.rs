//! 公開ページのレンダリング結果キャッシュ
//!
//! パスをキーにHTMLを保持する。管理画面での更新や `/api/revalidate` で破棄される。

use std::collections::HashMap;
use std::future::Future;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use log::debug;

use crate::error::Error;

#[derive(Debug, Clone)]
struct Entry {
    body: String,
    stored: Instant,
}

/// パス単位のTTL付きキャッシュ（TTLが0なら無効）
#[derive(Debug)]
pub struct PageCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()) }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.get_at(path, Instant::now())
    }

    fn get_at(&self, path: &str, now: Instant) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let entries = self.entries.read().ok()?;
        entries
            .get(path)
            .filter(|e| now.saturating_duration_since(e.stored) < self.ttl)
            .map(|e| e.body.clone())
    }

    pub fn put(&self, path: &str, body: String) {
        self.put_at(path, body, Instant::now());
    }

    fn put_at(&self, path: &str, body: String, now: Instant) {
        if !self.is_enabled() {
            return;
        }
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(path.to_string(), Entry { body, stored: now });
        }
    }

    /// キャッシュにあればそれを、無ければ `render` の結果を保存して返す
    pub async fn get_or_render<F, Fut>(&self, path: &str, render: F) -> Result<String, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, Error>>,
    {
        if let Some(hit) = self.get(path) {
            debug!("page cache hit: {}", path);
            return Ok(hit);
        }
        let body = render().await?;
        self.put(path, body.clone());
        Ok(body)
    }

    /// 1パスを破棄
    pub fn revalidate_path(&self, path: &str) -> bool {
        let removed = self
            .entries
            .write()
            .map(|mut entries| entries.remove(path).is_some())
            .unwrap_or(false);
        debug!("revalidate {} (cached: {})", path, removed);
        removed
    }

    /// `prefix` 自身とその配下を破棄し、破棄した件数を返す
    pub fn revalidate_prefix(&self, prefix: &str) -> usize {
        let trimmed = prefix.trim_end_matches('/');
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        let before = entries.len();
        entries.retain(|path, _| {
            let within = trimmed.is_empty()
                || path == trimmed
                || path.strip_prefix(trimmed).is_some_and(|rest| rest.starts_with('/'));
            !within
        });
        before - entries.len()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> PageCache {
        PageCache::new(Duration::from_secs(60))
    }

    #[test]
    fn test_put_get_and_expiry() {
        let cache = cache();
        let t0 = Instant::now();
        cache.put_at("/", "<home>".into(), t0);
        assert_eq!(cache.get_at("/", t0 + Duration::from_secs(59)), Some("<home>".to_string()));
        assert_eq!(cache.get_at("/", t0 + Duration::from_secs(60)), None);
        assert_eq!(cache.get_at("/blog", t0), None);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = PageCache::new(Duration::ZERO);
        cache.put("/", "x".into());
        assert!(cache.is_empty());
        assert_eq!(cache.get("/"), None);
    }

    #[test]
    fn test_revalidate_prefix() {
        let cache = cache();
        for path in ["/", "/blog", "/blog/a", "/blog/b", "/blogroll", "/services"] {
            cache.put(path, path.to_string());
        }
        assert_eq!(cache.revalidate_prefix("/blog/"), 3);
        assert!(cache.get("/blogroll").is_some());
        assert!(cache.get("/blog").is_none());

        assert!(cache.revalidate_path("/services"));
        assert!(!cache.revalidate_path("/services"));

        assert_eq!(cache.revalidate_prefix("/"), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_get_or_render() {
        let cache = cache();
        let first = cache.get_or_render("/", || async { Ok("rendered".to_string()) }).await.unwrap();
        assert_eq!(first, "rendered");

        let second = cache
            .get_or_render("/", || async { Err(Error::InternalServerError("must not render".into())) })
            .await
            .unwrap();
        assert_eq!(second, "rendered");

        cache.clear();
        let failed = cache
            .get_or_render("/", || async { Err(Error::NotFound("x".into())) })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty());
    }
}
