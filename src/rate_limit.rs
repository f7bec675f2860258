//! クライアント単位の固定ウィンドウ方式レート制限

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::warn;

use crate::common::{Method, Middleware, Request};
use crate::error::Error;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// 判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    /// 再試行まで待つべき秒数（最低1秒）
    Limited { retry_after: u64 },
}

/// キーごとに `window` あたり `max` 回までを許可する
#[derive(Debug)]
pub struct RateLimiter {
    max: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

/// これを超えるキー数になったら期限切れのウィンドウを掃除する
const PRUNE_THRESHOLD: usize = 1024;

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self { max, window, windows: Mutex::new(HashMap::new()) }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// 時刻を指定して判定（テスト用に公開）
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            // 状態が壊れていても制限をかけ続ける
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() > PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.saturating_duration_since(w.started) < window);
        }

        let entry = windows
            .entry(key.to_string())
            .or_insert(Window { started: now, count: 0 });
        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window { started: now, count: 0 };
        }

        if entry.count >= self.max {
            let elapsed = now.saturating_duration_since(entry.started);
            let remaining = self.window.saturating_sub(elapsed);
            // 端数は切り上げ
            let retry_after = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return RateDecision::Limited { retry_after: retry_after.max(1) };
        }

        entry.count += 1;
        RateDecision::Allowed { remaining: self.max - entry.count }
    }

    /// 保持しているキー数
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}

/// POSTリクエストと `/api/` 以下に [`RateLimiter`] を適用するミドルウェア
pub struct RateLimitMiddleware {
    limiter: RateLimiter,
}

impl RateLimitMiddleware {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }

    fn applies_to(req: &Request) -> bool {
        req.method == Method::POST || req.path.starts_with("/api/")
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    async fn pre_process(&self, req: Request) -> Result<Request, Error> {
        if !Self::applies_to(&req) {
            return Ok(req);
        }
        let client = req.client_ip();
        match self.limiter.check(&client) {
            RateDecision::Allowed { .. } => Ok(req),
            RateDecision::Limited { retry_after } => {
                warn!("Rate limit exceeded for {} on {} {}", client, req.method, req.path);
                Err(Error::RateLimited(retry_after))
            }
        }
    }
}
