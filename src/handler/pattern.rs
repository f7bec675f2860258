use std::sync::OnceLock;

use log::{debug, error, warn};
use regex::Regex;

#[cfg(debug_assertions)]
use std::time::{Duration, Instant};

/// パターンの安全性を確保（アンカーの確認と追加）
///
/// 空パターンはルートパス以外に一致しないよう `^$` として扱う。
pub fn ensure_safe_pattern(pattern: &str) -> String {
    let has_start_anchor = pattern.starts_with('^');
    let has_end_anchor = pattern.ends_with('$');

    if has_start_anchor && has_end_anchor {
        return pattern.to_string();
    }

    let safe_pattern = format!(
        "^{}$",
        pattern.trim_start_matches('^').trim_end_matches('$')
    );
    warn!(
        "Pattern '{}' lacks proper anchors, converted to '{}'",
        pattern, safe_pattern
    );
    safe_pattern
}

/// 正規表現によるルートパターン（初回使用時にコンパイルしてキャッシュ）
#[derive(Debug)]
pub struct RoutePattern {
    source: String,
    compiled: OnceLock<Result<Regex, regex::Error>>,
}

impl RoutePattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            source: ensure_safe_pattern(pattern),
            compiled: OnceLock::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn regex(&self) -> Option<&Regex> {
        match self.compiled.get_or_init(|| Regex::new(&self.source)) {
            Ok(regex) => Some(regex),
            Err(e) => {
                error!(
                    "Invalid regex pattern: {} - {}. Pattern will never match.",
                    self.source, e
                );
                None
            }
        }
    }

    /// パスがパターンに一致するか
    pub fn is_match(&self, path: &str) -> bool {
        let Some(regex) = self.regex() else {
            return false;
        };

        #[cfg(debug_assertions)]
        {
            let start_time = Instant::now();
            let is_match = regex.is_match(path);
            let elapsed = start_time.elapsed();
            if elapsed > Duration::from_millis(100) {
                warn!(
                    "Slow regex matching detected: pattern '{}' took {:?} for path '{}'",
                    self.source, elapsed, path
                );
            }
            debug!("Path matching: {} against {}: {}", path, self.source, is_match);
            is_match
        }
        #[cfg(not(debug_assertions))]
        {
            let is_match = regex.is_match(path);
            debug!("Path matching: {} against {}: {}", path, self.source, is_match);
            is_match
        }
    }

    /// キャプチャグループの値を順に返す（グループ0は含まない）
    pub fn captures(&self, path: &str) -> Vec<String> {
        self.regex()
            .and_then(|regex| regex.captures(path))
            .map(|caps| {
                caps.iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default()
    }
}
