//! HTTPクッキー関連の実装（Set-Cookieの生成とCookieヘッダーの解析）

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use log::warn;
use crate::error::Error;
use super::utils::{validate_cookie_name_value, is_header_value_valid};

/// SameSite属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

/// HTTPクッキー
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub max_age: Option<Duration>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    /// 新しいクッキーをResultで作成（名前・値の文字種を検証）
    pub fn try_new(name: impl Into<String>, value: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        let value = value.into();
        validate_cookie_name_value(&name, &value)?;
        Ok(Self {
            name,
            value,
            path: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        })
    }

    /// 既存クッキーを削除するためのクッキー（空値 + Max-Age=0）
    pub fn removal(name: impl Into<String>) -> Result<Self, Error> {
        Ok(Self::try_new(name, "")?
            .with_path("/")
            .with_max_age(Duration::ZERO))
    }

    /// パスを設定
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// 最大年齢を設定
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// セキュアフラグを設定
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// HttpOnlyフラグを設定
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// SameSite属性を設定
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Set-Cookieヘッダー値を生成
    pub fn to_header_value(&self) -> String {
        let mut cookie_str = format!("{}={}", self.name, self.value);

        if let Some(path) = &self.path {
            if is_header_value_valid(path) && !path.contains(';') {
                cookie_str.push_str(&format!("; Path={}", path));
            } else {
                warn!("Cookie::to_header_value skipped invalid Path value: {:?}", path);
            }
        }

        if let Some(max_age) = &self.max_age {
            cookie_str.push_str(&format!("; Max-Age={}", max_age.as_secs()));
        }

        if self.secure {
            cookie_str.push_str("; Secure");
        }

        if self.http_only {
            cookie_str.push_str("; HttpOnly");
        }

        if let Some(same_site) = &self.same_site {
            cookie_str.push_str(&format!("; SameSite={}", same_site));
        }

        cookie_str
    }
}

/// `Cookie` リクエストヘッダーを名前→値のマップに分解する
///
/// 同名が複数ある場合は最初の値を採用する。`=` を含まない断片は無視。
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches('"');
        cookies
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }
    cookies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_header_value() {
        let cookie = Cookie::try_new("dental_session", "tok.abc-123")
            .unwrap()
            .with_path("/")
            .with_max_age(Duration::from_secs(3600))
            .secure(true)
            .http_only(true)
            .with_same_site(SameSite::Lax);

        assert_eq!(
            cookie.to_header_value(),
            "dental_session=tok.abc-123; Path=/; Max-Age=3600; Secure; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_removal_cookie() {
        let cookie = Cookie::removal("dental_session").unwrap();
        assert_eq!(cookie.to_header_value(), "dental_session=; Path=/; Max-Age=0");
    }

    #[test]
    fn test_same_site_display() {
        assert_eq!(SameSite::Strict.to_string(), "Strict");
        assert_eq!(SameSite::Lax.to_string(), "Lax");
        assert_eq!(SameSite::None.to_string(), "None");
    }

    #[test]
    fn test_cookie_try_new_validation() {
        assert!(Cookie::try_new("SID", "abcDEF123-_.:~").is_ok());
        assert!(Cookie::try_new("SID", "bad;value").is_err());
        assert!(Cookie::try_new("SID", "bad,value").is_err());
        assert!(Cookie::try_new("SID", "bad\nvalue").is_err());
        assert!(Cookie::try_new("bad name", "v").is_err());
        assert!(Cookie::try_new("bad;name", "v").is_err());
    }

    #[test]
    fn test_header_skips_injected_path() {
        let cookie = Cookie::try_new("A", "B").unwrap().with_path("/\r\nSet-Cookie: x=y");
        let hv = cookie.to_header_value();
        assert_eq!(hv, "A=B");
    }

    #[test]
    fn test_parse_cookie_header() {
        let cookies = parse_cookie_header("theme=dark; dental_session=abc.def; empty=; =nameless; junk");
        assert_eq!(cookies.get("theme"), Some(&"dark".to_string()));
        assert_eq!(cookies.get("dental_session"), Some(&"abc.def".to_string()));
        assert_eq!(cookies.get("empty"), Some(&"".to_string()));
        assert_eq!(cookies.len(), 3);

        let dup = parse_cookie_header("a=1; a=2");
        assert_eq!(dup.get("a"), Some(&"1".to_string()));
    }
}
