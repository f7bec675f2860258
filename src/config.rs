//! 環境変数からのサイト設定の読み込み

use std::env;
use std::time::Duration;

use log::warn;

use crate::common::utils::DEFAULT_MAX_BODY_SIZE;
use crate::error::Error;

/// バックエンド（ホスト型DB + 認証API）の接続情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// 例: `https://xyzcompany.example.co`
    pub url: String,
    /// `apikey` ヘッダーに載せるキー
    pub api_key: String,
}

/// サイト全体の設定
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// 医院名（ヘッダー・タイトルに表示）
    pub site_name: String,
    /// 末尾 `/` 付きのベースURL
    pub base_url: String,
    pub host: String,
    pub port: u16,
    /// Noneの場合はインメモリのストアで動作する
    pub backend: Option<BackendConfig>,
    /// 管理画面に入れるメールアドレス（空なら認証済みユーザー全員）
    pub admin_emails: Vec<String>,
    /// インメモリ認証の資格情報
    pub dev_admin: Option<(String, String)>,
    pub revalidate_secret: Option<String>,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub page_cache_ttl: Duration,
    pub max_body_size: usize,
    pub secure_cookies: bool,
    /// 前段のプロキシが付けた `X-Forwarded-For` を信用するか
    pub trust_proxy: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_name: "Bright Smile Dental".to_string(),
            base_url: "http://localhost:8080/".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            backend: None,
            admin_emails: Vec::new(),
            dev_admin: None,
            revalidate_secret: None,
            rate_limit_max: 10,
            rate_limit_window: Duration::from_secs(10),
            page_cache_ttl: Duration::from_secs(60),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            secure_cookies: true,
            trust_proxy: false,
        }
    }
}

/// 空文字列は未設定として扱う
fn var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, Error> {
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|_| {
            Error::ConfigurationError(format!("{} must be a number, got {:?}", name, raw))
        }),
    }
}

fn parse_bool(name: &str, default: bool) -> Result<bool, Error> {
    match var(name).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(Error::ConfigurationError(format!(
            "{} must be a boolean, got {:?}",
            name, v
        ))),
    }
}

/// ベースURLを決定する
///
/// 明示URL → デプロイ先ホスト → `http://localhost:{port}` の順。
/// スキームが無ければ `https://` を補い、末尾は必ず `/` 1つにする。
pub fn resolve_base_url(site_url: Option<&str>, deploy_url: Option<&str>, port: u16) -> String {
    let raw = [site_url, deploy_url]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("http://localhost:{}", port));

    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw
    } else {
        format!("https://{}", raw)
    };
    format!("{}/", with_scheme.trim_end_matches('/'))
}

impl SiteConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, Error> {
        let defaults = SiteConfig::default();
        let port = parse_var("PORT", defaults.port)?;

        let backend = match (var("DENTAL_BACKEND_URL"), var("DENTAL_BACKEND_KEY")) {
            (Some(url), Some(api_key)) => Some(BackendConfig {
                url: url.trim_end_matches('/').to_string(),
                api_key,
            }),
            (Some(_), None) => {
                return Err(Error::ConfigurationError(
                    "DENTAL_BACKEND_KEY is required when DENTAL_BACKEND_URL is set".to_string(),
                ))
            }
            (None, _) => {
                warn!("DENTAL_BACKEND_URL is not set; content is kept in memory");
                None
            }
        };

        let admin_emails = var("DENTAL_ADMIN_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(|e| e.trim().to_ascii_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let dev_admin = match (var("DENTAL_DEV_ADMIN_EMAIL"), var("DENTAL_DEV_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        };

        let rate_limit_window_secs: u64 = parse_var("DENTAL_RATE_LIMIT_WINDOW_SECS", 10)?;
        if rate_limit_window_secs == 0 {
            return Err(Error::ConfigurationError(
                "DENTAL_RATE_LIMIT_WINDOW_SECS must be greater than 0".to_string(),
            ));
        }

        let max_body_size: usize = parse_var("DENTAL_MAX_BODY_SIZE", DEFAULT_MAX_BODY_SIZE)?;
        if max_body_size == 0 {
            return Err(Error::ConfigurationError(
                "DENTAL_MAX_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            site_name: var("DENTAL_SITE_NAME").unwrap_or(defaults.site_name),
            base_url: resolve_base_url(
                var("DENTAL_SITE_URL").as_deref(),
                var("DENTAL_DEPLOY_URL").as_deref(),
                port,
            ),
            host: var("HOST").unwrap_or(defaults.host),
            port,
            backend,
            admin_emails,
            dev_admin,
            revalidate_secret: var("DENTAL_REVALIDATE_SECRET"),
            rate_limit_max: parse_var("DENTAL_RATE_LIMIT_MAX", defaults.rate_limit_max)?,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            page_cache_ttl: Duration::from_secs(parse_var("DENTAL_PAGE_CACHE_TTL_SECS", 60u64)?),
            max_body_size,
            secure_cookies: parse_bool("DENTAL_SECURE_COOKIES", true)?,
            trust_proxy: parse_bool("DENTAL_TRUST_PROXY", false)?,
        })
    }

    /// ベースURLにパスを連結した絶対URL
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// 管理画面に入れるメールアドレスか
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.is_empty()
            || self.admin_emails.iter().any(|e| e.eq_ignore_ascii_case(email))
    }
}
