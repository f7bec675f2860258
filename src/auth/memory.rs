//! プロセス内で完結する認証プロバイダー（開発・テスト用）
//!
//! 資格情報は起動時に与えたものだけを受け付ける。トークンは発行から
//! [`SESSION_LIFETIME`] が過ぎるか、プロセスの再起動で失効する。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info, warn};
use uuid::Uuid;

use super::{AdminUser, AuthProvider, Session};
use crate::common::utils::constant_time_eq;
use crate::content::BackendError;

/// セッションの有効期間（クッキーのMax-Ageと同じ）
pub const SESSION_LIFETIME: Duration = Duration::from_secs(8 * 60 * 60);

/// 認可コードの有効期間
pub const CODE_LIFETIME: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
struct Account {
    user: AdminUser,
    password: String,
}

/// 発行済みのトークンと発行時刻
#[derive(Debug, Clone)]
struct Grant {
    user: AdminUser,
    issued_at: Instant,
}

impl Grant {
    fn is_live(&self, now: Instant, lifetime: Duration) -> bool {
        now.saturating_duration_since(self.issued_at) < lifetime
    }
}

/// v4 UUID 2つ分（244ビットの乱数、16進64文字）
fn random_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn locked<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, BackendError> {
    mutex
        .lock()
        .map_err(|_| BackendError::Transport("auth state lock poisoned".to_string()))
}

/// 期限切れを取り除いてから新しいトークンを登録する
fn issue(grants: &Mutex<HashMap<String, Grant>>, user: AdminUser, now: Instant, lifetime: Duration) -> Result<String, BackendError> {
    let token = random_token();
    let mut grants = locked(grants)?;
    let before = grants.len();
    grants.retain(|_, g| g.is_live(now, lifetime));
    if grants.len() < before {
        debug!("Pruned {} expired grants", before - grants.len());
    }
    grants.insert(token.clone(), Grant { user, issued_at: now });
    Ok(token)
}

/// メモリ上のアカウント・セッションで動く認証プロバイダー
#[derive(Debug, Default)]
pub struct MemoryAuthProvider {
    accounts: Vec<Account>,
    sessions: Mutex<HashMap<String, Grant>>,
    codes: Mutex<HashMap<String, Grant>>,
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// アカウントを追加
    pub fn with_account(mut self, email: &str, password: &str) -> Self {
        let id = format!("local-{}", self.accounts.len() + 1);
        self.accounts.push(Account {
            user: AdminUser { id, email: email.to_ascii_lowercase() },
            password: password.to_string(),
        });
        self
    }

    fn account(&self, email: &str) -> Option<AdminUser> {
        self.accounts
            .iter()
            .find(|a| a.user.email.eq_ignore_ascii_case(email))
            .map(|a| a.user.clone())
    }

    /// 一度だけ使える認可コードを発行（メールリンクの代わり）
    pub fn issue_code(&self, email: &str) -> Result<String, BackendError> {
        self.issue_code_at(email, Instant::now())
    }

    /// 時刻を指定して認可コードを発行
    pub fn issue_code_at(&self, email: &str, now: Instant) -> Result<String, BackendError> {
        let user = self
            .account(email)
            .ok_or_else(|| BackendError::NotFound(format!("account {}", email)))?;
        issue(&self.codes, user, now, CODE_LIFETIME)
    }

    /// 時刻を指定してメールアドレスとパスワードでサインイン
    pub fn sign_in_at(&self, email: &str, password: &str, now: Instant) -> Result<Session, BackendError> {
        // 全アカウントを走査して比較回数を一定にする
        let mut matched = None;
        for account in &self.accounts {
            let email_ok = account.user.email.eq_ignore_ascii_case(email.trim());
            let password_ok = constant_time_eq(&account.password, password);
            if email_ok && password_ok {
                matched = Some(account.user.clone());
            }
        }
        match matched {
            Some(user) => {
                info!("Local sign-in for {}", user.id);
                self.start_session(user, now)
            }
            None => {
                warn!("Local sign-in rejected");
                Err(BackendError::Unauthorized("invalid credentials".to_string()))
            }
        }
    }

    /// 時刻を指定して認可コードをセッションに交換
    pub fn exchange_code_at(&self, code: &str, now: Instant) -> Result<Session, BackendError> {
        let grant = locked(&self.codes)?
            .remove(code)
            .filter(|g| g.is_live(now, CODE_LIFETIME))
            .ok_or_else(|| BackendError::Unauthorized("invalid, used or expired code".to_string()))?;
        self.start_session(grant.user, now)
    }

    /// 時刻を指定してトークンを検証（期限切れは削除して `Unauthorized`）
    pub fn get_user_at(&self, access_token: &str, now: Instant) -> Result<AdminUser, BackendError> {
        let mut sessions = locked(&self.sessions)?;
        match sessions.get(access_token) {
            Some(grant) if grant.is_live(now, SESSION_LIFETIME) => Ok(grant.user.clone()),
            Some(_) => {
                sessions.remove(access_token);
                debug!("Rejected expired session");
                Err(BackendError::Unauthorized("session expired".to_string()))
            }
            None => Err(BackendError::Unauthorized("unknown session".to_string())),
        }
    }

    fn start_session(&self, user: AdminUser, now: Instant) -> Result<Session, BackendError> {
        let token = issue(&self.sessions, user.clone(), now, SESSION_LIFETIME)?;
        Ok(Session { access_token: token, expires_in: SESSION_LIFETIME, user })
    }

    /// 保持しているセッション数
    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or_default()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        self.sign_in_at(email, password, Instant::now())
    }

    async fn exchange_code(&self, code: &str) -> Result<Session, BackendError> {
        self.exchange_code_at(code, Instant::now())
    }

    async fn get_user(&self, access_token: &str) -> Result<AdminUser, BackendError> {
        self.get_user_at(access_token, Instant::now())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        locked(&self.sessions)?.remove(access_token);
        Ok(())
    }
}
