//! 管理操作の監査ログ
//!
//! 書き込みに失敗しても元の操作は失敗させず、警告ログを残すだけにする。

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::AdminUser;
use crate::content::store::{BackendError, ContentStore, Query, Table};

/// 操作の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    SignIn,
    SignOut,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::SignIn => "sign_in",
            AuditAction::SignOut => "sign_out",
        };
        f.write_str(name)
    }
}

/// `audit_logs` の1行
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: i64,
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub actor_email: Option<String>,
    pub action: AuditAction,
    pub entity: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 監査ログの読み書き
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn ContentStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// 操作を記録する（失敗は警告ログのみ）
    pub async fn record(
        &self,
        actor: Option<&AdminUser>,
        action: AuditAction,
        entity: &str,
        entity_id: Option<&str>,
        detail: Option<&str>,
    ) {
        let row = json!({
            "actor_id": actor.map(|a| a.id.as_str()),
            "actor_email": actor.map(|a| a.email.as_str()),
            "action": action,
            "entity": entity,
            "entity_id": entity_id,
            "detail": detail,
        });
        match self.store.insert(Table::AuditLogs, row).await {
            Ok(_) => info!("audit: {} {} {}", action, entity, entity_id.unwrap_or("-")),
            Err(e) => warn!("Failed to write audit log for {} {}: {}", action, entity, e),
        }
    }

    /// 新しい順に取得
    pub async fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, BackendError> {
        let rows = self
            .store
            .select(
                Table::AuditLogs,
                &Query::new().order_by_desc("created_at").order_by_desc("id").limit(limit),
            )
            .await?;
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| BackendError::Decode(format!("audit_logs row: {}", e)))
            })
            .collect()
    }
}
