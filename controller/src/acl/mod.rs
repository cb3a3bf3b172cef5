//! 認可チェック
//!
//! Controllerはポリシーを持たず、`Authorizer` の狭いインターフェース経由で
//! 外部の認可サービスへ問い合わせる。チェックは同期・副作用なしの読み取り。

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// 内部呼び出し用のシステムプリンシパル（全権限を持つ）
pub const SYSTEM_PRINCIPAL: &str = "SYSTEM";

/// 未認証リクエストに割り当てるプリンシパル
pub const ANONYMOUS_PRINCIPAL: &str = "anonymous";

/// Computerに対する操作を保護する権限レベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// 状態の参照
    Read,
    /// チャネル接続・リモートパス参照
    Connect,
    /// 構成変更
    Configure,
}

/// 認可サービスへの問い合わせインターフェース
pub trait Authorizer: Send + Sync {
    /// プリンシパルが対象に対して権限を持つか判定する
    fn has_permission(&self, principal: &str, permission: Permission, target: &str) -> bool;
}

/// 全チェックを許可する認可実装（セキュリティ未設定時のデフォルト）
pub struct Unsecured;

impl Authorizer for Unsecured {
    fn has_permission(&self, _principal: &str, _permission: Permission, _target: &str) -> bool {
        true
    }
}

/// プリンシパル毎の明示的なグラントで判定する認可実装
///
/// グラントは対象指定（特定エージェント名）または全対象（everywhere）。
/// 明示されていない組み合わせは全て拒否される。
#[derive(Default)]
pub struct GrantTable {
    grants: RwLock<Vec<Grant>>,
}

struct Grant {
    principal: String,
    permission: Permission,
    /// Noneは全対象への付与
    target: Option<String>,
}

impl GrantTable {
    /// 空のグラントテーブルを作成する
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Grant>> {
        match self.grants.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Grant>> {
        match self.grants.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 全対象への権限を付与する
    pub fn grant(&self, principal: &str, permission: Permission) -> &Self {
        self.lock_write().push(Grant {
            principal: principal.to_string(),
            permission,
            target: None,
        });
        self
    }

    /// 特定対象への権限を付与する
    pub fn grant_on(&self, principal: &str, permission: Permission, target: &str) -> &Self {
        self.lock_write().push(Grant {
            principal: principal.to_string(),
            permission,
            target: Some(target.to_string()),
        });
        self
    }
}

impl Authorizer for GrantTable {
    fn has_permission(&self, principal: &str, permission: Permission, target: &str) -> bool {
        if principal == SYSTEM_PRINCIPAL {
            return true;
        }

        self.lock_read().iter().any(|grant| {
            grant.principal == principal
                && grant.permission == permission
                && grant.target.as_deref().map_or(true, |t| t == target)
        })
    }
}
