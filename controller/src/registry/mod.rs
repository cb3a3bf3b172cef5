//! エージェント登録管理
//!
//! 既知のエージェントと対応するComputerをメモリ内で管理する。
//! 変更はRwLockの書き込みロックで直列化し、参照は並行に行える。

use crate::computer::Computer;
use crate::launcher::{strategy_for, LaunchStrategy};
use buildgrid_common::error::{ControllerError, ControllerResult};
use buildgrid_common::types::AgentSpec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// エージェントレジストリ
#[derive(Clone, Default)]
pub struct AgentRegistry {
    computers: Arc<RwLock<HashMap<String, Arc<Computer>>>>,
}

impl AgentRegistry {
    /// 新しいレジストリを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// エージェントを登録し、対応するComputerを生成する
    ///
    /// 同名エージェントが存在する場合は `DuplicateAgentName` で失敗し、
    /// レジストリは変更されない。
    pub async fn register(&self, spec: AgentSpec) -> ControllerResult<Arc<Computer>> {
        spec.validate().map_err(ControllerError::from)?;
        let strategy = strategy_for(&spec.launch);
        self.register_with_strategy(spec, strategy).await
    }

    /// ランチャー実装を指定してエージェントを登録する
    pub async fn register_with_strategy(
        &self,
        spec: AgentSpec,
        strategy: Arc<dyn LaunchStrategy>,
    ) -> ControllerResult<Arc<Computer>> {
        let mut computers = self.computers.write().await;

        if computers.contains_key(&spec.name) {
            return Err(ControllerError::DuplicateAgentName(spec.name));
        }

        let computer = Arc::new(Computer::new(spec, strategy));
        computers.insert(computer.name().to_string(), Arc::clone(&computer));
        info!(
            agent = %computer.name(),
            launcher = computer.strategy().name(),
            "Agent registered"
        );
        Ok(computer)
    }

    /// 名前でComputerを取得する
    pub async fn get(&self, name: &str) -> Option<Arc<Computer>> {
        let computers = self.computers.read().await;
        computers.get(name).cloned()
    }

    /// 全Computerを登録日時順で取得する
    pub async fn list(&self) -> Vec<Arc<Computer>> {
        let computers = self.computers.read().await;
        let mut list: Vec<Arc<Computer>> = computers.values().cloned().collect();
        list.sort_by(|a, b| a.registered_at().cmp(&b.registered_at()));
        list
    }

    /// エージェントを削除し、Computerを切り離す
    ///
    /// チャネルが残っていればクローズする。リスナー通知は行わないため、
    /// 通知が必要な場合は先に `ConnectionLauncher::disconnect` を呼ぶこと。
    pub async fn remove(&self, name: &str) -> ControllerResult<Arc<Computer>> {
        let removed = {
            let mut computers = self.computers.write().await;
            computers.remove(name)
        };

        let computer = removed.ok_or_else(|| ControllerError::AgentNotFound(name.to_string()))?;

        // 進行中の遷移が完了してから切り離す。ロックを取らずにオフライン化
        // すると、飛行中の接続が登録解除済みComputerをオンラインに戻し、
        // チャネルが誰にも回収されないまま残る。
        {
            let _transition = computer.transition_lock().lock().await;
            if let Some(mut channel) = computer.set_offline() {
                channel.close().await;
            }
        }
        info!(agent = %computer.name(), "Agent removed from registry");
        Ok(computer)
    }

    /// 登録済みエージェント数
    pub async fn len(&self) -> usize {
        self.computers.read().await.len()
    }

    /// レジストリが空か判定する
    pub async fn is_empty(&self) -> bool {
        self.computers.read().await.is_empty()
    }
}
