//! エージェントのランタイム接続ハンドル
//!
//! Computerは登録済みエージェント1体につき1つ生成され、ライブチャネル・
//! 蓄積ログ・オンラインフラグを保持する。
//! 不変条件: オンラインであるのはハンドシェイク完了済みチャネルを
//! 保持しているときに限る。

use crate::acl::{Authorizer, Permission};
use crate::launcher::{Channel, LaunchStrategy};
use buildgrid_common::log::AgentLog;
use buildgrid_common::protocol::AgentStatusReport;
use buildgrid_common::types::{AgentSpec, AgentState};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use uuid::Uuid;

/// エージェントのランタイム状態
pub struct Computer {
    id: Uuid,
    spec: AgentSpec,
    strategy: Arc<dyn LaunchStrategy>,
    registered_at: DateTime<Utc>,
    log: AgentLog,
    state: RwLock<ConnState>,
    /// 遷移（offline→online / online→offline）を1件ずつ直列化するロック
    transition: Mutex<()>,
}

#[derive(Default)]
struct ConnState {
    online: bool,
    channel: Option<Channel>,
    connected_since: Option<DateTime<Utc>>,
}

impl Computer {
    /// 登録時に新しいComputerを生成する
    pub fn new(spec: AgentSpec, strategy: Arc<dyn LaunchStrategy>) -> Self {
        Self {
            id: Uuid::new_v4(),
            spec,
            strategy,
            registered_at: Utc::now(),
            log: AgentLog::new(),
            state: RwLock::new(ConnState::default()),
            transition: Mutex::new(()),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ConnState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ConnState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// ComputerインスタンスID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// エージェント名
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// 登録時のエージェント定義
    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    /// このエージェントのチャネル確立方法
    pub fn strategy(&self) -> Arc<dyn LaunchStrategy> {
        Arc::clone(&self.strategy)
    }

    /// 登録日時
    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// 蓄積ログ
    pub fn log(&self) -> &AgentLog {
        &self.log
    }

    /// ログ全文を返す
    pub fn get_log(&self) -> String {
        self.log.contents()
    }

    /// オンラインか判定する
    pub fn is_online(&self) -> bool {
        self.read_state().online
    }

    /// オフラインか判定する
    pub fn is_offline(&self) -> bool {
        !self.is_online()
    }

    /// 現在の状態
    pub fn state(&self) -> AgentState {
        if self.is_online() {
            AgentState::Online
        } else {
            AgentState::Offline
        }
    }

    /// オンラインになった時刻（オフライン時はNone）
    pub fn connected_since(&self) -> Option<DateTime<Utc>> {
        self.read_state().connected_since
    }

    pub(crate) fn transition_lock(&self) -> &Mutex<()> {
        &self.transition
    }

    /// ハンドシェイク完了済みチャネルを記録しオンラインへ遷移する
    pub(crate) fn set_online(&self, channel: Channel) {
        let mut state = self.write_state();
        state.channel = Some(channel);
        state.online = true;
        state.connected_since = Some(Utc::now());
    }

    /// オフラインへ遷移し、保持していたチャネルを返す
    pub(crate) fn set_offline(&self) -> Option<Channel> {
        let mut state = self.write_state();
        state.online = false;
        state.connected_since = None;
        state.channel.take()
    }

    /// 保持チャネルが生きているか確認する
    pub(crate) fn channel_alive(&self) -> bool {
        let mut state = self.write_state();
        match state.channel.as_mut() {
            Some(channel) => channel.is_alive(),
            None => false,
        }
    }

    /// リモートファイルシステムのルートパスを返す
    ///
    /// 対象ComputerへのCONNECT権限が必要（READのみでは不可）。未認可の場合は
    /// Noneを返し、呼び出し側からは「未設定」と区別できない。副作用はない。
    pub fn absolute_remote_path(
        &self,
        principal: &str,
        authorizer: &dyn Authorizer,
    ) -> Option<String> {
        if !authorizer.has_permission(principal, Permission::Connect, self.name()) {
            return None;
        }
        Some(self.spec.remote_fs.clone())
    }

    /// ステータスAPI用のレポートを構築する
    ///
    /// `absolute_remote_path` の認可判定は内部呼び出しと同一
    /// （`absolute_remote_path` に委譲）。
    pub fn status_report(&self, principal: &str, authorizer: &dyn Authorizer) -> AgentStatusReport {
        AgentStatusReport {
            name: self.spec.name.clone(),
            id: self.id,
            state: self.state(),
            launcher: self.strategy.name().to_string(),
            registered_at: self.registered_at,
            connected_since: self.connected_since(),
            absolute_remote_path: self.absolute_remote_path(principal, authorizer),
        }
    }
}
