//! ライフサイクルイベントのリスナーディスパッチ
//!
//! リスナーは起動時に明示的に登録された順序付きシーケンスで、遷移の
//! コンテキスト内で逐次・同期的に呼び出される（並列化しない）。
//! 失敗したリスナーが後続リスナーの呼び出しを妨げないことが分離不変条件。

use crate::computer::Computer;
use buildgrid_common::error::{ControllerError, ControllerResult};
use buildgrid_common::log::AgentLog;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// リスナー呼び出しの失敗分類
///
/// 例外クラス階層ではなく明示的なタグでディスパッチャが分岐する。
#[derive(Debug, Error)]
pub enum ListenerError {
    /// 回復可能な失敗。ログに記録し、ディスパッチと遷移は継続する。
    #[error("{message}")]
    Recoverable {
        /// リスナーが報告したメッセージ
        message: String,
    },
    /// 致命的な失敗。遷移はオフライン/失敗へ強制される。
    #[error("{message}")]
    Fatal {
        /// リスナーが報告したメッセージ
        message: String,
    },
}

impl ListenerError {
    /// 回復可能な失敗を作成する
    pub fn recoverable(message: impl Into<String>) -> Self {
        ListenerError::Recoverable {
            message: message.into(),
        }
    }

    /// 致命的な失敗を作成する
    pub fn fatal(message: impl Into<String>) -> Self {
        ListenerError::Fatal {
            message: message.into(),
        }
    }
}

/// ライフサイクル遷移の監視者
pub trait ComputerListener: Send + Sync {
    /// リスナーの識別名（ログ帰属用）
    fn name(&self) -> &'static str;

    /// エージェントがオンラインへ遷移した直後に呼ばれる
    fn on_online(&self, computer: &Computer) -> Result<(), ListenerError> {
        let _ = computer;
        Ok(())
    }

    /// エージェントがオフラインへ遷移した直後に呼ばれる
    fn on_offline(&self, computer: &Computer) -> Result<(), ListenerError> {
        let _ = computer;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Online,
    Offline,
}

impl Phase {
    fn method(self) -> &'static str {
        match self {
            Phase::Online => "on_online",
            Phase::Offline => "on_offline",
        }
    }
}

/// 登録順 = 呼び出し順のリスナーシーケンス
///
/// 実行時スキャンではなく、起動・構成時に明示的に投入する。
#[derive(Default)]
pub struct ListenerSet {
    listeners: Vec<Arc<dyn ComputerListener>>,
}

impl ListenerSet {
    /// 空のリスナーセットを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// リスナーを末尾に登録する
    pub fn register(&mut self, listener: Arc<dyn ComputerListener>) {
        self.listeners.push(listener);
    }

    /// 登録済みリスナー数
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// 空か判定する
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// on_onlineイベントを全リスナーへ配信する
    pub fn dispatch_online(&self, computer: &Computer) -> ControllerResult<()> {
        self.dispatch(computer, Phase::Online)
    }

    /// on_offlineイベントを全リスナーへ配信する
    pub fn dispatch_offline(&self, computer: &Computer) -> ControllerResult<()> {
        self.dispatch(computer, Phase::Offline)
    }

    fn dispatch(&self, computer: &Computer, phase: Phase) -> ControllerResult<()> {
        let log = computer.log();
        let method = phase.method();
        let mut fatal: Option<ControllerError> = None;

        for listener in &self.listeners {
            let result = match phase {
                Phase::Online => listener.on_online(computer),
                Phase::Offline => listener.on_offline(computer),
            };

            match result {
                Ok(()) => {
                    log.append(format!(
                        "Computer listener {} notified ({method})",
                        listener.name()
                    ));
                }
                Err(ListenerError::Recoverable { message }) => {
                    record_failure(log, listener.name(), method, &message);
                    warn!(
                        listener = listener.name(),
                        error = %message,
                        "Computer listener failed; continuing dispatch"
                    );
                }
                Err(ListenerError::Fatal { message }) => {
                    record_failure(log, listener.name(), method, &message);
                    error!(
                        listener = listener.name(),
                        error = %message,
                        "Fatal computer listener failure"
                    );
                    // 後続リスナーにも通知を続け、最初の致命的失敗のみ返す
                    if fatal.is_none() {
                        fatal = Some(ControllerError::ListenerFatal {
                            listener: listener.name().to_string(),
                            message,
                        });
                    }
                }
            }
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn record_failure(log: &AgentLog, listener: &str, method: &str, message: &str) {
    log.append(format!(
        "Computer listener {listener} failed during {method}: {message}"
    ));
    log.append(format!("\tat {listener}.{method}"));
}

/// 接続状態の変化をトレーシングログへ出力する標準リスナー
pub struct ActivityListener;

impl ComputerListener for ActivityListener {
    fn name(&self) -> &'static str {
        "ActivityListener"
    }

    fn on_online(&self, computer: &Computer) -> Result<(), ListenerError> {
        info!(agent = %computer.name(), "Agent connection established");
        Ok(())
    }

    fn on_offline(&self, computer: &Computer) -> Result<(), ListenerError> {
        info!(agent = %computer.name(), "Agent connection closed");
        Ok(())
    }
}
