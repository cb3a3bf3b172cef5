//! チャネル確立とライフサイクル遷移
//!
//! LaunchStrategyがトランスポートを開き、ConnectionLauncherが
//! offline→online / online→offline の遷移とリスナー通知を駆動する。
//! 遷移はComputer毎の遷移ロックで直列化され、起動は完了（online）か
//! 失敗（offline）のいずれかで終わる。キャンセル中間状態は持たない。

use crate::computer::Computer;
use crate::listeners::ListenerSet;
use buildgrid_common::error::{ControllerError, ControllerResult};
use buildgrid_common::log::AgentLog;
use buildgrid_common::protocol::Handshake;
use buildgrid_common::types::LaunchSpec;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info};

/// エージェントプロセスへのライブ双方向リンク
pub struct Channel {
    handle: ChannelHandle,
}

enum ChannelHandle {
    /// Controllerが起動したサブプロセス
    Process(Child),
    /// 外部から受け入れた接続
    Inbound { open: bool },
}

impl Channel {
    pub(crate) fn process(child: Child) -> Self {
        Self {
            handle: ChannelHandle::Process(child),
        }
    }

    /// 受け入れ済みのインバウンド接続を表すチャネルを作成する
    pub fn inbound() -> Self {
        Self {
            handle: ChannelHandle::Inbound { open: true },
        }
    }

    /// チャネルが生きているか確認する
    pub fn is_alive(&mut self) -> bool {
        match &mut self.handle {
            ChannelHandle::Process(child) => matches!(child.try_wait(), Ok(None)),
            ChannelHandle::Inbound { open } => *open,
        }
    }

    /// チャネルを解放する
    pub async fn close(&mut self) {
        match &mut self.handle {
            ChannelHandle::Process(child) => {
                // 既に終了している場合はkillが失敗するだけなので無視する
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
            ChannelHandle::Inbound { open } => {
                *open = false;
            }
        }
    }
}

/// チャネル確立方法
///
/// トランスポート自体は外部の能力であり、Controllerはopen/closeの
/// ライフサイクルだけを駆動する。
pub trait LaunchStrategy: Send + Sync {
    /// ランチャー種別名（ログ・ステータス表示用）
    fn name(&self) -> &'static str;

    /// 通信方式の説明（ハンドシェイクログに残る）
    fn communication_mode(&self) -> &'static str;

    /// チャネルを確立する
    fn open(&self, log: &AgentLog) -> ControllerResult<Channel>;
}

/// ローカルサブプロセスを起動するランチャー（標準入出力で通信）
pub struct CommandLauncher {
    command: String,
    args: Vec<String>,
}

impl CommandLauncher {
    /// 起動コマンドを指定してランチャーを作成する
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

impl LaunchStrategy for CommandLauncher {
    fn name(&self) -> &'static str {
        "CommandLauncher"
    }

    fn communication_mode(&self) -> &'static str {
        "Standard in/out"
    }

    fn open(&self, log: &AgentLog) -> ControllerResult<Channel> {
        log.append(format!("$ {} {}", self.command, self.args.join(" ")));

        let child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ControllerError::LaunchFailure(format!(
                    "failed to spawn agent process `{}`: {e}",
                    self.command
                ))
            })?;

        Ok(Channel::process(child))
    }
}

/// エージェント側からの接続を受け入れるランチャー
///
/// 接続受け入れ側（acceptループ等）が事前に `offer` でチャネルを
/// 引き渡しておく。未提供のまま起動するとLaunchFailureになる。
#[derive(Default)]
pub struct InboundLauncher {
    offered: Mutex<Option<Channel>>,
}

impl InboundLauncher {
    /// 新しいインバウンドランチャーを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// 受け入れた接続を次回起動用に引き渡す
    pub fn offer(&self, channel: Channel) {
        let mut offered = match self.offered.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *offered = Some(channel);
    }

    fn take_offered(&self) -> Option<Channel> {
        let mut offered = match self.offered.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        offered.take()
    }
}

impl LaunchStrategy for InboundLauncher {
    fn name(&self) -> &'static str {
        "InboundLauncher"
    }

    fn communication_mode(&self) -> &'static str {
        "Inbound TCP"
    }

    fn open(&self, log: &AgentLog) -> ControllerResult<Channel> {
        match self.take_offered() {
            Some(channel) => Ok(channel),
            None => {
                log.append("Waiting for agent to dial in: no inbound connection offered");
                Err(ControllerError::LaunchFailure(
                    "no inbound connection has been offered".to_string(),
                ))
            }
        }
    }
}

/// LaunchSpecから対応するランチャーを構築する
pub fn strategy_for(launch: &LaunchSpec) -> Arc<dyn LaunchStrategy> {
    match launch {
        LaunchSpec::Command { command, args } => {
            Arc::new(CommandLauncher::new(command.clone(), args.clone()))
        }
        LaunchSpec::Inbound => Arc::new(InboundLauncher::new()),
    }
}

/// 接続ランチャー
///
/// ライフサイクル遷移の唯一の駆動点。ハンドシェイクメタデータの記録と
/// リスナーディスパッチを遷移の一部として実行する。
pub struct ConnectionLauncher {
    listeners: Arc<ListenerSet>,
    launch_timeout: Duration,
}

impl ConnectionLauncher {
    /// リスナーセットと起動タイムアウトを指定して作成する
    pub fn new(listeners: Arc<ListenerSet>, launch_timeout: Duration) -> Self {
        Self {
            listeners,
            launch_timeout,
        }
    }

    /// 登録済みリスナーセット
    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// エージェントをオンラインへ遷移させる
    ///
    /// 既にオンラインなら何もしない。チャネル確立失敗時はオフラインのまま
    /// `LaunchFailure` を返す。成功時はハンドシェイクをログへ記録し、
    /// オンライン化した上でon_onlineディスパッチを完了してから戻る。
    /// リスナーの致命的失敗は遷移を失敗扱いにし、エージェントは
    /// オフラインで終わる。
    pub async fn connect(&self, computer: &Arc<Computer>) -> ControllerResult<()> {
        let _transition = computer.transition_lock().lock().await;
        if computer.is_online() {
            return Ok(());
        }

        let log = computer.log().clone();
        let strategy = computer.strategy();
        log.append(format!(
            "Launching agent {} via {}",
            computer.name(),
            strategy.name()
        ));
        info!(agent = %computer.name(), launcher = strategy.name(), "Launching agent");

        let open_result = {
            let strategy = Arc::clone(&strategy);
            let log = log.clone();
            timeout(
                self.launch_timeout,
                tokio::task::spawn_blocking(move || strategy.open(&log)),
            )
            .await
        };

        let channel = match open_result {
            Err(_) => {
                let err = ControllerError::LaunchFailure(format!(
                    "channel was not established within {} seconds",
                    self.launch_timeout.as_secs()
                ));
                log.append(format!("Launch failed: {err}"));
                error!(agent = %computer.name(), error = %err, "Agent launch timed out");
                return Err(err);
            }
            Ok(Err(join_err)) => {
                let err =
                    ControllerError::Internal(format!("launch task failed: {join_err}"));
                log.append(format!("Launch failed: {err}"));
                error!(agent = %computer.name(), error = %err, "Agent launch task failed");
                return Err(err);
            }
            Ok(Ok(Err(err))) => {
                log.append(format!("Launch failed: {err}"));
                error!(agent = %computer.name(), error = %err, "Agent launch failed");
                return Err(err);
            }
            Ok(Ok(Ok(channel))) => channel,
        };

        Handshake::new(strategy.name(), strategy.communication_mode()).record(&log);
        computer.set_online(channel);

        match self.listeners.dispatch_online(computer) {
            Ok(()) => {
                log.append(format!(
                    "Agent {} successfully connected and online",
                    computer.name()
                ));
                info!(agent = %computer.name(), "Agent is online");
                Ok(())
            }
            Err(fatal) => {
                if let Some(mut channel) = computer.set_offline() {
                    channel.close().await;
                }
                log.append(format!("Connection terminated: {fatal}"));
                error!(
                    agent = %computer.name(),
                    error = %fatal,
                    "Fatal listener failure forced agent offline"
                );
                Err(fatal)
            }
        }
    }

    /// 接続処理を専用タスクで実行する
    ///
    /// 登録やAPI呼び出しのコンテキストをブロックしない。
    pub fn connect_detached(
        self: &Arc<Self>,
        computer: Arc<Computer>,
    ) -> JoinHandle<ControllerResult<()>> {
        let launcher = Arc::clone(self);
        tokio::spawn(async move { launcher.connect(&computer).await })
    }

    /// エージェントをオフラインへ遷移させる
    ///
    /// チャネルを解放してからon_offlineディスパッチを実行する。
    /// 既にオフラインなら何もしない。
    pub async fn disconnect(&self, computer: &Arc<Computer>, reason: &str) -> ControllerResult<()> {
        let _transition = computer.transition_lock().lock().await;
        if computer.is_offline() {
            return Ok(());
        }

        if let Some(mut channel) = computer.set_offline() {
            channel.close().await;
        }
        computer.log().append(format!("Disconnected: {reason}"));
        info!(agent = %computer.name(), reason, "Agent disconnected");

        self.listeners.dispatch_offline(computer)
    }
}
