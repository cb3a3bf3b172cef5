//! エージェント接続ライフサイクルの統合テスト
//!
//! 実プロセスを起動するCommandLauncher経路と、リスナー失敗時の
//! 分離・伝播動作をエンドツーエンドで検証する。

use buildgrid_common::error::{ControllerError, ControllerResult};
use buildgrid_common::log::AgentLog;
use buildgrid_common::protocol::REMOTING_VERSION;
use buildgrid_common::types::{AgentSpec, LaunchSpec, Platform};
use buildgrid_controller::acl::{GrantTable, Permission};
use buildgrid_controller::launcher::{Channel, ConnectionLauncher, LaunchStrategy};
use buildgrid_controller::listeners::{ComputerListener, ListenerError, ListenerSet};
use buildgrid_controller::registry::AgentRegistry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// ホストで確実に長時間存在するコマンド
fn idle_command() -> LaunchSpec {
    if cfg!(windows) {
        LaunchSpec::Command {
            command: "ping".to_string(),
            args: vec!["-n".to_string(), "30".to_string(), "127.0.0.1".to_string()],
        }
    } else {
        LaunchSpec::Command {
            command: "sleep".to_string(),
            args: vec!["30".to_string()],
        }
    }
}

/// プロセスを起動せずにチャネルを返すストラテジー
struct LoopbackLauncher;

impl LaunchStrategy for LoopbackLauncher {
    fn name(&self) -> &'static str {
        "LoopbackLauncher"
    }

    fn communication_mode(&self) -> &'static str {
        "Loopback"
    }

    fn open(&self, _log: &AgentLog) -> ControllerResult<Channel> {
        Ok(Channel::inbound())
    }
}

/// 発火回数をインスタンスで保持し、指定した分類のエラーを返すリスナー
struct ThrowingListener {
    name: &'static str,
    fatal: bool,
    fired: AtomicUsize,
}

impl ThrowingListener {
    fn recoverable(name: &'static str) -> Self {
        Self {
            name,
            fatal: false,
            fired: AtomicUsize::new(0),
        }
    }

    fn fatal(name: &'static str) -> Self {
        Self {
            name,
            fatal: true,
            fired: AtomicUsize::new(0),
        }
    }

    fn fire_count(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }
}

impl ComputerListener for ThrowingListener {
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_online(&self, _computer: &buildgrid_controller::computer::Computer) -> Result<(), ListenerError> {
        self.fired.fetch_add(1, Ordering::SeqCst);
        let message = "Something happened (the listener always throws this exception)";
        if self.fatal {
            Err(ListenerError::fatal(message))
        } else {
            Err(ListenerError::recoverable(message))
        }
    }
}

fn launcher_with(listeners: Vec<Arc<dyn ComputerListener>>) -> Arc<ConnectionLauncher> {
    let mut set = ListenerSet::new();
    for listener in listeners {
        set.register(listener);
    }
    Arc::new(ConnectionLauncher::new(
        Arc::new(set),
        Duration::from_secs(10),
    ))
}

#[tokio::test]
async fn agent_log_contains_handshake_metadata() {
    let registry = AgentRegistry::new();
    let launcher = launcher_with(Vec::new());

    let computer = registry
        .register(AgentSpec {
            name: "nodeA".to_string(),
            remote_fs: "/var/agents/nodeA".to_string(),
            launch: idle_command(),
        })
        .await
        .unwrap();

    launcher.connect(&computer).await.unwrap();
    assert!(computer.is_online());

    let log = computer.get_log();
    assert!(
        log.contains(&format!("Remoting version: {REMOTING_VERSION}")),
        "log was: {log}"
    );
    assert!(log.contains("Launcher: CommandLauncher"), "log was: {log}");
    assert!(
        log.contains("Communication Protocol: Standard in/out"),
        "log was: {log}"
    );
    assert!(
        log.contains(&Platform::current().banner()),
        "log was: {log}"
    );

    launcher.disconnect(&computer, "test cleanup").await.unwrap();
    assert!(computer.is_offline());
}

#[tokio::test]
async fn recoverable_listener_failures_leave_agent_online() {
    let io_listener = Arc::new(ThrowingListener::recoverable("IoFailureListener"));
    let runtime_listener = Arc::new(ThrowingListener::recoverable("RuntimeFailureListener"));
    let registry = AgentRegistry::new();
    let launcher = launcher_with(vec![
        io_listener.clone() as Arc<dyn ComputerListener>,
        runtime_listener.clone(),
    ]);

    let computer = registry
        .register_with_strategy(
            AgentSpec {
                name: "nodeA".to_string(),
                remote_fs: "/var/agents/nodeA".to_string(),
                launch: LaunchSpec::Inbound,
            },
            Arc::new(LoopbackLauncher),
        )
        .await
        .unwrap();

    launcher.connect(&computer).await.unwrap();

    assert!(computer.is_online());
    assert!(!computer.is_offline());
    assert_eq!(io_listener.fire_count(), 1);
    assert_eq!(runtime_listener.fire_count(), 1);

    // スタックトレース様の行が両リスナー分、登録順に残る
    let log = computer.get_log();
    let io_pos = log.find("\tat IoFailureListener.on_online").unwrap();
    let runtime_pos = log.find("\tat RuntimeFailureListener.on_online").unwrap();
    assert!(io_pos < runtime_pos);
}

#[tokio::test]
async fn fatal_listener_failure_leaves_agent_offline() {
    let fatal_listener = Arc::new(ThrowingListener::fatal("ErrorOnOnlineListener"));
    let registry = AgentRegistry::new();
    let launcher = launcher_with(vec![fatal_listener.clone() as Arc<dyn ComputerListener>]);

    let computer = registry
        .register_with_strategy(
            AgentSpec {
                name: "nodeB".to_string(),
                remote_fs: "/var/agents/nodeB".to_string(),
                launch: LaunchSpec::Inbound,
            },
            Arc::new(LoopbackLauncher),
        )
        .await
        .unwrap();

    let result = launcher.connect(&computer).await;

    assert!(matches!(
        result,
        Err(ControllerError::ListenerFatal { .. })
    ));
    assert!(computer.is_offline());
    assert!(!computer.is_online());
    assert_eq!(fatal_listener.fire_count(), 1);
}

#[tokio::test]
async fn remote_path_resolution_respects_permissions() {
    let registry = AgentRegistry::new();
    let authorizer = GrantTable::new();
    authorizer.grant("alice", Permission::Configure);
    authorizer.grant("alice", Permission::Read);
    authorizer.grant("bob", Permission::Connect);
    authorizer.grant("bob", Permission::Read);

    let computer = registry
        .register_with_strategy(
            AgentSpec {
                name: "nodeA".to_string(),
                remote_fs: "/var/agents/nodeA".to_string(),
                launch: LaunchSpec::Inbound,
            },
            Arc::new(LoopbackLauncher),
        )
        .await
        .unwrap();

    // CONNECT保持者には同一の設定済みパスが安定して返る
    let path = computer.absolute_remote_path("bob", &authorizer);
    assert_eq!(path, Some("/var/agents/nodeA".to_string()));
    assert_eq!(computer.absolute_remote_path("bob", &authorizer), path);

    // READのみでは2回問い合わせても不可、状態変化もない
    assert_eq!(computer.absolute_remote_path("alice", &authorizer), None);
    assert_eq!(computer.absolute_remote_path("alice", &authorizer), None);
    assert!(computer.is_offline());
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let registry = AgentRegistry::new();
    let spec = AgentSpec {
        name: "nodeA".to_string(),
        remote_fs: "/var/agents/nodeA".to_string(),
        launch: LaunchSpec::Inbound,
    };

    registry.register(spec.clone()).await.unwrap();
    let result = registry.register(spec).await;

    assert!(matches!(
        result,
        Err(ControllerError::DuplicateAgentName(_))
    ));
    assert_eq!(registry.len().await, 1);
}
