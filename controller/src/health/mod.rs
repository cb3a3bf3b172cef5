//! チャネル死活監視
//!
//! 定期的にオンラインComputerのチャネル生存を確認し、死んだチャネルは
//! 通常の切断経路（リスナー通知込み）でオフラインへ遷移させる。

use crate::launcher::ConnectionLauncher;
use crate::registry::AgentRegistry;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

/// チャネルヘルスモニター
pub struct HealthMonitor {
    registry: AgentRegistry,
    launcher: Arc<ConnectionLauncher>,
    check_interval_secs: u64,
}

impl HealthMonitor {
    /// 新しいヘルスモニターを作成
    pub fn new(
        registry: AgentRegistry,
        launcher: Arc<ConnectionLauncher>,
        check_interval_secs: u64,
    ) -> Self {
        Self {
            registry,
            launcher,
            check_interval_secs,
        }
    }

    /// バックグラウンドで監視を開始
    pub fn start(self) {
        tokio::spawn(async move {
            self.monitor_loop().await;
        });
    }

    /// 監視ループ
    async fn monitor_loop(&self) {
        let mut timer = interval(Duration::from_secs(self.check_interval_secs));

        info!(
            "Channel health monitor started: check_interval={}s",
            self.check_interval_secs
        );

        loop {
            timer.tick().await;
            self.check_channels().await;
        }
    }

    /// 全オンラインComputerのチャネルを確認する
    pub(crate) async fn check_channels(&self) {
        for computer in self.registry.list().await {
            if !computer.is_online() || computer.channel_alive() {
                continue;
            }

            warn!(
                agent = %computer.name(),
                "Dead channel detected; taking agent offline"
            );

            if let Err(e) = self
                .launcher
                .disconnect(&computer, "Channel unexpectedly terminated")
                .await
            {
                // リスナーの致命的失敗はここでは伝播先がないためログに残す
                error!(
                    agent = %computer.name(),
                    error = %e,
                    "Listener failure while disconnecting dead channel"
                );
            }
        }
    }
}
