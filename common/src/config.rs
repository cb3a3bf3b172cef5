//! 設定管理
//!
//! ControllerConfig等の設定構造体

use serde::{Deserialize, Serialize};

/// Controller設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// ホストアドレス (デフォルト: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// ポート番号 (デフォルト: 7070)
    #[serde(default = "default_port")]
    pub port: u16,

    /// チャネル監視間隔（秒）(デフォルト: 30)
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// チャネル確立タイムアウト（秒）(デフォルト: 60)
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7070
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_launch_timeout() -> u64 {
    60
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            health_check_interval_secs: default_health_check_interval(),
            launch_timeout_secs: default_launch_timeout(),
        }
    }
}

impl ControllerConfig {
    /// 環境変数によるオーバーライドを適用した設定を返す
    ///
    /// `BUILDGRID_HOST`, `BUILDGRID_PORT`, `BUILDGRID_HEALTH_INTERVAL`,
    /// `BUILDGRID_LAUNCH_TIMEOUT` を参照する。不正な値はデフォルトに落ちる。
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("BUILDGRID_HOST").unwrap_or(defaults.host),
            port: std::env::var("BUILDGRID_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            health_check_interval_secs: std::env::var("BUILDGRID_HEALTH_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.health_check_interval_secs),
            launch_timeout_secs: std::env::var("BUILDGRID_LAUNCH_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.launch_timeout_secs),
        }
    }

    /// バインドアドレス文字列を返す
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
