//! 共通型定義
//!
//! AgentSpec, AgentState, Platform等のコアデータ型

use crate::error::{CommonError, CommonResult};
use serde::{Deserialize, Serialize};

/// エージェント定義
///
/// レジストリ登録時に与える静的な構成情報。ランタイム状態はComputerが保持する。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSpec {
    /// 一意識別名（レジストリ内で重複不可）
    pub name: String,
    /// リモートファイルシステムのルートパス
    pub remote_fs: String,
    /// チャネル確立方法
    pub launch: LaunchSpec,
}

impl AgentSpec {
    /// 登録要件を満たしているか検証する
    pub fn validate(&self) -> CommonResult<()> {
        if self.name.trim().is_empty() {
            return Err(CommonError::Validation(
                "agent name must not be empty".to_string(),
            ));
        }
        if self.name.trim() != self.name {
            return Err(CommonError::Validation(
                "agent name must not have leading or trailing whitespace".to_string(),
            ));
        }
        if self.remote_fs.trim().is_empty() {
            return Err(CommonError::Validation(
                "remote_fs must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// チャネル確立方法の指定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LaunchSpec {
    /// ローカルサブプロセスを起動する（標準入出力で通信）
    Command {
        /// 実行コマンド
        command: String,
        /// コマンド引数
        #[serde(default)]
        args: Vec<String>,
    },
    /// エージェント側からの接続を受け入れる
    Inbound,
}

/// エージェント状態
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// オンライン（ハンドシェイク完了済みチャネルを保持）
    Online,
    /// オフライン
    Offline,
}

/// 実行プラットフォーム
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Unix系OS
    Unix,
    /// Windows
    Windows,
}

impl Platform {
    /// Controllerが動作しているプラットフォームを返す
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// 表示名
    pub fn label(&self) -> &'static str {
        match self {
            Platform::Unix => "Unix",
            Platform::Windows => "Windows",
        }
    }

    /// エージェントログに記録するバナー行
    pub fn banner(&self) -> String {
        format!("This is a {} agent", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> AgentSpec {
        AgentSpec {
            name: "nodeA".to_string(),
            remote_fs: "/var/agents/nodeA".to_string(),
            launch: LaunchSpec::Command {
                command: "sleep".to_string(),
                args: vec!["30".to_string()],
            },
        }
    }

    #[test]
    fn test_agent_spec_validate_ok() {
        assert!(sample_spec().validate().is_ok());
    }

    #[test]
    fn test_agent_spec_rejects_empty_name() {
        let mut spec = sample_spec();
        spec.name = "  ".to_string();
        assert!(matches!(
            spec.validate(),
            Err(CommonError::Validation(_))
        ));
    }

    #[test]
    fn test_agent_spec_rejects_padded_name() {
        let mut spec = sample_spec();
        spec.name = " nodeA ".to_string();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_agent_spec_rejects_empty_remote_fs() {
        let mut spec = sample_spec();
        spec.remote_fs = String::new();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_launch_spec_serialization() {
        let launch = LaunchSpec::Command {
            command: "sleep".to_string(),
            args: vec!["30".to_string()],
        };
        let json = serde_json::to_string(&launch).unwrap();
        assert!(json.contains("\"kind\":\"command\""));

        let deserialized: LaunchSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(launch, deserialized);
    }

    #[test]
    fn test_launch_spec_command_default_args() {
        let json = r#"{"kind":"command","command":"sleep"}"#;
        let launch: LaunchSpec = serde_json::from_str(json).unwrap();
        assert_eq!(
            launch,
            LaunchSpec::Command {
                command: "sleep".to_string(),
                args: Vec::new(),
            }
        );
    }

    #[test]
    fn test_agent_state_serialization() {
        assert_eq!(
            serde_json::to_string(&AgentState::Online).unwrap(),
            "\"online\""
        );
        assert_eq!(
            serde_json::to_string(&AgentState::Offline).unwrap(),
            "\"offline\""
        );
    }

    #[test]
    fn test_platform_banner() {
        assert_eq!(Platform::Unix.banner(), "This is a Unix agent");
        assert_eq!(Platform::Windows.banner(), "This is a Windows agent");
    }

    #[test]
    fn test_platform_current_matches_host() {
        let platform = Platform::current();
        if cfg!(windows) {
            assert_eq!(platform, Platform::Windows);
        } else {
            assert_eq!(platform, Platform::Unix);
        }
    }
}
