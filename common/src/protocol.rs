//! ハンドシェイクプロトコル定義
//!
//! チャネル確立時にエージェントログへ記録するメタデータと、
//! ステータスAPIのレスポンス型

use crate::log::AgentLog;
use crate::types::{AgentState, Platform};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// リモーティングプロトコルのバージョン
pub const REMOTING_VERSION: &str = "4.13";

/// チャネル確立時のハンドシェイクメタデータ
///
/// 診断用途のため、全フィールドがエージェントログに残る。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Handshake {
    /// プロトコルバージョン
    pub remoting_version: String,
    /// ランチャー種別名
    pub launcher: String,
    /// 通信方式の説明（例: "Standard in/out"）
    pub communication_protocol: String,
    /// エージェントの実行プラットフォーム
    pub platform: Platform,
}

impl Handshake {
    /// Controller側の情報からハンドシェイクを構築する
    pub fn new(launcher: &str, communication_protocol: &str) -> Self {
        Self {
            remoting_version: REMOTING_VERSION.to_string(),
            launcher: launcher.to_string(),
            communication_protocol: communication_protocol.to_string(),
            platform: Platform::current(),
        }
    }

    /// ハンドシェイク内容をエージェントログへ記録する
    pub fn record(&self, log: &AgentLog) {
        log.append(format!("Remoting version: {}", self.remoting_version));
        log.append(format!("Launcher: {}", self.launcher));
        log.append(format!(
            "Communication Protocol: {}",
            self.communication_protocol
        ));
        log.append(self.platform.banner());
    }
}

/// ステータスAPIのエージェント1件分のレスポンス
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStatusReport {
    /// エージェント名
    pub name: String,
    /// Computer インスタンスID
    pub id: Uuid,
    /// 現在の状態
    pub state: AgentState,
    /// ランチャー種別名
    pub launcher: String,
    /// 登録日時
    pub registered_at: DateTime<Utc>,
    /// オンラインになった時刻（オフライン時はnull）
    #[serde(default)]
    pub connected_since: Option<DateTime<Utc>>,
    /// リモートパス。未認可または未設定の場合はnull（両者は区別されない）
    #[serde(default)]
    pub absolute_remote_path: Option<String>,
}
