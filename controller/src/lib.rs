//! buildgrid Controller
//!
//! ビルドエージェントの接続ライフサイクルを管理する中央サーバー

#![warn(missing_docs)]

/// REST APIハンドラー
pub mod api;

/// 認可チェック
pub mod acl;

/// エージェントのランタイム接続ハンドル
pub mod computer;

/// チャネル死活監視
pub mod health;

/// チャネル確立とライフサイクル遷移
pub mod launcher;

/// ライフサイクルイベントのリスナーディスパッチ
pub mod listeners;

/// ロギング初期化ユーティリティ
pub mod logging;

/// エージェント登録管理
pub mod registry;

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// エージェントレジストリ
    pub registry: registry::AgentRegistry,
    /// 接続ランチャー
    pub launcher: std::sync::Arc<launcher::ConnectionLauncher>,
    /// 認可サービス
    pub authorizer: std::sync::Arc<dyn acl::Authorizer>,
}
