//! buildgrid Common Library
//!
//! 共通型定義、ハンドシェイクプロトコル、設定、エラー型を提供

#![warn(missing_docs)]

/// 共通型定義
pub mod types;

/// ハンドシェイクプロトコル定義
pub mod protocol;

/// 設定管理
pub mod config;

/// エラー型定義
pub mod error;

/// エージェントログバッファ
pub mod log;
