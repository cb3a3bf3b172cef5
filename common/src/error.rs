//! エラー型定義
//!
//! 統一エラー型（thiserror使用）

use thiserror::Error;

/// Common layer error type
#[derive(Debug, Error)]
pub enum CommonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Controller error type
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Common layer error
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Agent name already registered
    #[error("Agent name already registered: {0}")]
    DuplicateAgentName(String),

    /// Agent not found
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Channel could not be established
    #[error("Launch failed: {0}")]
    LaunchFailure(String),

    /// A listener raised a fatal condition during dispatch
    #[error("Fatal listener failure in {listener}: {message}")]
    ListenerFatal {
        /// 失敗したリスナーの識別名
        listener: String,
        /// リスナーが報告したメッセージ
        message: String,
    },

    /// Channel is no longer alive
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias (Common)
pub type CommonResult<T> = Result<T, CommonError>;

/// Result type alias (Controller)
pub type ControllerResult<T> = Result<T, ControllerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_error_display() {
        let error = CommonError::Config("test config error".to_string());
        assert_eq!(error.to_string(), "Configuration error: test config error");
    }

    #[test]
    fn test_duplicate_agent_name_display() {
        let error = ControllerError::DuplicateAgentName("nodeA".to_string());
        assert_eq!(error.to_string(), "Agent name already registered: nodeA");
    }

    #[test]
    fn test_listener_fatal_display_names_listener() {
        let error = ControllerError::ListenerFatal {
            listener: "ErrorOnOnlineListener".to_string(),
            message: "Something happened".to_string(),
        };
        assert!(error.to_string().contains("ErrorOnOnlineListener"));
        assert!(error.to_string().contains("Something happened"));
    }

    #[test]
    fn test_error_from_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let common_error: CommonError = json_error.into();
        assert!(matches!(common_error, CommonError::Serialization(_)));

        let controller_error: ControllerError = common_error.into();
        assert!(matches!(controller_error, ControllerError::Common(_)));
    }
}
