use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("网络请求错误: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("配置加载错误: {0}")]
    ConfigLoadError(#[from] config::ConfigError),

    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("API错误: {code} - {message}")]
    ApiError { code: u16, message: String },

    #[error("认证错误: {0}")]
    AuthError(String),

    #[error("权限不足: {0}")]
    PermissionError(String),

    #[error("未找到: {0}")]
    NotFound(String),

    #[error("速率限制: {0}")]
    RateLimitError(String, Option<u64>),

    #[error("网关错误: {0}")]
    GatewayError(String),

    #[error("交易桥错误: {0}")]
    BridgeError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("参数验证错误: {field} - {reason}")]
    ValidationError { field: String, reason: String },

    #[error("超时错误: 操作 '{operation}' 超时 ({timeout_seconds}秒)")]
    TimeoutError {
        operation: String,
        timeout_seconds: u64,
    },

    #[error("持久化错误: {0:#}")]
    PersistenceError(#[from] anyhow::Error),

    #[error("其他错误: {0}")]
    Other(String),
}

impl BotError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        BotError::ValidationError {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// 判断错误是否可以重试
    pub fn is_retryable(&self) -> bool {
        match self {
            BotError::NetworkError(_) => true,
            BotError::TimeoutError { .. } => true,
            BotError::RateLimitError(_, _) => true,
            BotError::ApiError { code, .. } => *code >= 500 && *code < 600,
            _ => false,
        }
    }

    /// 获取建议的重试等待时间(秒)
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            BotError::RateLimitError(_, retry_after) => *retry_after,
            BotError::NetworkError(_) => Some(1),
            BotError::TimeoutError { .. } => Some(2),
            BotError::ApiError { code, .. } if *code >= 500 => Some(5),
            _ => None,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BotError::NetworkError(_) => ErrorSeverity::Warning,
            BotError::TimeoutError { .. } => ErrorSeverity::Warning,
            BotError::RateLimitError(_, _) => ErrorSeverity::Warning,
            BotError::NotFound(_) => ErrorSeverity::Info,
            BotError::ValidationError { .. } => ErrorSeverity::Error,
            BotError::AuthError(_) => ErrorSeverity::Critical,
            BotError::ConfigError(_) | BotError::ConfigLoadError(_) => ErrorSeverity::Critical,
            BotError::PersistenceError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// 面向Discord用户的错误描述（英文，直接用于ephemeral回复）
    pub fn user_friendly_message(&self) -> String {
        match self {
            BotError::NetworkError(_) => {
                "Network problem while talking to Discord, please try again.".to_string()
            }
            BotError::PermissionError(what) => format!("No permission: {}", what),
            BotError::NotFound(what) => format!("Not found: {}", what),
            BotError::RateLimitError(_, retry_after) => {
                if let Some(seconds) = retry_after {
                    format!("Rate limited, please retry in {} seconds.", seconds)
                } else {
                    "Rate limited, please retry shortly.".to_string()
                }
            }
            BotError::ValidationError { field, reason } => {
                format!("Invalid `{}`: {}", field, reason)
            }
            BotError::BridgeError(msg) => format!("Trading bridge error: {}", msg),
            BotError::ConfigError(msg) => format!("Configuration problem: {}", msg),
            BotError::PersistenceError(_) => {
                "Could not save bot state, please check the logs.".to_string()
            }
            BotError::ApiError { code, message } => {
                format!("Discord API error {}: {}", code, message)
            }
            _ => format!("Unexpected error: {}", self),
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorSeverity {
    Info,     // 信息性错误，通常不影响操作
    Warning,  // 警告性错误，可以重试
    Error,    // 一般错误，需要用户处理
    Critical, // 严重错误，需要立即处理
}
