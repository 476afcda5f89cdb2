// 核心模块 - 配置、错误、重试、健康检查与公共类型
pub mod config;
pub mod error;
pub mod health;
pub mod retry_policy;
pub mod types;

pub use config::{BotConfig, Secrets};
pub use error::{BotError, ErrorSeverity, Result};
pub use health::{BotStatus, HealthServer};
pub use retry_policy::{ExponentialBackoffRetry, RetryConfig};
pub use types::{ExecutionMode, OrderKind, PriceSource, Quote, Side};
