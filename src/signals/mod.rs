// 交易信号 - 价位计算、分发、跟踪
pub mod dispatcher;
pub mod format;
pub mod instruments;
pub mod levels;
pub mod monitor;
pub mod stats;
pub mod store;

pub use dispatcher::{DeliveryReport, SignalDispatcher};
pub use levels::{calculate_levels, Levels};
pub use monitor::{SignalEvent, SignalMonitor};
pub use store::{Signal, SignalStore};
