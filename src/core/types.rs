use chrono::{DateTime, Utc};
/// 统一的类型定义模块
/// 信号、交易桥共用的基础数据结构
use serde::{Deserialize, Serialize};

// ============= 基础类型定义 =============

/// 交易方向
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// 从入场类型文本解析方向：以 "buy" 开头（不区分大小写）为多，其余一律为空
    pub fn from_entry_type(entry_type: &str) -> Self {
        if entry_type.trim().to_lowercase().starts_with("buy") {
            Side::Long
        } else {
            Side::Short
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Side::Long)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "BUY",
            Side::Short => "SELL",
        }
    }
}

/// 下单方式
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    /// 市价立即成交
    Market,
    /// 挂单，价格为入场价
    Limit(f64),
}

impl OrderKind {
    /// "Buy limit" / "sell_limit" 等文本视为挂单，其余为市价
    pub fn from_entry_type(entry_type: &str, entry_price: f64) -> Self {
        if entry_type.to_lowercase().contains("limit") {
            OrderKind::Limit(entry_price)
        } else {
            OrderKind::Market
        }
    }
}

// ============= 交易桥数据 =============

/// 成交方式：真实账户或模拟器
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    Live,
    Simulated,
}

impl ExecutionMode {
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionMode::Live => "LIVE",
            ExecutionMode::Simulated => "SIMULATED",
        }
    }
}

/// 报价来源，与成交方式一一对应
pub type PriceSource = ExecutionMode;

/// 行情报价
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub source: PriceSource,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// 平仓方向的价格：多单看bid，空单看ask
    pub fn exit_price(&self, side: Side) -> f64 {
        match side {
            Side::Long => self.bid,
            Side::Short => self.ask,
        }
    }
}
