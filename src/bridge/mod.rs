// 交易桥 - 把信号同步下单到交易账户
pub mod fallback;
pub mod metaapi;
pub mod simulator;
pub mod symbols;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::{ExecutionMode, OrderKind, Quote, Side};

pub use fallback::FallbackBridge;
pub use metaapi::{MetaApiBridge, MetaApiConfig};
pub use simulator::SimulatedBridge;
pub use symbols::SymbolMapper;

/// 下单请求，品种为信号品种（未映射）
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub volume: f64,
    pub stop_loss: f64,
    /// 固定使用TP3
    pub take_profit: f64,
    pub comment: String,
}

/// 成交回执
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTicket {
    pub order_id: String,
    pub position_id: Option<String>,
    /// 券商端品种名
    pub symbol: String,
    pub side: Side,
    pub mode: ExecutionMode,
    pub volume: f64,
    pub open_price: Option<f64>,
    pub opened_at: DateTime<Utc>,
}

/// 下单结果
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Filled(OrderTicket),
    Rejected { mode: ExecutionMode, reason: String },
}

impl OrderOutcome {
    pub fn ticket(&self) -> Option<&OrderTicket> {
        match self {
            OrderOutcome::Filled(ticket) => Some(ticket),
            OrderOutcome::Rejected { .. } => None,
        }
    }

    /// `/entry` 回复中展示的一行
    pub fn describe(&self) -> String {
        match self {
            OrderOutcome::Filled(ticket) => match ticket.mode {
                ExecutionMode::Live => format!(
                    "🟢 LIVE order placed: {} {} {} lots (order {})",
                    ticket.side.as_str(),
                    ticket.symbol,
                    ticket.volume,
                    ticket.order_id
                ),
                ExecutionMode::Simulated => format!(
                    "🟡 SIMULATED fill only, no real order was placed: {} {} {} lots (ticket {})",
                    ticket.side.as_str(),
                    ticket.symbol,
                    ticket.volume,
                    ticket.order_id
                ),
            },
            OrderOutcome::Rejected { mode, reason } => {
                format!("🔴 {} order rejected: {}", mode.label(), reason)
            }
        }
    }
}

/// 交易桥状态
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BridgeStatus {
    pub mode: Option<ExecutionMode>,
    pub connected: bool,
    pub account_id: Option<String>,
    pub region: Option<String>,
    pub broker: Option<String>,
    pub balance: Option<f64>,
    pub equity: Option<f64>,
    pub currency: Option<String>,
    pub last_error: Option<String>,
}

impl BridgeStatus {
    pub fn describe(&self) -> String {
        let mode = self.mode.map(|m| m.label()).unwrap_or("DISABLED");
        let mut lines = vec![format!(
            "**Trading bridge:** {} ({})",
            mode,
            if self.connected { "connected" } else { "not connected" }
        )];
        if let Some(account) = &self.account_id {
            lines.push(format!("Account: {}", account));
        }
        if let Some(region) = &self.region {
            lines.push(format!("Region: {}", region));
        }
        if let Some(broker) = &self.broker {
            lines.push(format!("Broker: {}", broker));
        }
        if let (Some(balance), Some(currency)) = (self.balance, &self.currency) {
            lines.push(format!("Balance: {:.2} {}", balance, currency));
        }
        if let (Some(equity), Some(currency)) = (self.equity, &self.currency) {
            lines.push(format!("Equity: {:.2} {}", equity, currency));
        }
        if let Some(error) = &self.last_error {
            lines.push(format!("Last error: {}", error));
        }
        lines.join("\n")
    }
}

/// 交易桥通用接口trait，真实账户和模拟器都实现它
#[async_trait]
pub trait TradeBridge: Send + Sync {
    /// 开仓；券商拒单返回 `Ok(Rejected)`，连接失败返回 `Err`
    async fn open_position(&self, request: &OrderRequest) -> Result<OrderOutcome>;

    /// 修改止损（保本用）
    async fn move_stop_loss(&self, ticket: &OrderTicket, stop_loss: f64) -> Result<()>;

    /// 获取报价，品种为信号品种
    async fn quote(&self, symbol: &str) -> Result<Quote>;

    async fn status(&self) -> BridgeStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(mode: ExecutionMode) -> OrderTicket {
        OrderTicket {
            order_id: "42".into(),
            position_id: None,
            symbol: "NAS100".into(),
            side: Side::Long,
            mode,
            volume: 0.01,
            open_price: Some(15000.0),
            opened_at: Utc::now(),
        }
    }

    #[test]
    fn describe_makes_simulated_fills_explicit() {
        let live = OrderOutcome::Filled(ticket(ExecutionMode::Live)).describe();
        let sim = OrderOutcome::Filled(ticket(ExecutionMode::Simulated)).describe();
        assert!(live.contains("LIVE"));
        assert!(sim.contains("SIMULATED"));
        assert!(sim.contains("no real order"));

        let rejected = OrderOutcome::Rejected {
            mode: ExecutionMode::Live,
            reason: "market closed".into(),
        };
        assert!(rejected.ticket().is_none());
        assert!(rejected.describe().contains("market closed"));
    }
}
