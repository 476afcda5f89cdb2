//! 模拟交易桥：没有真实账户时生成模拟成交和报价

use async_trait::async_trait;
use chrono::Utc;
use log::info;
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::bridge::{BridgeStatus, OrderOutcome, OrderRequest, OrderTicket, TradeBridge};
use crate::core::error::{BotError, Result};
use crate::core::types::{ExecutionMode, OrderKind, Quote, Side};
use crate::signals::instruments;

/// 报价随机波动幅度 ±0.1%
const JITTER: f64 = 0.001;
/// 固定点差（pip）
const SPREAD_PIPS: f64 = 2.0;

fn default_base_prices() -> HashMap<String, f64> {
    [
        ("XAUUSD", 2000.0),
        ("EURUSD", 1.0850),
        ("GBPUSD", 1.2650),
        ("USDJPY", 150.00),
        ("GBPJPY", 190.00),
        ("US100", 15000.0),
        ("US500", 4500.0),
        ("BTCUSD", 43000.0),
    ]
    .into_iter()
    .map(|(s, p)| (s.to_string(), p))
    .collect()
}

pub struct SimulatedBridge {
    base_prices: RwLock<HashMap<String, f64>>,
    /// order_id -> 当前止损
    positions: RwLock<HashMap<String, f64>>,
    jitter: bool,
}

impl Default for SimulatedBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBridge {
    pub fn new() -> Self {
        Self {
            base_prices: RwLock::new(default_base_prices()),
            positions: RwLock::new(HashMap::new()),
            jitter: true,
        }
    }

    /// 固定报价，测试用
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    pub async fn set_base_price(&self, symbol: &str, price: f64) {
        self.base_prices
            .write()
            .await
            .insert(symbol.to_string(), price);
    }

    pub async fn stop_loss_of(&self, order_id: &str) -> Option<f64> {
        self.positions.read().await.get(order_id).copied()
    }

    async fn mid_price(&self, symbol: &str) -> f64 {
        let base = self
            .base_prices
            .read()
            .await
            .get(symbol)
            .copied()
            .unwrap_or(1.0);
        if self.jitter {
            base * (1.0 + rand::thread_rng().gen_range(-JITTER..=JITTER))
        } else {
            base
        }
    }

    fn ticket_id() -> String {
        let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
        format!("SIM-{}-{}", Utc::now().timestamp_millis(), suffix)
    }
}

#[async_trait]
impl TradeBridge for SimulatedBridge {
    async fn open_position(&self, request: &OrderRequest) -> Result<OrderOutcome> {
        if !(request.volume > 0.0) {
            return Ok(OrderOutcome::Rejected {
                mode: ExecutionMode::Simulated,
                reason: "volume must be positive".to_string(),
            });
        }

        let open_price = match request.kind {
            OrderKind::Limit(price) => price,
            OrderKind::Market => {
                let quote = self.quote(&request.symbol).await?;
                match request.side {
                    Side::Long => quote.ask,
                    Side::Short => quote.bid,
                }
            }
        };

        let order_id = Self::ticket_id();
        self.positions
            .write()
            .await
            .insert(order_id.clone(), request.stop_loss);

        info!(
            "🧪 模拟成交: {} {} {} 手 @ {} (ticket {})",
            request.side.as_str(),
            request.symbol,
            request.volume,
            open_price,
            order_id
        );

        Ok(OrderOutcome::Filled(OrderTicket {
            position_id: Some(order_id.clone()),
            order_id,
            symbol: request.symbol.clone(),
            side: request.side,
            mode: ExecutionMode::Simulated,
            volume: request.volume,
            open_price: Some(open_price),
            opened_at: Utc::now(),
        }))
    }

    async fn move_stop_loss(&self, ticket: &OrderTicket, stop_loss: f64) -> Result<()> {
        let mut positions = self.positions.write().await;
        match positions.get_mut(&ticket.order_id) {
            Some(sl) => {
                *sl = stop_loss;
                info!("🧪 模拟止损移动: {} -> {}", ticket.order_id, stop_loss);
                Ok(())
            }
            None => Err(BotError::NotFound(format!(
                "simulated ticket {}",
                ticket.order_id
            ))),
        }
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let mid = self.mid_price(symbol).await;
        let (_, pip) = instruments::precision_for(symbol);
        let half_spread = SPREAD_PIPS * pip / 2.0;
        Ok(Quote {
            symbol: symbol.to_string(),
            bid: mid - half_spread,
            ask: mid + half_spread,
            source: ExecutionMode::Simulated,
            timestamp: Utc::now(),
        })
    }

    async fn status(&self) -> BridgeStatus {
        BridgeStatus {
            mode: Some(ExecutionMode::Simulated),
            connected: true,
            ..Default::default()
        }
    }
}
