//! 活跃信号存储

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::bridge::OrderTicket;
use crate::core::types::Side;
use crate::discord::Snowflake;
use crate::signals::levels::{format_price, Levels};

pub type SignalId = u64;

/// 一条被跟踪的交易信号
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub instrument: String,
    pub side: Side,
    pub entry_type: String,
    pub entry: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
    pub sl: f64,
    pub decimals: usize,
    /// 实际送达的频道，跟进消息回复到这些频道
    pub channel_ids: Vec<Snowflake>,
    pub tp1_hit: bool,
    pub tp2_hit: bool,
    pub tp3_hit: bool,
    pub order: Option<OrderTicket>,
    pub created_at: DateTime<Utc>,
}

impl Signal {
    pub fn new(
        instrument: &str,
        entry_type: &str,
        levels: &Levels,
        channel_ids: Vec<Snowflake>,
        order: Option<OrderTicket>,
    ) -> Self {
        Self {
            id: 0,
            instrument: instrument.to_string(),
            side: levels.side,
            entry_type: entry_type.to_string(),
            entry: levels.entry,
            tp1: levels.tp1,
            tp2: levels.tp2,
            tp3: levels.tp3,
            sl: levels.sl,
            decimals: levels.decimals,
            channel_ids,
            tp1_hit: false,
            tp2_hit: false,
            tp3_hit: false,
            order,
            created_at: Utc::now(),
        }
    }

    pub fn format(&self, price: f64) -> String {
        format_price(price, self.decimals)
    }
}

/// 信号存储，由 `BotContext` 持有并注入命令和监控循环
#[derive(Default)]
pub struct SignalStore {
    signals: RwLock<HashMap<SignalId, Signal>>,
    next_id: AtomicU64,
}

impl SignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配ID并保存，返回ID
    pub async fn insert(&self, mut signal: Signal) -> SignalId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        signal.id = id;
        self.signals.write().await.insert(id, signal);
        id
    }

    pub async fn get(&self, id: SignalId) -> Option<Signal> {
        self.signals.read().await.get(&id).cloned()
    }

    pub async fn update(&self, signal: Signal) {
        let mut signals = self.signals.write().await;
        // 已移除的信号不再写回
        if let Some(slot) = signals.get_mut(&signal.id) {
            *slot = signal;
        }
    }

    pub async fn remove(&self, id: SignalId) -> Option<Signal> {
        self.signals.write().await.remove(&id)
    }

    /// 按ID排序的快照
    pub async fn snapshot(&self) -> Vec<Signal> {
        let mut signals: Vec<Signal> = self.signals.read().await.values().cloned().collect();
        signals.sort_by_key(|s| s.id);
        signals
    }

    pub async fn len(&self) -> usize {
        self.signals.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.signals.read().await.is_empty()
    }
}
