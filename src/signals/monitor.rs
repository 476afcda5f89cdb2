//! TP/SL 监控循环
//!
//! 每个轮询周期对所有活跃信号取一次报价：先判断SL，再按 TP1 → TP2 → TP3 顺序判断。
//! SL或TP3触发后信号立即从存储中移除，之后不会再产生任何事件。

use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::TradeBridge;
use crate::core::config::MonitorConfig;
use crate::core::types::{ExecutionMode, Side};
use crate::signals::dispatcher::SignalDispatcher;
use crate::signals::format::{self, Breakeven};
use crate::signals::store::{Signal, SignalId, SignalStore};

/// 价位触发事件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalEvent {
    TpHit { level: u8, price: f64 },
    SlHit { price: f64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub events: Vec<SignalEvent>,
    /// 到达终态（TP3或SL）
    pub closed: bool,
}

fn crossed_tp(side: Side, price: f64, level: f64) -> bool {
    match side {
        Side::Long => price >= level,
        Side::Short => price <= level,
    }
}

fn crossed_sl(side: Side, price: f64, sl: f64) -> bool {
    match side {
        Side::Long => price <= sl,
        Side::Short => price >= sl,
    }
}

/// 用一个价格推进信号状态，不做任何IO
pub fn evaluate(signal: &mut Signal, price: f64) -> Evaluation {
    let mut evaluation = Evaluation::default();
    if signal.tp3_hit {
        evaluation.closed = true;
        return evaluation;
    }

    if crossed_sl(signal.side, price, signal.sl) {
        evaluation.events.push(SignalEvent::SlHit { price });
        evaluation.closed = true;
        return evaluation;
    }

    let levels = [
        (1u8, signal.tp1, signal.tp1_hit),
        (2, signal.tp2, signal.tp2_hit),
        (3, signal.tp3, signal.tp3_hit),
    ];
    for (level, target, hit) in levels {
        if hit || !crossed_tp(signal.side, price, target) {
            continue;
        }
        match level {
            1 => signal.tp1_hit = true,
            2 => signal.tp2_hit = true,
            _ => {
                signal.tp3_hit = true;
                evaluation.closed = true;
            }
        }
        evaluation.events.push(SignalEvent::TpHit { level, price });
    }
    evaluation
}

/// 单实例监控循环，存储为空时自动退出
pub struct SignalMonitor {
    store: Arc<SignalStore>,
    bridge: Arc<dyn TradeBridge>,
    dispatcher: Arc<SignalDispatcher>,
    settings: MonitorConfig,
    running: AtomicBool,
}

impl SignalMonitor {
    pub fn new(
        store: Arc<SignalStore>,
        bridge: Arc<dyn TradeBridge>,
        dispatcher: Arc<SignalDispatcher>,
        settings: MonitorConfig,
    ) -> Self {
        Self {
            store,
            bridge,
            dispatcher,
            settings,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 未运行时启动循环，返回是否新启动了一个实例
    pub fn ensure_running(self: &Arc<Self>) -> bool {
        if !self.settings.enabled {
            return false;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            monitor.run().await;
        });
        true
    }

    async fn run(self: Arc<Self>) {
        info!(
            "🔄 信号监控启动, 轮询间隔 {} 秒",
            self.settings.poll_interval_secs
        );
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.settings.poll_interval_secs));

        loop {
            ticker.tick().await;
            if self.store.is_empty().await {
                break;
            }
            let events = self.poll_once().await;
            if !events.is_empty() {
                debug!("本轮触发 {} 个事件", events.len());
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("⏹️ 没有活跃信号，监控停止");

        // 退出与新信号插入之间的竞态
        if !self.store.is_empty().await {
            self.ensure_running();
        }
    }

    /// 执行一轮检查，返回触发的事件
    pub async fn poll_once(&self) -> Vec<(SignalId, SignalEvent)> {
        let mut fired = Vec::new();

        for signal in self.store.snapshot().await {
            let quote = match self.bridge.quote(&signal.instrument).await {
                Ok(quote) => quote,
                Err(e) => {
                    debug!("⚠️ 获取 {} 报价失败，本轮跳过: {}", signal.instrument, e);
                    continue;
                }
            };
            if quote.source == ExecutionMode::Simulated && !self.settings.allow_simulated_prices {
                debug!("跳过 {} 的模拟报价", signal.instrument);
                continue;
            }

            let price = quote.exit_price(signal.side);
            let mut updated = signal.clone();
            let evaluation = evaluate(&mut updated, price);
            if evaluation.events.is_empty() {
                continue;
            }

            if evaluation.closed {
                // 已被其它路径移除则不再发送
                if self.store.remove(signal.id).await.is_none() {
                    continue;
                }
            } else {
                self.store.update(updated.clone()).await;
            }

            for event in evaluation.events {
                self.announce(&updated, event).await;
                fired.push((signal.id, event));
            }
        }
        fired
    }

    async fn announce(&self, signal: &Signal, event: SignalEvent) {
        let message = match event {
            SignalEvent::TpHit { level, price } => {
                info!(
                    "🎯 信号 #{} {} TP{} 触发 @ {}",
                    signal.id, signal.instrument, level, price
                );
                let breakeven = if level == 2 {
                    Some(self.move_to_breakeven(signal).await)
                } else {
                    None
                };
                format::tp_hit_message(signal, level, price, breakeven)
            }
            SignalEvent::SlHit { price } => {
                info!("🛑 信号 #{} {} SL触发 @ {}", signal.id, signal.instrument, price);
                format::sl_hit_message(signal, price)
            }
        };

        let report = self
            .dispatcher
            .post_to_ids(&signal.channel_ids, &message)
            .await;
        for failure in &report.failed {
            warn!("⚠️ 跟进消息发送失败 {}: {}", failure.target, failure.reason);
        }
    }

    /// TP2后把止损移到入场价，失败只记录日志
    async fn move_to_breakeven(&self, signal: &Signal) -> Breakeven {
        let Some(ticket) = &signal.order else {
            return Breakeven::NoOrder;
        };
        match self.bridge.move_stop_loss(ticket, signal.entry).await {
            Ok(()) => {
                info!(
                    "✅ 信号 #{} 止损移至保本 ({} {})",
                    signal.id,
                    ticket.mode.label(),
                    ticket.order_id
                );
                Breakeven::Moved
            }
            Err(e) => {
                error!("❌ 信号 #{} 移动止损失败: {}", signal.id, e);
                Breakeven::Failed
            }
        }
    }
}
