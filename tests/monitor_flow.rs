mod common;

use std::sync::Arc;

use common::FakeDiscord;
use fxsignal::bridge::{OrderRequest, TradeBridge};
use fxsignal::core::config::BotConfig;
use fxsignal::core::types::OrderKind;
use fxsignal::signals::{calculate_levels, Signal, SignalEvent};

fn config(allow_simulated_prices: bool) -> BotConfig {
    let mut config = BotConfig::default();
    config.monitor.allow_simulated_prices = allow_simulated_prices;
    config
}

fn levels_of(events: &[(u64, SignalEvent)]) -> Vec<u8> {
    events
        .iter()
        .map(|(_, e)| match e {
            SignalEvent::TpHit { level, .. } => *level,
            SignalEvent::SlHit { .. } => 0,
        })
        .collect()
}

#[tokio::test]
async fn short_signal_runs_to_tp3_and_moves_stop_to_breakeven() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let (ctx, sim) = common::context(Arc::clone(&api), config(true), &dir).await;

    let levels = calculate_levels(2000.0, "XAUUSD", "Sell execution", None);
    let outcome = ctx
        .bridge
        .open_position(&OrderRequest {
            symbol: "XAUUSD".into(),
            side: levels.side,
            kind: OrderKind::Market,
            volume: 0.01,
            stop_loss: levels.sl,
            take_profit: levels.tp3,
            comment: String::new(),
        })
        .await
        .unwrap();
    let ticket = outcome.ticket().cloned().unwrap();
    let order_id = ticket.order_id.clone();
    let id = ctx
        .signals
        .insert(Signal::new("XAUUSD", "Sell execution", &levels, vec![1], Some(ticket)))
        .await;

    sim.set_base_price("XAUUSD", 1999.0).await;
    assert!(ctx.monitor.poll_once().await.is_empty());

    sim.set_base_price("XAUUSD", 1997.5).await;
    assert_eq!(levels_of(&ctx.monitor.poll_once().await), vec![1]);
    assert!(ctx.signals.get(id).await.unwrap().tp1_hit);

    sim.set_base_price("XAUUSD", 1994.0).await;
    assert_eq!(levels_of(&ctx.monitor.poll_once().await), vec![2]);
    assert_eq!(sim.stop_loss_of(&order_id).await, Some(2000.0));

    sim.set_base_price("XAUUSD", 1989.0).await;
    assert_eq!(levels_of(&ctx.monitor.poll_once().await), vec![3]);
    assert!(ctx.signals.is_empty().await);

    sim.set_base_price("XAUUSD", 2050.0).await;
    assert!(ctx.monitor.poll_once().await.is_empty());

    let follow_ups = api.sent_to(1);
    assert_eq!(follow_ups.len(), 3);
    assert!(follow_ups[0].starts_with("✅ **TP1 HIT: XAUUSD**"));
    assert!(follow_ups[1].contains("Stop loss moved to breakeven."));
    assert!(follow_ups[2].contains("All targets hit, trade closed."));
}

#[tokio::test]
async fn long_signal_stops_out_and_is_forgotten() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let (ctx, sim) = common::context(Arc::clone(&api), config(true), &dir).await;

    let levels = calculate_levels(1.25, "GBPUSD", "Buy limit", None);
    ctx.signals
        .insert(Signal::new("GBPUSD", "Buy limit", &levels, vec![1, 2], None))
        .await;

    sim.set_base_price("GBPUSD", 1.2420).await;
    assert_eq!(levels_of(&ctx.monitor.poll_once().await), vec![0]);
    assert!(ctx.signals.is_empty().await);

    sim.set_base_price("GBPUSD", 1.2700).await;
    assert!(ctx.monitor.poll_once().await.is_empty());

    for channel in [1, 2] {
        let posted = api.sent_to(channel);
        assert_eq!(posted.len(), 1);
        assert!(posted[0].starts_with("🛑 **SL HIT: GBPUSD**"));
    }
}

#[tokio::test]
async fn gap_through_several_targets_fires_in_order() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let (ctx, sim) = common::context(Arc::clone(&api), config(true), &dir).await;

    let levels = calculate_levels(150.0, "USDJPY", "Buy execution", None);
    let id = ctx
        .signals
        .insert(Signal::new("USDJPY", "Buy execution", &levels, vec![2], None))
        .await;

    sim.set_base_price("USDJPY", 150.60).await;
    assert_eq!(levels_of(&ctx.monitor.poll_once().await), vec![1, 2]);

    let signal = ctx.signals.get(id).await.unwrap();
    assert!(signal.tp1_hit && signal.tp2_hit && !signal.tp3_hit);

    // 没有订单时只提示跟单者，不声称已移动止损
    let follow_ups = api.sent_to(2);
    assert_eq!(follow_ups.len(), 2);
    assert!(follow_ups[1].contains("Consider moving your stop loss to breakeven."));
    assert!(!follow_ups[1].contains("Stop loss moved"));
}

#[tokio::test]
async fn simulated_quotes_are_ignored_unless_allowed() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let (ctx, sim) = common::context(Arc::clone(&api), config(false), &dir).await;

    let levels = calculate_levels(1.25, "GBPUSD", "Buy limit", None);
    ctx.signals
        .insert(Signal::new("GBPUSD", "Buy limit", &levels, vec![1], None))
        .await;

    sim.set_base_price("GBPUSD", 1.2000).await;
    assert!(ctx.monitor.poll_once().await.is_empty());
    assert_eq!(ctx.signals.len().await, 1);
    assert!(api.sent.lock().unwrap().is_empty());
}
