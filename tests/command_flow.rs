mod common;

use serde_json::{json, Value};
use std::sync::Arc;

use common::{member, FakeDiscord, GUILD};
use fxsignal::commands::{CommandOptions, CommandRouter};
use fxsignal::core::config::BotConfig;
use fxsignal::discord::model::{CommandOptionValue, Interaction};

fn options(values: &[(&str, Value)]) -> Vec<CommandOptionValue> {
    values
        .iter()
        .map(|(name, value)| CommandOptionValue {
            name: name.to_string(),
            kind: 3,
            value: Some(value.clone()),
            focused: false,
            options: Vec::new(),
        })
        .collect()
}

fn quiet_config() -> BotConfig {
    let mut config = BotConfig::default();
    config.monitor.poll_interval_secs = 3600;
    config.monitor.allow_simulated_prices = true;
    config
}

#[tokio::test]
async fn entry_fans_out_and_reports_each_destination() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _sim) = common::context(Arc::clone(&api), quiet_config(), &dir).await;
    let router = CommandRouter::new(ctx.clone());

    let raw = options(&[
        ("entry_type", json!("Buy limit")),
        ("pair", json!("GBPUSD")),
        ("price", json!(1.25)),
        ("channels", json!("signals, <#2>, lounge, 4, nowhere, #signals")),
        ("roles", json!("VIP, everyone")),
    ]);
    let reply = router
        .execute("entry", GUILD, &CommandOptions::new(&raw))
        .await
        .unwrap();

    assert!(reply.contains("✅ Signal sent to: signals, vip-signals"), "{}", reply);
    assert!(reply.contains("❌ #lounge: not a text channel"), "{}", reply);
    assert!(reply.contains("❌ #locked: no permission"), "{}", reply);
    assert!(reply.contains("❌ #nowhere: not found"), "{}", reply);
    assert!(reply.contains("Tracking TP/SL as signal #1"), "{}", reply);

    let posted = api.sent_to(1);
    assert_eq!(posted.len(), 1, "duplicate channel must be sent once");
    let message = &posted[0];
    assert!(message.contains("**Trade Signal For: GBPUSD**"));
    assert!(message.contains("Entry Price: $1.2500"));
    assert!(message.contains("TP1: $1.2520"));
    assert!(message.contains("TP2: $1.2550"));
    assert!(message.contains("TP3: $1.2600"));
    assert!(message.contains("Stop Loss: $1.2430"));
    assert!(message.ends_with("<@&77> @everyone"));
    assert_eq!(api.sent_to(2).len(), 1);

    let tracked = ctx.signals.snapshot().await;
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].channel_ids, vec![1, 2]);
}

#[tokio::test]
async fn entry_with_trade_reports_simulated_fill() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _sim) = common::context(Arc::clone(&api), quiet_config(), &dir).await;
    let router = CommandRouter::new(ctx.clone());

    let raw = options(&[
        ("entry_type", json!("Sell execution")),
        ("pair", json!("XAUUSD")),
        ("price", json!(2000.0)),
        ("channels", json!("signals")),
        ("roles", json!("")),
        ("trade", json!(true)),
    ]);
    let reply = router
        .execute("entry", GUILD, &CommandOptions::new(&raw))
        .await
        .unwrap();

    assert!(reply.contains("SIMULATED fill only"), "{}", reply);
    assert!(api.sent_to(1)[0].contains("Stop Loss: $2007.00"));

    let tracked = ctx.signals.snapshot().await;
    let ticket = tracked[0].order.as_ref().expect("ticket recorded");
    assert!(ticket.order_id.starts_with("SIM-"));
}

#[tokio::test]
async fn nothing_delivered_means_nothing_tracked() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _sim) = common::context(Arc::clone(&api), quiet_config(), &dir).await;
    let router = CommandRouter::new(ctx.clone());

    let raw = options(&[
        ("entry_type", json!("Buy execution")),
        ("pair", json!("EURUSD")),
        ("price", json!(1.085)),
        ("channels", json!("nowhere")),
        ("roles", json!("everyone")),
        ("trade", json!(true)),
    ]);
    let reply = router
        .execute("entry", GUILD, &CommandOptions::new(&raw))
        .await
        .unwrap();

    assert!(reply.starts_with("❌ No valid channels found or no messages sent."));
    assert!(ctx.signals.is_empty().await);
    assert!(api.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn entry_without_live_feed_is_not_tracked() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let mut config = BotConfig::default();
    config.monitor.poll_interval_secs = 3600;
    let (ctx, _sim) = common::context(Arc::clone(&api), config, &dir).await;
    let router = CommandRouter::new(ctx.clone());

    let raw = options(&[
        ("entry_type", json!("Buy limit")),
        ("pair", json!("GBPUSD")),
        ("price", json!(1.25)),
        ("channels", json!("signals")),
        ("roles", json!("")),
    ]);
    for _ in 0..3 {
        let reply = router
            .execute("entry", GUILD, &CommandOptions::new(&raw))
            .await
            .unwrap();
        assert!(reply.contains("Not tracked: no live price feed"), "{}", reply);
        assert!(!reply.contains("Tracking TP/SL"), "{}", reply);
    }
    assert_eq!(api.sent_to(1).len(), 3);
    assert!(ctx.signals.is_empty().await);
    assert!(!ctx.monitor.is_running());

    let stats = options(&[
        ("date_range", json!("this week")),
        ("total_signals", json!(3)),
        ("tp1_hits", json!(0)),
        ("tp2_hits", json!(0)),
        ("tp3_hits", json!(0)),
        ("sl_hits", json!(0)),
        ("channels", json!("vip-signals")),
    ]);
    router
        .execute("stats", GUILD, &CommandOptions::new(&stats))
        .await
        .unwrap();
    assert!(api.sent_to(2)[0].contains("Currently Open: **0**"));
}

#[tokio::test]
async fn interaction_is_deferred_then_edited() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _sim) = common::context(Arc::clone(&api), quiet_config(), &dir).await;
    let router = CommandRouter::new(ctx);

    let interaction: Interaction = serde_json::from_value(json!({
        "id": "10", "application_id": "20", "type": 2, "token": "tok",
        "guild_id": GUILD.to_string(),
        "data": {"name": "entry", "options": [
            {"name": "entry_type", "type": 3, "value": "Buy limit"},
            {"name": "pair", "type": 3, "value": "EURUSD"},
            {"name": "price", "type": 10, "value": -1.0},
            {"name": "channels", "type": 3, "value": "signals"},
            {"name": "roles", "type": 3, "value": "everyone"}
        ]}
    }))
    .unwrap();
    router.handle(&interaction).await.unwrap();

    let responses = api.responses.lock().unwrap().clone();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].kind, 5);

    let edits = api.edits.lock().unwrap().clone();
    assert_eq!(edits, vec!["❌ Invalid `price`: must be a positive number".to_string()]);
    assert!(api.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn autocomplete_answers_with_choices() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _sim) = common::context(Arc::clone(&api), quiet_config(), &dir).await;
    let router = CommandRouter::new(ctx);

    let interaction: Interaction = serde_json::from_value(json!({
        "id": "11", "application_id": "20", "type": 4, "token": "tok",
        "guild_id": GUILD.to_string(),
        "data": {"name": "entry", "options": [
            {"name": "pair", "type": 3, "value": "xau", "focused": true}
        ]}
    }))
    .unwrap();
    router.handle(&interaction).await.unwrap();

    let responses = api.responses.lock().unwrap().clone();
    let choices = responses[0]
        .data
        .as_ref()
        .and_then(|d| d.choices.clone())
        .unwrap();
    assert_eq!(choices.len(), 1);
    assert_eq!(choices[0].name, "XAUUSD");
}

#[tokio::test]
async fn stats_summary_is_posted_to_channels() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _sim) = common::context(Arc::clone(&api), quiet_config(), &dir).await;
    let router = CommandRouter::new(ctx);

    let raw = options(&[
        ("date_range", json!("1-7 January")),
        ("total_signals", json!(10)),
        ("tp1_hits", json!(6)),
        ("tp2_hits", json!(4)),
        ("tp3_hits", json!(2)),
        ("sl_hits", json!(4)),
        ("channels", json!("vip-signals")),
    ]);
    let reply = router
        .execute("stats", GUILD, &CommandOptions::new(&raw))
        .await
        .unwrap();
    assert!(reply.contains("✅ Statistics sent to: vip-signals"));

    let posted = api.sent_to(2);
    assert!(posted[0].contains("1-7 January"));
    assert!(posted[0].contains("60%"));
    assert!(posted[0].contains("Currently Open: **0**"));
}

#[tokio::test]
async fn bulk_role_respects_presence_and_gates() {
    let mut fake = FakeDiscord::new();
    fake.members = vec![
        member(501, "online-trader", vec![], false),
        member(502, "offline-trader", vec![], false),
        member(503, "already-vip", vec![77], false),
        member(504, "helper-bot", vec![], true),
        member(505, "banned", vec![99], false),
    ];
    let api = Arc::new(fake);
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _sim) = common::context(Arc::clone(&api), quiet_config(), &dir).await;

    let presence: fxsignal::discord::model::PresenceUpdate = serde_json::from_value(json!({
        "user": {"id": "501"}, "guild_id": GUILD.to_string(), "status": "online"
    }))
    .unwrap();
    ctx.presence.update(GUILD, &presence).await;

    let router = CommandRouter::new(ctx);
    let raw = options(&[
        ("role", json!("77")),
        ("filter", json!("both")),
        ("exclude_role", json!("99")),
    ]);
    let reply = router
        .execute("bulk_role", GUILD, &CommandOptions::new(&raw))
        .await
        .unwrap();
    assert!(reply.contains("Added <@&77> to **2** members"), "{}", reply);
    assert_eq!(*api.added_roles.lock().unwrap(), vec![(501, 77), (502, 77)]);

    let raw = options(&[("role", json!("77")), ("filter", json!("online"))]);
    api.added_roles.lock().unwrap().clear();
    router
        .execute("bulk_role", GUILD, &CommandOptions::new(&raw))
        .await
        .unwrap();
    assert_eq!(*api.added_roles.lock().unwrap(), vec![(501, 77)]);
}

#[tokio::test]
async fn trial_role_enable_status_disable() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _sim) = common::context(Arc::clone(&api), quiet_config(), &dir).await;
    let router = CommandRouter::new(ctx.clone());

    let raw = options(&[("action", json!("enable")), ("role", json!("88"))]);
    let reply = router
        .execute("trial_role", GUILD, &CommandOptions::new(&raw))
        .await
        .unwrap();
    assert!(reply.contains("<@&88>"));

    let settings = ctx.roles.store().settings().await;
    assert!(settings.enabled);
    assert_eq!(settings.role_id, Some(88));
    assert_eq!(settings.guild_id, Some(GUILD));

    let raw = options(&[("action", json!("status"))]);
    let status = router
        .execute("trial_role", GUILD, &CommandOptions::new(&raw))
        .await
        .unwrap();
    assert!(status.contains("✅ enabled"));

    let raw = options(&[("action", json!("enable"))]);
    assert!(router
        .execute("trial_role", GUILD, &CommandOptions::new(&raw))
        .await
        .is_err());

    let raw = options(&[("action", json!("disable"))]);
    router
        .execute("trial_role", GUILD, &CommandOptions::new(&raw))
        .await
        .unwrap();
    assert!(!ctx.roles.store().settings().await.enabled);
}

#[tokio::test]
async fn trading_status_and_setup_without_token() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _sim) = common::context(Arc::clone(&api), quiet_config(), &dir).await;
    let router = CommandRouter::new(ctx);

    let raw = options(&[("action", json!("status"))]);
    let status = router
        .execute("trading", GUILD, &CommandOptions::new(&raw))
        .await
        .unwrap();
    assert!(status.contains("SIMULATED"), "{}", status);

    let raw = options(&[("action", json!("setup")), ("account_id", json!("acc-1"))]);
    let err = router
        .execute("trading", GUILD, &CommandOptions::new(&raw))
        .await
        .unwrap_err();
    assert!(err.user_friendly_message().contains("METAAPI_TOKEN"));
}
