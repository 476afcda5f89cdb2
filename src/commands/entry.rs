//! `/entry`：计算价位、发送信号、可选同步下单并加入监控

use log::{info, warn};

use crate::bot::BotContext;
use crate::bridge::{OrderRequest, TradeBridge};
use crate::commands::options::CommandOptions;
use crate::core::error::{BotError, Result};
use crate::core::types::OrderKind;
use crate::discord::model::CommandChoice;
use crate::discord::Snowflake;
use crate::signals::{calculate_levels, format, instruments, Signal};

pub const ENTRY_TYPES: [&str; 4] = ["Buy limit", "Sell limit", "Buy execution", "Sell execution"];

/// 自定义品种的取值
pub const OTHER_PAIR: &str = "other";
const MAX_DECIMALS: i64 = 8;
/// Discord 自动补全最多 25 项
const MAX_CHOICES: usize = 25;

#[derive(Debug, Clone, PartialEq)]
pub struct EntryArgs {
    pub entry_type: String,
    pub pair: String,
    pub price: f64,
    pub channels: String,
    pub roles: String,
    pub decimals: Option<usize>,
    pub trade: bool,
}

impl EntryArgs {
    pub fn parse(opts: &CommandOptions<'_>) -> Result<Self> {
        let entry_type = opts.required_string("entry_type")?;
        let pair_option = opts.required_string("pair")?;
        let price = opts.required_number("price")?;
        let channels = opts.required_string("channels")?;
        let roles = opts.string("roles").unwrap_or_default();

        if !price.is_finite() || price <= 0.0 {
            return Err(BotError::validation("price", "must be a positive number"));
        }

        let (pair, decimals) = if pair_option.eq_ignore_ascii_case(OTHER_PAIR) {
            let custom = opts.string("custom_pair").ok_or_else(|| {
                BotError::validation("custom_pair", "is required when pair is Other")
            })?;
            let decimals = opts
                .integer("decimals")?
                .ok_or_else(|| BotError::validation("decimals", "is required when pair is Other"))?;
            if !(0..=MAX_DECIMALS).contains(&decimals) {
                return Err(BotError::validation(
                    "decimals",
                    format!("must be between 0 and {}", MAX_DECIMALS),
                ));
            }
            (custom.to_uppercase(), Some(decimals as usize))
        } else {
            (pair_option, None)
        };

        Ok(Self {
            entry_type,
            pair,
            price,
            channels,
            roles,
            decimals,
            trade: opts.boolean("trade"),
        })
    }
}

pub async fn handle(
    ctx: &BotContext,
    guild_id: Snowflake,
    opts: &CommandOptions<'_>,
) -> Result<String> {
    let args = EntryArgs::parse(opts)?;
    let levels = calculate_levels(args.price, &args.pair, &args.entry_type, args.decimals);
    let formatted = levels.formatted();

    let mentions = ctx.dispatcher.mentions(guild_id, &args.roles).await;
    let message = format::signal_message(&args.pair, &args.entry_type, &formatted, &mentions);
    let report = ctx.dispatcher.broadcast(guild_id, &args.channels, &message).await;

    let mut reply = vec![report.summary("Signal")];
    if report.delivered.is_empty() {
        return Ok(reply.join("\n"));
    }
    info!(
        "📨 信号已发送: {} {} @ {} -> {} 个频道",
        args.entry_type,
        args.pair,
        formatted.entry,
        report.delivered.len()
    );

    let mut ticket = None;
    if args.trade {
        if ctx.bridge.settings().enabled {
            let request = OrderRequest {
                symbol: args.pair.clone(),
                side: levels.side,
                kind: OrderKind::from_entry_type(&args.entry_type, args.price),
                volume: ctx.bridge.settings().lot_size,
                stop_loss: levels.sl,
                take_profit: levels.tp3,
                comment: format!("signal {}", args.pair),
            };
            match ctx.bridge.open_position(&request).await {
                Ok(outcome) => {
                    reply.push(outcome.describe());
                    ticket = outcome.ticket().cloned();
                }
                Err(e) => {
                    warn!("❌ 下单失败: {}", e);
                    reply.push(format!("🔴 Order failed: {}", e.user_friendly_message()));
                }
            }
        } else {
            reply.push("⚠️ Trading bridge is disabled, no order was placed.".to_string());
        }
    }

    if !ctx.config.monitor.enabled {
        return Ok(reply.join("\n"));
    }
    // 只有模拟报价时信号永远不会触发，不加入监控
    if !ctx.bridge.has_live().await && !ctx.config.monitor.allow_simulated_prices {
        info!("信号 {} 未加入监控: 没有实时报价源", args.pair);
        reply.push("⚠️ Not tracked: no live price feed, TP/SL follow-ups are off.".to_string());
    } else {
        let signal = Signal::new(
            &args.pair,
            &args.entry_type,
            &levels,
            report.channel_ids(),
            ticket,
        );
        let id = ctx.signals.insert(signal).await;
        ctx.monitor.ensure_running();
        reply.push(format!("📡 Tracking TP/SL as signal #{}", id));
    }

    Ok(reply.join("\n"))
}

fn filter_choices<'a>(
    values: impl Iterator<Item = (&'a str, &'a str)>,
    current: &str,
) -> Vec<CommandChoice> {
    let needle = current.to_lowercase();
    values
        .filter(|(name, _)| name.to_lowercase().contains(&needle))
        .take(MAX_CHOICES)
        .map(|(name, value)| CommandChoice::string(name, value))
        .collect()
}

pub fn autocomplete(option: &str, current: &str) -> Vec<CommandChoice> {
    match option {
        "entry_type" => filter_choices(ENTRY_TYPES.iter().map(|t| (*t, *t)), current),
        "pair" => filter_choices(
            instruments::all()
                .iter()
                .map(|s| (s.symbol, s.symbol))
                .chain(std::iter::once(("Other", OTHER_PAIR))),
            current,
        ),
        _ => Vec::new(),
    }
}
