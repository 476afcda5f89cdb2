//! `/stats`：汇总数字并发送到指定频道

use log::info;

use crate::bot::BotContext;
use crate::commands::options::CommandOptions;
use crate::core::error::Result;
use crate::discord::Snowflake;
use crate::signals::stats::{format_stats_message, StatsInput};

/// `currently_open` 缺省时使用当前跟踪中的信号数
pub fn parse_input(opts: &CommandOptions<'_>, tracked: usize) -> Result<StatsInput> {
    Ok(StatsInput {
        date_range: opts.required_string("date_range")?,
        total_signals: opts.required_count("total_signals")?,
        tp1_hits: opts.required_count("tp1_hits")?,
        tp2_hits: opts.required_count("tp2_hits")?,
        tp3_hits: opts.required_count("tp3_hits")?,
        sl_hits: opts.required_count("sl_hits")?,
        currently_open: opts
            .string("currently_open")
            .unwrap_or_else(|| tracked.to_string()),
        total_closed: opts.count("total_closed")?,
    })
}

pub async fn handle(
    ctx: &BotContext,
    guild_id: Snowflake,
    opts: &CommandOptions<'_>,
) -> Result<String> {
    let channels = opts.required_string("channels")?;
    let input = parse_input(opts, ctx.signals.len().await)?;
    let message = format_stats_message(&input);

    let report = ctx.dispatcher.broadcast(guild_id, &channels, &message).await;
    info!(
        "📊 统计已发送: {} -> {} 个频道, 失败 {}",
        input.date_range,
        report.delivered.len(),
        report.failed.len()
    );
    Ok(report.summary("Statistics"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::model::CommandOptionValue;
    use serde_json::{json, Value};

    fn opt(name: &str, value: Value) -> CommandOptionValue {
        CommandOptionValue {
            name: name.into(),
            kind: 4,
            value: Some(value),
            focused: false,
            options: Vec::new(),
        }
    }

    fn raw() -> Vec<CommandOptionValue> {
        vec![
            opt("date_range", json!("1-7 Jan")),
            opt("total_signals", json!(10)),
            opt("tp1_hits", json!(6)),
            opt("tp2_hits", json!(4)),
            opt("tp3_hits", json!(2)),
            opt("sl_hits", json!(3)),
        ]
    }

    #[test]
    fn currently_open_defaults_to_tracked_signals() {
        let raw = raw();
        let input = parse_input(&CommandOptions::new(&raw), 2).unwrap();
        assert_eq!(input.currently_open, "2");
        assert_eq!(input.total_closed(), 9);
    }

    #[test]
    fn explicit_values_win() {
        let mut raw = raw();
        raw.push(opt("currently_open", json!("1 (EURUSD)")));
        raw.push(opt("total_closed", json!(12)));
        let input = parse_input(&CommandOptions::new(&raw), 5).unwrap();
        assert_eq!(input.currently_open, "1 (EURUSD)");
        assert_eq!(input.total_closed(), 12);
    }

    #[test]
    fn negative_hits_are_rejected() {
        let mut raw = raw();
        raw[5] = opt("sl_hits", json!(-2));
        assert!(parse_input(&CommandOptions::new(&raw), 0).is_err());
    }
}
