//! 频道消息文本

use crate::signals::levels::FormattedLevels;
use crate::signals::store::Signal;

/// 信号主消息，`mentions` 为空时不追加提及行
pub fn signal_message(
    pair: &str,
    entry_type: &str,
    levels: &FormattedLevels,
    mentions: &str,
) -> String {
    let mut message = format!(
        "**Trade Signal For: {pair}**\n\
         Entry Type: {entry_type}\n\
         Entry Price: {entry}\n\
         \n\
         **Take Profit Levels:**\n\
         TP1: {tp1}\n\
         TP2: {tp2}\n\
         TP3: {tp3}\n\
         \n\
         Stop Loss: {sl}",
        pair = pair,
        entry_type = entry_type,
        entry = levels.entry,
        tp1 = levels.tp1,
        tp2 = levels.tp2,
        tp3 = levels.tp3,
        sl = levels.sl,
    );

    if !mentions.trim().is_empty() {
        message.push_str("\n\n");
        message.push_str(mentions);
    }
    message
}

/// TP2 后保本止损的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakeven {
    Moved,
    Failed,
    /// 没有关联订单，只能提示跟单者自行调整
    NoOrder,
}

pub fn tp_hit_message(
    signal: &Signal,
    level: u8,
    price: f64,
    breakeven: Option<Breakeven>,
) -> String {
    let target = match level {
        1 => signal.tp1,
        2 => signal.tp2,
        _ => signal.tp3,
    };
    let mut message = format!(
        "✅ **TP{level} HIT: {pair}**\n{side} from {entry}, TP{level} {target} reached at {price}",
        level = level,
        pair = signal.instrument,
        side = signal.side.as_str(),
        entry = signal.format(signal.entry),
        target = signal.format(target),
        price = signal.format(price),
    );
    match breakeven {
        Some(Breakeven::Moved) => message.push_str("\nStop loss moved to breakeven."),
        Some(Breakeven::Failed) => message
            .push_str("\n⚠️ Could not move the stop loss to breakeven, please adjust it manually."),
        Some(Breakeven::NoOrder) => {
            message.push_str("\nConsider moving your stop loss to breakeven.")
        }
        None => {}
    }
    if level == 3 {
        message.push_str("\nAll targets hit, trade closed.");
    }
    message
}

pub fn sl_hit_message(signal: &Signal, price: f64) -> String {
    format!(
        "🛑 **SL HIT: {pair}**\n{side} from {entry}, stop loss {sl} reached at {price}",
        pair = signal.instrument,
        side = signal.side.as_str(),
        entry = signal.format(signal.entry),
        sl = signal.format(signal.sl),
        price = signal.format(price),
    )
}
