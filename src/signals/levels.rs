//! 止盈止损价位计算

use crate::core::types::Side;
use crate::signals::instruments;

pub const TP1_PIPS: f64 = 20.0;
pub const TP2_PIPS: f64 = 50.0;
pub const TP3_PIPS: f64 = 100.0;
pub const SL_PIPS: f64 = 70.0;

/// 计算出的价位（原始数值）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub side: Side,
    pub decimals: usize,
    pub entry: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
    pub sl: f64,
}

/// 带货币符号的展示文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedLevels {
    pub entry: String,
    pub tp1: String,
    pub tp2: String,
    pub tp3: String,
    pub sl: String,
}

impl Levels {
    pub fn format(&self, price: f64) -> String {
        format_price(price, self.decimals)
    }

    pub fn formatted(&self) -> FormattedLevels {
        FormattedLevels {
            entry: self.format(self.entry),
            tp1: self.format(self.tp1),
            tp2: self.format(self.tp2),
            tp3: self.format(self.tp3),
            sl: self.format(self.sl),
        }
    }
}

pub fn format_price(price: f64, decimals: usize) -> String {
    format!("${:.*}", decimals, price)
}

/// 根据入场价、品种和入场类型计算 TP1/TP2/TP3/SL
///
/// `decimals_override` 用于自定义品种，只影响显示精度，pip仍按查表/默认值。
pub fn calculate_levels(
    entry: f64,
    symbol: &str,
    entry_type: &str,
    decimals_override: Option<usize>,
) -> Levels {
    let (table_decimals, pip) = instruments::precision_for(symbol);
    let decimals = decimals_override.unwrap_or(table_decimals);
    let side = Side::from_entry_type(entry_type);

    // 多单：TP在上、SL在下；空单反之
    let dir = if side.is_long() { 1.0 } else { -1.0 };

    Levels {
        side,
        decimals,
        entry,
        tp1: entry + dir * TP1_PIPS * pip,
        tp2: entry + dir * TP2_PIPS * pip,
        tp3: entry + dir * TP3_PIPS * pip,
        sl: entry - dir * SL_PIPS * pip,
    }
}
