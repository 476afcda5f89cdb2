//! 品种精度配置表

/// 单个品种的精度与点值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentSpec {
    pub symbol: &'static str,
    /// 价格显示的小数位
    pub decimals: usize,
    /// 1 pip 对应的价格变动
    pub pip_size: f64,
}

/// 未知品种的默认精度
pub const DEFAULT_DECIMALS: usize = 4;
pub const DEFAULT_PIP_SIZE: f64 = 0.0001;

const fn spec(symbol: &'static str, decimals: usize, pip_size: f64) -> InstrumentSpec {
    InstrumentSpec {
        symbol,
        decimals,
        pip_size,
    }
}

/// 按货币分组排列，顺序即自动补全的展示顺序
static INSTRUMENTS: [InstrumentSpec; 23] = [
    // USD
    spec("EURUSD", 4, 0.0001),
    spec("GBPUSD", 4, 0.0001),
    spec("AUDUSD", 5, 0.00001),
    spec("NZDUSD", 5, 0.00001),
    spec("USDCAD", 4, 0.0001),
    spec("USDCHF", 4, 0.0001),
    spec("XAUUSD", 2, 0.1),
    spec("BTCUSD", 1, 1.0),
    // JPY
    spec("USDJPY", 3, 0.01),
    spec("GBPJPY", 3, 0.01),
    spec("CHFJPY", 3, 0.01),
    spec("CADJPY", 3, 0.01),
    spec("AUDJPY", 3, 0.01),
    // CHF
    spec("GBPCHF", 4, 0.0001),
    spec("CADCHF", 4, 0.0001),
    spec("AUDCHF", 4, 0.0001),
    // CAD
    spec("GBPCAD", 4, 0.0001),
    spec("EURCAD", 4, 0.0001),
    spec("AUDCAD", 4, 0.0001),
    // 交叉盘
    spec("AUDNZD", 4, 0.0001),
    // 指数
    spec("US100", 1, 1.0),
    spec("US500", 2, 0.1),
    spec("GER40", 1, 1.0),
];

/// 精确匹配（区分大小写）
pub fn lookup(symbol: &str) -> Option<&'static InstrumentSpec> {
    INSTRUMENTS.iter().find(|s| s.symbol == symbol)
}

/// 返回 (小数位, pip)，未知品种使用默认值
pub fn precision_for(symbol: &str) -> (usize, f64) {
    lookup(symbol)
        .map(|s| (s.decimals, s.pip_size))
        .unwrap_or((DEFAULT_DECIMALS, DEFAULT_PIP_SIZE))
}

pub fn all() -> &'static [InstrumentSpec] {
    &INSTRUMENTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_sensitive() {
        assert_eq!(lookup("XAUUSD").map(|s| s.decimals), Some(2));
        assert!(lookup("xauusd").is_none());
        assert_eq!(precision_for("xauusd"), (4, 0.0001));
    }

    #[test]
    fn symbols_are_unique() {
        let mut symbols: Vec<_> = all().iter().map(|s| s.symbol).collect();
        symbols.sort();
        symbols.dedup();
        assert_eq!(symbols.len(), all().len());
    }
}
