//! `/stats` 统计汇总

#[derive(Debug, Clone, PartialEq)]
pub struct StatsInput {
    pub date_range: String,
    pub total_signals: u64,
    pub tp1_hits: u64,
    pub tp2_hits: u64,
    pub tp3_hits: u64,
    pub sl_hits: u64,
    pub currently_open: String,
    /// 缺省为 tp1_hits + sl_hits
    pub total_closed: Option<u64>,
}

impl StatsInput {
    pub fn total_closed(&self) -> u64 {
        self.total_closed.unwrap_or(self.tp1_hits + self.sl_hits)
    }
}

/// 四舍五入到整数百分比，总数为0时为 "0%"
pub fn percent(hits: u64, total: u64) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{:.0}%", hits as f64 / total as f64 * 100.0)
}

pub fn format_stats_message(input: &StatsInput) -> String {
    let total_closed = input.total_closed();
    let rule = "━".repeat(40);

    format!(
        "**:bar_chart: TRADING SIGNAL STATISTICS**\n\
         {rule}\n\
         **:date: Period:** {period}\n\
         \n\
         **:chart_with_upwards_trend: SIGNAL OVERVIEW**\n\
         • Total Signals Sent: **{total}**\n\
         • Total Closed Positions: **{closed}**\n\
         • Currently Open: **{open}**\n\
         \n\
         **:dart: TAKE PROFIT PERFORMANCE**\n\
         • TP1 Hits: **{tp1}**\n\
         • TP2 Hits: **{tp2}**\n\
         • TP3 Hits: **{tp3}**\n\
         \n\
         **:octagonal_sign: STOP LOSS**\n\
         • SL Hits: **{sl}** ({sl_pct})\n\
         \n\
         **:bar_chart: PERFORMANCE SUMMARY**\n\
         • **Win Rate:** {win_rate}\n\
         {rule}",
        rule = rule,
        period = input.date_range,
        total = input.total_signals,
        closed = total_closed,
        open = input.currently_open,
        tp1 = input.tp1_hits,
        tp2 = input.tp2_hits,
        tp3 = input.tp3_hits,
        sl = input.sl_hits,
        sl_pct = percent(input.sl_hits, total_closed),
        win_rate = percent(input.tp1_hits, total_closed),
    )
}
