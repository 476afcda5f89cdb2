//! 试用角色的生效/到期时间计算
//!
//! 休市窗口：本地时间 周五12:00（含）到 周一00:00（不含）。
//! 窗口内加入的成员从下周一00:00开始计时，其余从加入时刻开始计时。

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveTime, Offset, Timelike, Utc, Weekday,
};

use crate::core::config::TrialRoleConfig;

/// 周五休市开始的小时
const FRIDAY_CLOSE_HOUR: u32 = 12;

/// 一次授予的时间安排
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub activates_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub weekend_delayed: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct WeekendPolicy {
    offset: FixedOffset,
    duration: Duration,
}

impl WeekendPolicy {
    pub fn new(utc_offset_hours: i32, duration_hours: i64) -> Self {
        // 超出范围的偏移按UTC处理，配置校验已限制在 ±14
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or(Utc.fix());
        Self {
            offset,
            duration: Duration::hours(duration_hours),
        }
    }

    pub fn from_config(config: &TrialRoleConfig) -> Self {
        Self::new(config.utc_offset_hours, config.duration_hours)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_market_closed(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.offset);
        match local.weekday() {
            Weekday::Fri => local.hour() >= FRIDAY_CLOSE_HOUR,
            Weekday::Sat | Weekday::Sun => true,
            _ => false,
        }
    }

    /// `at` 之后（不含当天）的下一个本地周一 00:00
    pub fn next_monday(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let local_date = at.with_timezone(&self.offset).date_naive();
        let from_monday = local_date.weekday().num_days_from_monday() as i64;
        let days_ahead = 7 - from_monday;
        let monday = local_date + Duration::days(days_ahead);
        let local_midnight = monday.and_time(NaiveTime::MIN);
        (local_midnight - Duration::seconds(self.offset.local_minus_utc() as i64)).and_utc()
    }

    pub fn schedule(&self, granted_at: DateTime<Utc>) -> Schedule {
        let weekend_delayed = self.is_market_closed(granted_at);
        let activates_at = if weekend_delayed {
            self.next_monday(granted_at)
        } else {
            granted_at
        };
        Schedule {
            activates_at,
            expires_at: activates_at + self.duration,
            weekend_delayed,
        }
    }
}
