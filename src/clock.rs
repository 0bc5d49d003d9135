use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, TimeZone};
use std::time::Duration;

/// 距 2025-01-01 的天数，纪元之前为负
pub type DayIndex = i64;

/// 2025-01-01 的 `NaiveDate::num_days_from_ce`
const EPOCH_DAYS_FROM_CE: i64 = 739_252;

/// 日历日期与题目日序号之间的换算。
///
/// 按玩家本地日期取日，每个人在自己的零点换题；序号本身只是距纪元的天数
#[derive(Debug, Clone, Copy, Default)]
pub struct DailyClock {
    frozen: Option<DateTime<FixedOffset>>,
}

impl DailyClock {
    /// 跟随系统本地时间
    pub fn system() -> Self {
        DailyClock { frozen: None }
    }

    /// 固定在某一时刻，用于回放和测试
    pub fn frozen_at(now: DateTime<FixedOffset>) -> Self {
        DailyClock { frozen: Some(now) }
    }

    pub fn today_index(&self) -> DayIndex {
        match &self.frozen {
            Some(now) => index_at(now),
            None => index_at(&Local::now()),
        }
    }

    pub fn date_for_index(&self, day: DayIndex) -> Option<NaiveDate> {
        date_for_index(day)
    }

    /// 距本地日期切到下一个序号还剩多久
    pub fn time_until_next_index(&self) -> Duration {
        match &self.frozen {
            Some(now) => time_until_next_index_at(now),
            None => time_until_next_index_at(&Local::now()),
        }
    }
}

pub fn index_for_date(date: NaiveDate) -> DayIndex {
    i64::from(date.num_days_from_ce()) - EPOCH_DAYS_FROM_CE
}

pub fn date_for_index(day: DayIndex) -> Option<NaiveDate> {
    let days = day.checked_add(EPOCH_DAYS_FROM_CE)?;
    NaiveDate::from_num_days_from_ce_opt(i32::try_from(days).ok()?)
}

pub fn index_at<Tz: TimeZone>(now: &DateTime<Tz>) -> DayIndex {
    index_for_date(now.date_naive())
}

pub fn time_until_next_index_at<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let tz = now.timezone();
    let Some(midnight) = now
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return Duration::ZERO;
    };

    // 零点可能落在夏令时空档里，此时顺延一小时
    let next = tz.from_local_datetime(&midnight).earliest().or_else(|| {
        tz.from_local_datetime(&(midnight + chrono::Duration::hours(1)))
            .earliest()
    });

    match next {
        Some(next) => (next - now.clone()).to_std().unwrap_or_default(),
        None => Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn epoch_is_day_zero() {
        assert_eq!(index_for_date(date(2025, 1, 1)), 0);
        assert_eq!(index_for_date(date(2025, 3, 1)), 59);
        assert_eq!(index_for_date(date(2026, 1, 1)), 365);
    }

    #[test]
    fn dates_before_epoch_are_negative() {
        assert_eq!(index_for_date(date(2024, 12, 31)), -1);
        assert_eq!(index_for_date(date(2024, 1, 1)), -366);
    }

    #[test]
    fn date_for_index_inverts_index_for_date() {
        for day in [-800, -1, 0, 1, 59, 365, 10_000] {
            let d = date_for_index(day).unwrap();
            assert_eq!(index_for_date(d), day);
        }
        assert_eq!(date_for_index(-1), Some(date(2024, 12, 31)));
        assert_eq!(date_for_index(i64::MAX), None);
    }

    #[test]
    fn index_follows_local_calendar_date() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let late = tokyo.with_ymd_and_hms(2025, 1, 1, 23, 30, 0).unwrap();
        assert_eq!(DailyClock::frozen_at(late).today_index(), 0);

        // 同一时刻在东边两小时的时区已经是 1 月 2 日
        let east = FixedOffset::east_opt(11 * 3600).unwrap();
        assert_eq!(index_at(&late.with_timezone(&east)), 1);
    }

    #[test]
    fn countdown_reaches_local_midnight() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = offset.with_ymd_and_hms(2025, 6, 1, 23, 30, 0).unwrap();
        let clock = DailyClock::frozen_at(now);
        assert_eq!(clock.time_until_next_index(), Duration::from_secs(30 * 60));

        let morning = offset.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(
            time_until_next_index_at(&morning),
            Duration::from_secs(24 * 3600)
        );
    }
}
