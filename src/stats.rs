use crate::clock::DayIndex;
use crate::mode::MAX_GUESSES;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// 空桶的最小柱宽，百分比
const MIN_BAR_WIDTH: u32 = 7;

/// 按猜测次数分桶的胜局数，外加失败数。
///
/// 序列化为 `{ "1": n, ..., "6": n, "fail": n }`，缺失的桶按 0 处理
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, u32>", into = "BTreeMap<String, u32>")]
pub struct GuessHistogram {
    wins: [u32; MAX_GUESSES],
    fail: u32,
}

impl GuessHistogram {
    /// 恰好用 `attempts` 次猜中的局数（从 1 开始）
    pub fn wins_in(&self, attempts: usize) -> u32 {
        attempts
            .checked_sub(1)
            .and_then(|i| self.wins.get(i))
            .copied()
            .unwrap_or(0)
    }

    pub fn fail(&self) -> u32 {
        self.fail
    }

    pub fn total_wins(&self) -> u64 {
        self.wins.iter().map(|&n| u64::from(n)).sum()
    }

    fn max_bucket(&self) -> u32 {
        self.wins.iter().copied().chain([self.fail]).max().unwrap_or(0)
    }
}

impl From<BTreeMap<String, u32>> for GuessHistogram {
    fn from(map: BTreeMap<String, u32>) -> Self {
        let mut histogram = GuessHistogram::default();
        for (bucket, count) in map {
            if bucket == "fail" {
                histogram.fail = count;
            } else if let Ok(n) = bucket.parse::<usize>()
                && (1..=MAX_GUESSES).contains(&n)
            {
                histogram.wins[n - 1] = count;
            }
        }
        histogram
    }
}

impl From<GuessHistogram> for BTreeMap<String, u32> {
    fn from(histogram: GuessHistogram) -> Self {
        let mut map: BTreeMap<String, u32> = histogram
            .wins
            .iter()
            .enumerate()
            .map(|(i, count)| ((i + 1).to_string(), *count))
            .collect();
        map.insert("fail".to_string(), histogram.fail);
        map
    }
}

/// 单个模式的累计战绩
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsRecord {
    pub played: u32,
    pub won: u32,
    pub current_streak: u32,
    pub max_streak: u32,
    pub guesses: GuessHistogram,
    /// 最近一次计入的日期，防止同一天重复计数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_recorded_day: Option<DayIndex>,
}

impl StatsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// 计入一局结果。失败时忽略 `attempts`
    pub fn record_outcome(&mut self, won: bool, attempts: usize) {
        if won && !(1..=MAX_GUESSES).contains(&attempts) {
            warn!(attempts, "忽略尝试次数不合法的胜局");
            return;
        }

        self.played = self.played.saturating_add(1);
        if won {
            self.won = self.won.saturating_add(1);
            self.current_streak = self.current_streak.saturating_add(1);
            self.max_streak = self.max_streak.max(self.current_streak);
            let bucket = &mut self.guesses.wins[attempts - 1];
            *bucket = bucket.saturating_add(1);
        } else {
            self.current_streak = 0;
            self.guesses.fail = self.guesses.fail.saturating_add(1);
        }
    }

    /// 计入 `day` 的结果，已计入过则跳过。返回是否有变化
    pub fn record_day(&mut self, day: DayIndex, won: bool, attempts: usize) -> bool {
        if self.last_recorded_day == Some(day) {
            return false;
        }
        if won && !(1..=MAX_GUESSES).contains(&attempts) {
            warn!(attempts, "忽略尝试次数不合法的胜局");
            return false;
        }
        self.record_outcome(won, attempts);
        self.last_recorded_day = Some(day);
        true
    }

    pub fn is_consistent(&self) -> bool {
        u64::from(self.played) == u64::from(self.won) + u64::from(self.guesses.fail)
            && u64::from(self.won) == self.guesses.total_wins()
    }

    pub fn summarize(&self) -> StatsSummary {
        let win_pct = if self.played > 0 {
            (100.0 * f64::from(self.won) / f64::from(self.played)).round() as u32
        } else {
            0
        };

        StatsSummary {
            played: self.played,
            win_pct,
            current_streak: self.current_streak,
            max_streak: self.max_streak,
            histogram: self.guesses,
        }
    }
}

/// 统计界面用的只读视图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub played: u32,
    pub win_pct: u32,
    pub current_streak: u32,
    pub max_streak: u32,
    pub histogram: GuessHistogram,
}

impl StatsSummary {
    /// 每个桶的柱宽，为最大桶的百分比
    pub fn bar_widths(&self) -> [u32; MAX_GUESSES] {
        let max = self.histogram.max_bucket();
        let mut widths = [MIN_BAR_WIDTH; MAX_GUESSES];
        if max == 0 {
            return widths;
        }
        for (i, width) in widths.iter_mut().enumerate() {
            let pct = u64::from(self.histogram.wins[i]) * 100 / u64::from(max);
            *width = (pct as u32).max(MIN_BAR_WIDTH);
        }
        widths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_in_three_from_fresh_record() {
        let mut stats = StatsRecord::new();
        stats.record_outcome(true, 3);

        assert_eq!(stats.played, 1);
        assert_eq!(stats.won, 1);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.max_streak, 1);
        assert_eq!(stats.guesses.wins_in(3), 1);
        assert!(stats.is_consistent());
    }

    #[test]
    fn loss_resets_streak_but_keeps_max() {
        let mut stats = StatsRecord::new();
        stats.record_outcome(true, 2);
        stats.record_outcome(true, 4);
        stats.record_outcome(false, 6);
        stats.record_outcome(true, 1);

        assert_eq!(stats.played, 4);
        assert_eq!(stats.won, 3);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.max_streak, 2);
        assert_eq!(stats.guesses.fail(), 1);
        assert!(stats.is_consistent());
    }

    #[test]
    fn impossible_win_is_ignored() {
        let mut stats = StatsRecord::new();
        stats.record_outcome(true, 0);
        stats.record_outcome(true, 7);
        assert_eq!(stats, StatsRecord::new());
    }

    #[test]
    fn same_day_is_recorded_once() {
        let mut stats = StatsRecord::new();
        assert!(stats.record_day(12, true, 3));
        assert!(!stats.record_day(12, true, 3));
        assert!(stats.record_day(13, false, 6));
        assert_eq!(stats.played, 2);
    }

    #[test]
    fn summary_rounds_win_percentage() {
        let mut stats = StatsRecord::new();
        assert_eq!(stats.summarize().win_pct, 0);

        stats.record_outcome(true, 3);
        stats.record_outcome(true, 3);
        stats.record_outcome(false, 6);
        assert_eq!(stats.summarize().win_pct, 67);
    }

    #[test]
    fn bar_widths_scale_to_largest_bucket() {
        let mut stats = StatsRecord::new();
        assert_eq!(stats.summarize().bar_widths(), [7; 6]);

        for _ in 0..4 {
            stats.record_outcome(true, 4);
        }
        stats.record_outcome(true, 2);
        assert_eq!(stats.summarize().bar_widths(), [7, 25, 7, 100, 7, 7]);
    }

    #[test]
    fn json_shape_matches_stored_documents() {
        let mut stats = StatsRecord::new();
        stats.record_outcome(true, 3);
        let json = serde_json::to_value(&stats).unwrap();

        assert_eq!(json["played"], 1);
        assert_eq!(json["currentStreak"], 1);
        assert_eq!(json["guesses"]["3"], 1);
        assert_eq!(json["guesses"]["fail"], 0);
        assert!(json.get("lastRecordedDay").is_none());

        let legacy = r#"{"played":2,"won":1,"currentStreak":0,"maxStreak":1,
            "guesses":{"5":1,"fail":1}}"#;
        let parsed: StatsRecord = serde_json::from_str(legacy).unwrap();
        assert_eq!(parsed.guesses.wins_in(5), 1);
        assert!(parsed.is_consistent());
    }

    #[test]
    fn saturated_counters_do_not_overflow() {
        let mut stats: StatsRecord = serde_json::from_str(
            r#"{"played":4294967295,"won":4294967295,"currentStreak":4294967295,
                "maxStreak":4294967295,"guesses":{"2":4294967295,"fail":4294967295}}"#,
        )
        .unwrap();

        assert!(stats.record_day(3, true, 2));
        assert!(stats.record_day(4, false, 6));
        assert_eq!(stats.played, u32::MAX);
        assert_eq!(stats.won, u32::MAX);
        assert_eq!(stats.guesses.wins_in(2), u32::MAX);
        assert_eq!(stats.guesses.fail(), u32::MAX);
        assert_eq!(stats.max_streak, u32::MAX);
    }

    #[test]
    fn bar_widths_handle_huge_buckets() {
        let stats: StatsRecord =
            serde_json::from_str(r#"{"guesses":{"3":50000000,"4":25000000,"fail":4294967295}}"#)
                .unwrap();
        assert_eq!(stats.summarize().bar_widths(), [7, 7, 7, 7, 7, 7]);

        let stats: StatsRecord =
            serde_json::from_str(r#"{"guesses":{"3":50000000,"4":25000000}}"#).unwrap();
        assert_eq!(stats.summarize().bar_widths(), [7, 7, 100, 50, 7, 7]);
    }
}
