//! 时间工具与时长计算

use crate::tasks::task::Timestamp;
use chrono::{DateTime, NaiveTime, TimeZone, Timelike};
use std::fmt::Display;

/// 显示用时间格式：两位小时、两位分钟
pub fn format_time<Tz>(instant: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    instant.format("%H:%M").to_string()
}

/// 小时序号 (0-23) → 12 小时制标签，如 `0 → "12:00 AM"`、`13 → "1:00 PM"`
pub fn hour_label(hour: u32) -> String {
    let hour = hour % 24;
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:00 {}", display, suffix)
}

/// 时间点在指定时区下的小时分量
pub fn hour_in<Tz: TimeZone>(instant: &Timestamp, tz: &Tz) -> u32 {
    instant.with_timezone(tz).hour()
}

/// 解析表单中的时刻文本，接受 `HH:MM` 和 `HH:MM:SS`
pub fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .ok()
}

/// 两个同日时刻之间的分钟数
///
/// 只取小时和分钟，秒及以下归零。`end` 不晚于 `start` 时返回 `None`。
pub fn duration_minutes(start: NaiveTime, end: NaiveTime) -> Option<u32> {
    let start = truncate_to_minute(start)?;
    let end = truncate_to_minute(end)?;
    let minutes = (end - start).num_minutes();
    if minutes > 0 {
        u32::try_from(minutes).ok()
    } else {
        None
    }
}

/// 任务时长：两个时间点之差，按分钟四舍五入。任一缺失或差值不为正时返回 `None`
pub fn task_duration(start: Option<&Timestamp>, end: Option<&Timestamp>) -> Option<u32> {
    let seconds = (*end? - *start?).num_seconds();
    if seconds <= 0 {
        return None;
    }
    let minutes = (seconds + 30) / 60;
    u32::try_from(minutes).ok().filter(|m| *m > 0)
}

fn truncate_to_minute(time: NaiveTime) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_hour_labels() {
        assert_eq!(hour_label(0), "12:00 AM");
        assert_eq!(hour_label(1), "1:00 AM");
        assert_eq!(hour_label(11), "11:00 AM");
        assert_eq!(hour_label(12), "12:00 PM");
        assert_eq!(hour_label(13), "1:00 PM");
        assert_eq!(hour_label(23), "11:00 PM");
    }

    #[test]
    fn test_format_time() {
        let ts = DateTime::parse_from_rfc3339("2025-08-20T09:05:42-06:00").unwrap();
        assert_eq!(format_time(&ts), "09:05");
        assert_eq!(format_time(&ts.with_timezone(&Utc)), "15:05");
    }

    #[test]
    fn test_hour_in_timezone() {
        let ts = DateTime::parse_from_rfc3339("2025-08-20T09:05:00-06:00").unwrap();
        assert_eq!(hour_in(&ts, &ts.timezone()), 9);
        assert_eq!(hour_in(&ts, &Utc), 15);
        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(hour_in(&ts, &east), 17);
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(parse_time_of_day("09:00"), Some(hm(9, 0)));
        assert_eq!(parse_time_of_day(" 23:59:10 "), NaiveTime::from_hms_opt(23, 59, 10));
        assert_eq!(parse_time_of_day("25:00"), None);
        assert_eq!(parse_time_of_day(""), None);
    }

    #[test]
    fn test_duration_minutes() {
        assert_eq!(duration_minutes(hm(9, 0), hm(9, 45)), Some(45));
        assert_eq!(duration_minutes(hm(9, 45), hm(9, 0)), None);
        assert_eq!(duration_minutes(hm(9, 0), hm(9, 0)), None);
        assert_eq!(duration_minutes(hm(0, 0), hm(23, 59)), Some(1439));
    }

    #[test]
    fn test_duration_ignores_seconds() {
        let start = NaiveTime::from_hms_opt(9, 0, 59).unwrap();
        let end = NaiveTime::from_hms_opt(9, 1, 0).unwrap();
        assert_eq!(duration_minutes(start, end), Some(1));

        let start = NaiveTime::from_hms_opt(9, 0, 10).unwrap();
        let end = NaiveTime::from_hms_opt(9, 0, 50).unwrap();
        assert_eq!(duration_minutes(start, end), None);
    }

    #[test]
    fn test_task_duration_is_instant_difference() {
        let start = DateTime::parse_from_rfc3339("2025-08-20T09:00:00-06:00").unwrap();
        let end = DateTime::parse_from_rfc3339("2025-08-20T15:30:00Z").unwrap();
        assert_eq!(task_duration(Some(&start), Some(&end)), Some(30));

        // 跨午夜
        let start = DateTime::parse_from_rfc3339("2025-08-20T23:30:00Z").unwrap();
        let end = DateTime::parse_from_rfc3339("2025-08-21T00:15:00Z").unwrap();
        assert_eq!(task_duration(Some(&start), Some(&end)), Some(45));

        assert_eq!(task_duration(Some(&end), Some(&start)), None);
        assert_eq!(task_duration(Some(&start), None), None);
        assert_eq!(task_duration(None, Some(&end)), None);
    }

    #[test]
    fn test_task_duration_rounds_to_nearest_minute() {
        let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap();
        let start = at("2025-08-20T09:00:50Z");
        assert_eq!(task_duration(Some(&start), Some(&at("2025-08-20T09:10:00Z"))), Some(9));
        assert_eq!(task_duration(Some(&start), Some(&at("2025-08-20T09:10:20Z"))), Some(10));
        assert_eq!(
            task_duration(Some(&start), Some(&at("2025-08-20T09:01:05Z"))),
            None,
            "不足半分钟按 0 处理"
        );
    }
}
