//! 任务定义
//!
//! 线上格式 [`RawTask`] 的时间字段全部是可空文本；经 [`Hydrate`] 转换后得到强类型的
//! [`Task`]。`Task` 只能通过水合得到，未水合的记录无法出现在需要 `Task` 的位置。

use crate::error::HydrationError;
use crate::tasks::time::task_duration;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 带时区偏移的时间点，保留服务端给出的偏移量
pub type Timestamp = DateTime<FixedOffset>;

/// 任务状态，四者互斥
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// 待处理
    #[default]
    Pending,
    /// 已完成
    Completed,
    /// 已过期
    Overdue,
    /// 已取消
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Overdue => "overdue",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 优先级 (0-5，数值越小越紧急)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_more_urgent_than(&self, other: &Priority) -> bool {
        self.0 < other.0
    }
}

impl TryFrom<i64> for Priority {
    type Error = HydrationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Priority::new)
            .ok_or(HydrationError::OutOfRange {
                field: "priority",
                value: value.to_string(),
            })
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

/// 线上传输格式的任务，所有时间字段均为可空文本
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTask {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub schedule_task_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    /// 时长（分钟）
    #[serde(default)]
    pub duration: Option<i64>,
    /// 重复模板的结束日期，向前兼容字段
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<String>,
}

/// 强类型任务
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    /// 关联的重复任务模板，一次性任务为 `None`
    pub schedule_task_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    /// 任务所属日期
    pub date: Timestamp,
    pub status: TaskStatus,
    pub priority: Priority,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    /// 时长（分钟），由开始/结束时间推导
    pub duration: Option<u32>,
    pub end_date: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// 完成操作的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// pending → completed
    Applied,
    /// 已是 completed，不做任何事
    AlreadyCompleted,
}

impl Task {
    /// 完成按钮是否可用
    pub fn can_complete(&self) -> bool {
        !self.status.is_completed()
    }

    /// 唯一合法的状态迁移：未完成 → completed。重复调用为空操作。
    ///
    /// `completed_at` 不早于 `created_at`。
    pub fn mark_completed(&mut self, now: Timestamp) -> Completion {
        if self.status.is_completed() {
            return Completion::AlreadyCompleted;
        }
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now.max(self.created_at));
        self.updated_at = now.max(self.updated_at);
        Completion::Applied
    }
}

/// 线上数据 → 强类型任务
///
/// 对已水合的 [`Task`] 调用是恒等变换，因此重复水合结果不变。
pub trait Hydrate {
    fn hydrate(self) -> Result<Task, HydrationError>;
}

impl Hydrate for Task {
    fn hydrate(self) -> Result<Task, HydrationError> {
        Ok(self)
    }
}

impl Hydrate for RawTask {
    fn hydrate(self) -> Result<Task, HydrationError> {
        let date = required("date", self.date)?;
        let created_at = required("createdAt", self.created_at)?;
        let updated_at = required("updatedAt", self.updated_at)?;
        let start_time = parse_timestamp("startTime", self.start_time)?;
        let end_time = parse_timestamp("endTime", self.end_time)?;
        let priority = Priority::try_from(self.priority)?;
        let completed_at = parse_timestamp("completedAt", self.completed_at)?;

        // 有开始/结束时间时以推导值为准，否则沿用服务端给出的正时长
        let duration = match (&start_time, &end_time) {
            (Some(_), Some(_)) => task_duration(start_time.as_ref(), end_time.as_ref()),
            _ => self
                .duration
                .filter(|d| *d > 0)
                .and_then(|d| u32::try_from(d).ok()),
        };

        Ok(Task {
            id: self.id,
            user_id: self.user_id,
            schedule_task_id: self.schedule_task_id.filter(|s| !s.is_empty()),
            title: self.title,
            description: self.description.filter(|s| !s.is_empty()),
            date,
            status: self.status,
            priority,
            start_time,
            end_time,
            duration,
            end_date: parse_timestamp("endDate", self.end_date)?,
            completed_at: settle_completed_at(self.status, completed_at, created_at, updated_at),
            created_at,
            updated_at,
        })
    }
}

impl From<&Task> for RawTask {
    fn from(task: &Task) -> Self {
        let text = |t: &Timestamp| t.to_rfc3339();
        RawTask {
            id: task.id.clone(),
            user_id: task.user_id.clone(),
            schedule_task_id: task.schedule_task_id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            date: Some(text(&task.date)),
            status: task.status,
            priority: i64::from(task.priority.value()),
            start_time: task.start_time.as_ref().map(text),
            end_time: task.end_time.as_ref().map(text),
            duration: task.duration.map(i64::from),
            end_date: task.end_date.as_ref().map(text),
            completed_at: task.completed_at.as_ref().map(text),
            created_at: Some(text(&task.created_at)),
            updated_at: Some(text(&task.updated_at)),
        }
    }
}

/// 已完成任务的完成时间不为空且不早于创建时间；缺失时取最后更新时间
fn settle_completed_at(
    status: TaskStatus,
    completed_at: Option<Timestamp>,
    created_at: Timestamp,
    updated_at: Timestamp,
) -> Option<Timestamp> {
    if !status.is_completed() {
        return completed_at;
    }
    Some(completed_at.unwrap_or(updated_at).max(created_at))
}

fn required(field: &'static str, value: Option<String>) -> Result<Timestamp, HydrationError> {
    parse_timestamp(field, value)?.ok_or(HydrationError::MissingField(field))
}

/// 解析 RFC 3339 时间戳；纯日期 `YYYY-MM-DD` 视为 UTC 零点。空字符串按 null 处理。
pub(crate) fn parse_timestamp(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<Timestamp>, HydrationError> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Some(ts));
    }
    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = day.and_hms_opt(0, 0, 0) {
            return Ok(Some(Utc.from_utc_datetime(&midnight).fixed_offset()));
        }
    }
    Err(HydrationError::InvalidTimestamp {
        field,
        value: raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_raw_task;

    #[test]
    fn test_hydrate_converts_timestamps() {
        let raw = sample_raw_task("t1", Some("2025-08-20T09:05:00-06:00"));
        let task = raw.hydrate().unwrap();

        assert_eq!(task.id, "t1");
        let start = task.start_time.unwrap();
        assert_eq!(start.to_rfc3339(), "2025-08-20T09:05:00-06:00");
        assert!(task.end_time.is_none());
        assert!(task.completed_at.is_none());
        assert!(task.end_date.is_none());
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_hydrate_is_idempotent() {
        let once = sample_raw_task("t1", Some("2025-08-20T09:05:00Z"))
            .hydrate()
            .unwrap();
        let twice = once.clone().hydrate().unwrap();
        assert_eq!(once, twice, "重复水合结果应一致");

        let round_trip = RawTask::from(&once).hydrate().unwrap();
        assert_eq!(once, round_trip, "已水合记录再走一遍线上格式结果不变");
    }

    #[test]
    fn test_hydrate_null_and_empty_fields_stay_null() {
        let mut raw = sample_raw_task("t1", None);
        raw.end_time = Some(String::new());
        raw.description = Some(String::new());
        raw.schedule_task_id = None;
        let task = raw.hydrate().unwrap();
        assert!(task.start_time.is_none());
        assert!(task.end_time.is_none());
        assert!(task.description.is_none());
        assert!(task.schedule_task_id.is_none());
    }

    #[test]
    fn test_hydrate_accepts_plain_date() {
        let mut raw = sample_raw_task("t1", None);
        raw.date = Some("2025-08-20".to_string());
        raw.end_date = Some("2025-12-31".to_string());
        let task = raw.hydrate().unwrap();
        assert_eq!(task.date.to_rfc3339(), "2025-08-20T00:00:00+00:00");
        assert!(task.end_date.is_some());
    }

    #[test]
    fn test_hydrate_missing_required_field() {
        let mut raw = sample_raw_task("t1", None);
        raw.created_at = None;
        assert_eq!(
            raw.hydrate().unwrap_err(),
            HydrationError::MissingField("createdAt")
        );
    }

    #[test]
    fn test_hydrate_invalid_timestamp() {
        let raw = sample_raw_task("t1", Some("nine o'clock"));
        assert!(matches!(
            raw.hydrate().unwrap_err(),
            HydrationError::InvalidTimestamp { field: "startTime", .. }
        ));
    }

    #[test]
    fn test_hydrate_priority_out_of_range() {
        let mut raw = sample_raw_task("t1", None);
        raw.priority = 7;
        assert!(matches!(
            raw.hydrate().unwrap_err(),
            HydrationError::OutOfRange { field: "priority", .. }
        ));
    }

    #[test]
    fn test_duration_derived_from_times() {
        let mut raw = sample_raw_task("t1", Some("2025-08-20T09:00:00Z"));
        raw.end_time = Some("2025-08-20T09:45:20Z".to_string());
        raw.duration = Some(999);
        assert_eq!(raw.hydrate().unwrap().duration, Some(45));

        let mut raw = sample_raw_task("t2", None);
        raw.duration = Some(30);
        assert_eq!(raw.hydrate().unwrap().duration, Some(30));
    }

    #[test]
    fn test_duration_across_offsets() {
        let mut raw = sample_raw_task("t1", Some("2025-08-20T09:00:00-06:00"));
        raw.end_time = Some("2025-08-20T15:30:00Z".to_string());
        assert_eq!(raw.hydrate().unwrap().duration, Some(30));
    }

    #[test]
    fn test_duration_rounds_seconds() {
        let mut raw = sample_raw_task("t1", Some("2025-08-20T09:00:50Z"));
        raw.end_time = Some("2025-08-20T09:10:00Z".to_string());
        assert_eq!(raw.clone().hydrate().unwrap().duration, Some(9));

        raw.end_time = Some("2025-08-20T09:10:30Z".to_string());
        assert_eq!(raw.hydrate().unwrap().duration, Some(10));
    }

    #[test]
    fn test_completed_record_always_has_completion_time() {
        let mut raw = sample_raw_task("t1", None);
        raw.status = TaskStatus::Completed;
        raw.updated_at = Some("2025-08-20T11:00:00Z".to_string());
        let task = raw.clone().hydrate().unwrap();
        assert_eq!(task.completed_at, Some(task.updated_at));

        raw.completed_at = Some("2025-08-01T00:00:00Z".to_string());
        let task = raw.hydrate().unwrap();
        assert_eq!(task.completed_at, Some(task.created_at), "不早于创建时间");
    }

    #[test]
    fn test_pending_record_keeps_null_completion_time() {
        let task = sample_raw_task("t1", None).hydrate().unwrap();
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_wire_json_with_snake_case_audit_fields() {
        let json = r#"{
            "id": "abc",
            "userId": "u1",
            "title": "Leer",
            "date": "2025-08-20T00:00:00Z",
            "status": "overdue",
            "priority": 2,
            "created_at": "2025-08-19T10:00:00Z",
            "updated_at": "2025-08-19T10:00:00Z",
            "unknownField": true
        }"#;
        let raw: RawTask = serde_json::from_str(json).unwrap();
        let task = raw.hydrate().unwrap();
        assert_eq!(task.status, TaskStatus::Overdue);
        assert_eq!(task.priority.value(), 2);
    }

    #[test]
    fn test_mark_completed_transitions_once() {
        let mut task = sample_raw_task("t1", None).hydrate().unwrap();
        let now = DateTime::parse_from_rfc3339("2025-08-20T12:00:00Z").unwrap();

        assert!(task.can_complete());
        assert_eq!(task.mark_completed(now), Completion::Applied);
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.unwrap() >= task.created_at);
        assert!(!task.can_complete());

        let later = DateTime::parse_from_rfc3339("2025-08-20T13:00:00Z").unwrap();
        assert_eq!(task.mark_completed(later), Completion::AlreadyCompleted);
        assert_eq!(task.completed_at, Some(now), "重复完成不应改写完成时间");
    }

    #[test]
    fn test_completed_at_never_precedes_created_at() {
        let mut task = sample_raw_task("t1", None).hydrate().unwrap();
        let before_creation = task.created_at - chrono::Duration::hours(1);
        task.mark_completed(before_creation);
        assert_eq!(task.completed_at, Some(task.created_at));
    }

    #[test]
    fn test_priority_ordering() {
        let urgent = Priority::new(0).unwrap();
        let low = Priority::new(5).unwrap();
        assert!(urgent.is_more_urgent_than(&low));
        assert!(Priority::new(6).is_none());
    }
}
