//! 新建任务表单与校验
//!
//! [`TaskForm`] 保存用户输入的原始文本；[`TaskForm::validate`] 一次性检查所有字段，
//! 任一字段不合法即整体失败，成功时产出可直接提交的 [`NewTaskRequest`]。
//!
//! 表单里的 `HH:MM` 是提交当天的本地时刻，提交时换算成 UTC 时间点。

use crate::error::{FieldError, ValidationErrors};
use crate::tasks::time::{duration_minutes, parse_time_of_day};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const TITLE_MAX_CHARS: usize = 255;
pub const DESCRIPTION_MAX_CHARS: usize = 512;
pub const DEFAULT_FORM_PRIORITY: i64 = 3;

/// 重复频率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatFrequency {
    Daily,
    Weekly,
    /// 每 15 天
    Biweekly,
    Monthly,
    Bimonthly,
    Yearly,
}

impl RepeatFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatFrequency::Daily => "daily",
            RepeatFrequency::Weekly => "weekly",
            RepeatFrequency::Biweekly => "biweekly",
            RepeatFrequency::Monthly => "monthly",
            RepeatFrequency::Bimonthly => "bimonthly",
            RepeatFrequency::Yearly => "yearly",
        }
    }

    /// 每周/双周重复必须指定星期几
    pub fn requires_weekdays(&self) -> bool {
        matches!(self, RepeatFrequency::Weekly | RepeatFrequency::Biweekly)
    }
}

impl fmt::Display for RepeatFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepeatFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(RepeatFrequency::Daily),
            "weekly" => Ok(RepeatFrequency::Weekly),
            "biweekly" => Ok(RepeatFrequency::Biweekly),
            "monthly" => Ok(RepeatFrequency::Monthly),
            "bimonthly" => Ok(RepeatFrequency::Bimonthly),
            "yearly" => Ok(RepeatFrequency::Yearly),
            other => Err(format!("未知的重复频率: {}", other)),
        }
    }
}

/// 新建任务表单
///
/// 开始/结束时间只能通过 setter 修改，每次修改都会重新计算 `duration`。
#[derive(Debug, Clone, PartialEq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    start_time: String,
    end_time: String,
    duration: Option<u32>,
    /// 表单允许 1-5，0 留给系统生成的紧急任务
    pub priority: i64,
    pub required: bool,
    pub repeating: bool,
    pub repeat_frequency: String,
    pub repeat_interval: Option<u32>,
    /// 0 = 周日 … 6 = 周六
    pub repeat_weekdays: Vec<u8>,
    pub repeat_end_date: Option<NaiveDate>,
}

impl Default for TaskForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            start_time: String::new(),
            end_time: String::new(),
            duration: None,
            priority: DEFAULT_FORM_PRIORITY,
            required: false,
            repeating: false,
            repeat_frequency: String::new(),
            repeat_interval: None,
            repeat_weekdays: Vec::new(),
            repeat_end_date: None,
        }
    }
}

impl TaskForm {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_times(mut self, start: &str, end: &str) -> Self {
        self.set_start_time(start);
        self.set_end_time(end);
        self
    }

    pub fn with_repeat(mut self, frequency: &str, weekdays: Vec<u8>) -> Self {
        self.repeating = true;
        self.repeat_frequency = frequency.to_string();
        self.repeat_weekdays = weekdays;
        self
    }

    pub fn start_time(&self) -> &str {
        &self.start_time
    }

    pub fn end_time(&self) -> &str {
        &self.end_time
    }

    /// 当前计算出的时长（分钟）；结束不晚于开始时为 `None`
    pub fn duration(&self) -> Option<u32> {
        self.duration
    }

    pub fn set_start_time(&mut self, value: &str) {
        self.start_time = value.to_string();
        self.recompute_duration();
    }

    pub fn set_end_time(&mut self, value: &str) {
        self.end_time = value.to_string();
        self.recompute_duration();
    }

    /// 提交成功后清空表单
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn recompute_duration(&mut self) {
        self.duration = match (
            parse_time_of_day(&self.start_time),
            parse_time_of_day(&self.end_time),
        ) {
            (Some(start), Some(end)) => duration_minutes(start, end),
            _ => None,
        };
    }

    /// 校验所有字段；任一字段出错即整体失败
    ///
    /// 开始/结束时刻落在 `today` 所在的日期与时区上。
    pub fn validate<Tz: TimeZone>(
        &self,
        today: &DateTime<Tz>,
    ) -> Result<NewTaskRequest, ValidationErrors> {
        let mut errors = Vec::new();
        let mut fail = |field: &'static str, message: &str| {
            errors.push(FieldError {
                field,
                message: message.to_string(),
            })
        };

        let title_len = self.title.chars().count();
        if title_len == 0 {
            fail("title", "标题不能为空");
        } else if title_len > TITLE_MAX_CHARS {
            fail("title", "标题不能超过 255 个字符");
        }

        if self.description.chars().count() > DESCRIPTION_MAX_CHARS {
            fail("description", "描述不能超过 512 个字符");
        }

        let start_time = parse_optional_time(&self.start_time);
        let end_time = parse_optional_time(&self.end_time);
        if start_time.is_err() {
            fail("startTime", "时间格式无效，应为 HH:MM");
        }
        if end_time.is_err() {
            fail("endTime", "时间格式无效，应为 HH:MM");
        }
        let (start_time, end_time) = (start_time.unwrap_or(None), end_time.unwrap_or(None));
        let duration = match (start_time, end_time) {
            (Some(start), Some(end)) => {
                let minutes = duration_minutes(start, end);
                if minutes.is_none() {
                    fail("endTime", "结束时间必须晚于开始时间");
                }
                minutes
            }
            _ => None,
        };

        let start_at = anchor_on_day(today, start_time);
        let end_at = anchor_on_day(today, end_time);
        if start_at.is_err() {
            fail("startTime", "该时刻在本地时区不存在");
        }
        if end_at.is_err() {
            fail("endTime", "该时刻在本地时区不存在");
        }

        let priority = u8::try_from(self.priority).ok().filter(|p| (1..=5).contains(p));
        if priority.is_none() {
            fail("priority", "优先级必须在 1 到 5 之间");
        }

        let mut repeat_frequency = None;
        if self.repeating {
            if self.repeat_frequency.trim().is_empty() {
                fail("repeatFrequency", "启用重复时必须选择重复频率");
            } else {
                match self.repeat_frequency.parse::<RepeatFrequency>() {
                    Ok(freq) => {
                        if freq.requires_weekdays() && self.repeat_weekdays.is_empty() {
                            fail("repeatWeekdays", "每周或双周重复需要至少选择一天");
                        }
                        repeat_frequency = Some(freq);
                    }
                    Err(message) => fail("repeatFrequency", &message),
                }
            }
            if self.repeat_weekdays.iter().any(|d| *d > 6) {
                fail("repeatWeekdays", "星期取值必须在 0 到 6 之间");
            }
            if self.repeat_interval == Some(0) {
                fail("repeatInterval", "重复间隔必须大于 0");
            }
        }

        if !errors.is_empty() {
            return Err(ValidationErrors(errors));
        }

        let mut weekdays = if self.repeating {
            self.repeat_weekdays.clone()
        } else {
            Vec::new()
        };
        weekdays.sort_unstable();
        weekdays.dedup();

        Ok(NewTaskRequest {
            title: self.title.clone(),
            description: self.description.clone(),
            start_time: start_at.unwrap_or(None),
            end_time: end_at.unwrap_or(None),
            duration,
            priority: priority.unwrap_or(DEFAULT_FORM_PRIORITY as u8),
            required: self.required,
            repeating: self.repeating,
            repeat_frequency,
            repeat_interval: self.repeat_interval.filter(|_| self.repeating),
            repeat_weekdays: weekdays,
            repeat_end_date: self.repeat_end_date.filter(|_| self.repeating),
        })
    }
}

/// 本地时刻 → 当天的 UTC 时间点；夏令时跳过的时刻返回 `Err`
fn anchor_on_day<Tz: TimeZone>(
    today: &DateTime<Tz>,
    time: Option<NaiveTime>,
) -> Result<Option<DateTime<Utc>>, ()> {
    let Some(time) = time else {
        return Ok(None);
    };
    today
        .timezone()
        .from_local_datetime(&today.date_naive().and_time(time))
        .earliest()
        .map(|local| Some(local.with_timezone(&Utc)))
        .ok_or(())
}

fn parse_optional_time(text: &str) -> Result<Option<NaiveTime>, ()> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    parse_time_of_day(text).map(Some).ok_or(())
}

/// 校验通过后提交给后端的创建请求
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskRequest {
    pub title: String,
    pub description: String,
    #[serde(serialize_with = "serialize_instant", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_instant", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    pub priority: u8,
    pub required: bool,
    pub repeating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_frequency: Option<RepeatFrequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_interval: Option<u32>,
    pub repeat_weekdays: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_end_date: Option<NaiveDate>,
}

/// RFC 3339，UTC，毫秒精度，如 `2025-08-20T15:00:00.000Z`
fn serialize_instant<S: Serializer>(
    time: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match time {
        Some(t) => serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => serializer.serialize_none(),
    }
}
