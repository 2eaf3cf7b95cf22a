//! 按小时排布的日程视图
//!
//! 把一天的任务按开始时间的小时分量分进 24 个槽位。没有开始时间的任务不进入任何槽位。

use crate::tasks::task::Task;
use crate::tasks::time::{hour_in, hour_label};
use chrono::{DateTime, TimeZone, Timelike};

pub const HOURS_PER_DAY: usize = 24;

/// 单次线性扫描，按 `tz` 下的小时分量分桶，桶内保持输入顺序
pub fn bucketize<'a, Tz: TimeZone>(
    tasks: &'a [Task],
    tz: &Tz,
) -> [Vec<&'a Task>; HOURS_PER_DAY] {
    let mut buckets: [Vec<&'a Task>; HOURS_PER_DAY] = std::array::from_fn(|_| Vec::new());
    for task in tasks {
        if let Some(start) = &task.start_time {
            buckets[hour_in(start, tz) as usize].push(task);
        }
    }
    buckets
}

/// 一个小时槽位
#[derive(Debug, Clone, PartialEq)]
pub struct HourSlot {
    pub hour: u32,
    pub tasks: Vec<Task>,
    /// 仅影响展示，与槽位成员无关
    pub is_current: bool,
}

impl HourSlot {
    pub fn label(&self) -> String {
        hour_label(self.hour)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 折叠状态下展示的第一条任务
    pub fn first(&self) -> Option<&Task> {
        self.tasks.first()
    }

    /// 展开后才显示的其余任务
    pub fn overflow(&self) -> &[Task] {
        self.tasks.get(1..).unwrap_or(&[])
    }
}

/// 24 槽位的日程视图
#[derive(Debug, Clone, PartialEq)]
pub struct DailySchedule {
    slots: Vec<HourSlot>,
    current_hour: u32,
    unscheduled: usize,
}

impl DailySchedule {
    /// 以 `now` 所在时区分桶，`now` 的小时即当前槽位
    pub fn build<Tz: TimeZone>(tasks: &[Task], now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let current_hour = now.hour();
        let buckets = bucketize(tasks, &tz);

        let scheduled: usize = buckets.iter().map(Vec::len).sum();
        let slots = buckets
            .into_iter()
            .enumerate()
            .map(|(hour, bucket)| HourSlot {
                hour: hour as u32,
                tasks: bucket.into_iter().cloned().collect(),
                is_current: hour as u32 == current_hour,
            })
            .collect();

        Self {
            slots,
            current_hour,
            unscheduled: tasks.len() - scheduled,
        }
    }

    pub fn slots(&self) -> &[HourSlot] {
        &self.slots
    }

    pub fn slot(&self, hour: u32) -> Option<&HourSlot> {
        self.slots.get(hour as usize)
    }

    pub fn current_hour(&self) -> u32 {
        self.current_hour
    }

    /// 打开视图时应滚动到的槽位
    pub fn focus_slot(&self) -> &HourSlot {
        &self.slots[self.current_hour as usize]
    }

    /// 已排入槽位的任务数
    pub fn scheduled_count(&self) -> usize {
        self.slots.iter().map(|s| s.tasks.len()).sum()
    }

    /// 没有开始时间、未排入任何槽位的任务数
    pub fn unscheduled_count(&self) -> usize {
        self.unscheduled
    }

    pub fn busy_slots(&self) -> impl Iterator<Item = &HourSlot> {
        self.slots.iter().filter(|s| !s.is_empty())
    }
}
