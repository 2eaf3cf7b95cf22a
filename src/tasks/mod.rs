//! 任务领域模型：任务实体、时间工具、按小时分桶和新建表单校验

pub mod form;
pub mod schedule;
pub mod task;
pub mod time;

pub use form::{NewTaskRequest, RepeatFrequency, TaskForm};
pub use schedule::{DailySchedule, HourSlot, bucketize};
pub use task::{Completion, Hydrate, Priority, RawTask, Task, TaskStatus, Timestamp};
