//! 测试基础设施
//!
//! 在不启动真实后端的情况下测试视图模型的各个组件。
//!
//! | 类型 | 用途 |
//! |------|------|
//! | [`MockTaskApi`] | 替代 [`HttpTaskApi`](crate::api::HttpTaskApi)，按接口脚本化响应并记录调用 |
//! | [`ManualClock`] | 手动推进的时钟，用于测试缓存过期窗口 |
//! | [`sample_raw_task`] | 构造一条字段齐全的线上格式任务 |
//!
//! # 使用示例
//!
//! ```rust
//! use tasktracker::cache::QueryCache;
//! use tasktracker::service::TaskService;
//! use tasktracker::testing::{MockTaskApi, sample_raw_task};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> tasktracker::error::Result<()> {
//! let api = Arc::new(
//!     MockTaskApi::new().with_today_tasks(vec![sample_raw_task("t1", Some("2025-08-20T09:05:00Z"))]),
//! );
//! let service = TaskService::new(api.clone(), QueryCache::new());
//!
//! let tasks = service.today_tasks().await?;
//! assert_eq!(tasks.len(), 1);
//! service.today_tasks().await?;
//! assert_eq!(api.call_count(), 1); // 第二次读取命中缓存
//! # Ok(())
//! # }
//! ```

mod clock;
mod mock_api;

pub use clock::ManualClock;
pub use mock_api::{ApiCall, MockTaskApi};

use crate::tasks::RawTask;

/// 2025-08-20 的一条待办任务，创建于前一天 10:00 UTC，优先级 3
pub fn sample_raw_task(id: &str, start_time: Option<&str>) -> RawTask {
    RawTask {
        id: id.to_string(),
        user_id: "user-1".to_string(),
        title: format!("任务 {}", id),
        date: Some("2025-08-20T00:00:00Z".to_string()),
        priority: 3,
        start_time: start_time.map(str::to_string),
        created_at: Some("2025-08-19T10:00:00Z".to_string()),
        updated_at: Some("2025-08-19T10:00:00Z".to_string()),
        ..RawTask::default()
    }
}
