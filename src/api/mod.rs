//! 后端任务接口
//!
//! [`TaskApi`] 是视图模型与后端之间唯一的接缝：生产环境用 [`HttpTaskApi`]，
//! 测试用 [`crate::testing::MockTaskApi`]。接口返回线上格式，水合由调用方在边界上完成。

mod client;
pub mod types;

pub use client::HttpTaskApi;
pub use types::{
    CreateTaskResponse, SessionInfo, SessionUser, StatusUpdate, StatusUpdateResponse,
    TasksEnvelope,
};

use crate::error::Result;
use crate::tasks::{NewTaskRequest, TaskStatus};
use async_trait::async_trait;

pub const CHECK_AUTH_PATH: &str = "/api/v1/check-auth";
pub const TASKS_PATH: &str = "/api/v1/tasks";
pub const TODAY_TASKS_PATH: &str = "/api/v1/tasks/today";

/// 各操作失败且服务端未给出 `error` 时的兜底文案
pub mod fallback {
    pub const CHECK_AUTH: &str = "验证身份失败";
    pub const LIST_TASKS: &str = "获取任务失败";
    pub const CREATE_TASK: &str = "创建任务失败";
    pub const COMPLETE_TASK: &str = "标记任务完成失败";
}

pub fn task_path(task_id: &str) -> String {
    format!("{}/{}", TASKS_PATH, task_id)
}

/// 后端任务服务
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn check_auth(&self) -> Result<SessionInfo>;

    async fn list_tasks(&self) -> Result<TasksEnvelope>;

    async fn list_today_tasks(&self) -> Result<TasksEnvelope>;

    async fn create_task(&self, request: &NewTaskRequest) -> Result<CreateTaskResponse>;

    /// 整字段更新任务状态；对已完成任务再次设置 completed 是幂等的
    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<StatusUpdateResponse>;
}
