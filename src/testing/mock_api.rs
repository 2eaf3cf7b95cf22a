//! Mock 后端，用于在不发起 HTTP 请求的情况下测试依赖 [`TaskApi`] 的组件。
//!
//! 每个接口各有一个响应队列，按顺序消费；队列耗尽后返回该接口的默认成功响应：
//!
//! | 接口 | 默认响应 |
//! |------|---------|
//! | `check_auth` | 无用户（未登录） |
//! | `list_tasks` / `list_today_tasks` | 空任务列表 |
//! | `create_task` | 不带任务的确认 |
//! | `update_task_status` | 成功；对已完成任务重复设置同样成功（幂等） |
//!
//! ```rust
//! use tasktracker::api::TaskApi;
//! use tasktracker::error::ApiError;
//! use tasktracker::testing::{ApiCall, MockTaskApi};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let api = MockTaskApi::new()
//!     .with_today_error(ApiError::Network("获取任务失败".to_string()));
//!
//! assert!(api.list_today_tasks().await.is_err());
//! assert!(api.list_today_tasks().await.unwrap().tasks.unwrap().is_empty());
//! assert_eq!(api.calls(), vec![ApiCall::ListTodayTasks, ApiCall::ListTodayTasks]);
//! # }
//! ```

use crate::api::{
    CreateTaskResponse, SessionInfo, SessionUser, StatusUpdateResponse, TaskApi, TasksEnvelope,
};
use crate::error::{ApiError, Result};
use crate::tasks::{NewTaskRequest, RawTask, TaskStatus};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 一次接口调用的记录
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    CheckAuth,
    ListTasks,
    ListTodayTasks,
    CreateTask(NewTaskRequest),
    UpdateTaskStatus { task_id: String, status: TaskStatus },
}

type Script<T> = Arc<Mutex<VecDeque<Result<T>>>>;

/// 可脚本化的 Mock 后端
#[derive(Default)]
pub struct MockTaskApi {
    auth: Script<SessionInfo>,
    tasks: Script<TasksEnvelope>,
    today: Script<TasksEnvelope>,
    creates: Script<CreateTaskResponse>,
    updates: Script<StatusUpdateResponse>,
    calls: Arc<Mutex<Vec<ApiCall>>>,
    /// 每次调用前的人为延迟，用于测试并发合并
    delay: Option<Duration>,
}

fn push<T>(script: &Script<T>, response: Result<T>) {
    script.lock().unwrap().push_back(response);
}

fn next<T>(script: &Script<T>, default: impl FnOnce() -> T) -> Result<T> {
    script.lock().unwrap().pop_front().unwrap_or_else(|| Ok(default()))
}

impl MockTaskApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 追加一次已登录响应
    pub fn with_user(self, user: SessionUser) -> Self {
        push(
            &self.auth,
            Ok(SessionInfo {
                user: Some(user),
                error: None,
            }),
        );
        self
    }

    /// 追加一次 200 但带 `error` 的身份验证响应
    pub fn with_auth_denied(self, message: impl Into<String>) -> Self {
        push(
            &self.auth,
            Ok(SessionInfo {
                user: None,
                error: Some(message.into()),
            }),
        );
        self
    }

    pub fn with_auth_error(self, err: ApiError) -> Self {
        push(&self.auth, Err(err.into()));
        self
    }

    pub fn with_tasks(self, tasks: Vec<RawTask>) -> Self {
        push(&self.tasks, Ok(TasksEnvelope::new(tasks)));
        self
    }

    pub fn with_tasks_error(self, err: ApiError) -> Self {
        push(&self.tasks, Err(err.into()));
        self
    }

    pub fn with_today_tasks(self, tasks: Vec<RawTask>) -> Self {
        push(&self.today, Ok(TasksEnvelope::new(tasks)));
        self
    }

    pub fn with_today_error(self, err: ApiError) -> Self {
        push(&self.today, Err(err.into()));
        self
    }

    /// 追加一次创建成功响应，可带回新建的任务
    pub fn with_created(self, task: Option<RawTask>) -> Self {
        push(
            &self.creates,
            Ok(CreateTaskResponse {
                task,
                message: Some("任务已创建".to_string()),
            }),
        );
        self
    }

    pub fn with_create_error(self, err: ApiError) -> Self {
        push(&self.creates, Err(err.into()));
        self
    }

    pub fn with_update_error(self, err: ApiError) -> Self {
        push(&self.updates, Err(err.into()));
        self
    }

    /// 已发生的调用总次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// 满足条件的调用次数
    pub fn count_calls(&self, matches: impl Fn(&ApiCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    /// 所有历史调用（按时序排列）
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Option<ApiCall> {
        self.calls.lock().unwrap().last().cloned()
    }

    async fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TaskApi for MockTaskApi {
    async fn check_auth(&self) -> Result<SessionInfo> {
        self.record(ApiCall::CheckAuth).await;
        next(&self.auth, SessionInfo::default)
    }

    async fn list_tasks(&self) -> Result<TasksEnvelope> {
        self.record(ApiCall::ListTasks).await;
        next(&self.tasks, || TasksEnvelope::new(Vec::new()))
    }

    async fn list_today_tasks(&self) -> Result<TasksEnvelope> {
        self.record(ApiCall::ListTodayTasks).await;
        next(&self.today, || TasksEnvelope::new(Vec::new()))
    }

    async fn create_task(&self, request: &NewTaskRequest) -> Result<CreateTaskResponse> {
        self.record(ApiCall::CreateTask(request.clone())).await;
        next(&self.creates, CreateTaskResponse::default)
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<StatusUpdateResponse> {
        self.record(ApiCall::UpdateTaskStatus {
            task_id: task_id.to_string(),
            status,
        })
        .await;
        next(&self.updates, || StatusUpdateResponse {
            message: Some(format!("任务状态已更新为 {}", status)),
        })
    }
}
