//! 后端接口的请求/响应结构

use crate::error::Result;
use crate::tasks::{Hydrate, RawTask, Task, TaskStatus};
use serde::{Deserialize, Serialize};

/// `GET /api/v1/tasks` 与 `GET /api/v1/tasks/today` 的响应
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasksEnvelope {
    /// 后端在没有任务时可能返回 `null`
    #[serde(default)]
    pub tasks: Option<Vec<RawTask>>,
    /// 仅 today 接口返回，`YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl TasksEnvelope {
    pub fn new(tasks: Vec<RawTask>) -> Self {
        Self {
            tasks: Some(tasks),
            date: None,
        }
    }

    /// 网络边界上的唯一一次水合
    pub fn hydrate(self) -> Result<Vec<Task>> {
        self.tasks
            .unwrap_or_default()
            .into_iter()
            .map(|raw| raw.hydrate().map_err(Into::into))
            .collect()
    }
}

/// 非 2xx 响应体
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// 已登录用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub role: String,
}

/// `GET /api/v1/check-auth` 的响应，成功为 `{ user }`，失败为 `{ error }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /api/v1/tasks` 的响应，可能带回新建任务，也可能只是确认
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    #[serde(default)]
    pub task: Option<RawTask>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `PUT /api/v1/tasks/{id}` 的请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub status: TaskStatus,
}

/// `PUT /api/v1/tasks/{id}` 的响应
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdateResponse {
    #[serde(default)]
    pub message: Option<String>,
}
