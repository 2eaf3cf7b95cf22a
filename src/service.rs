//! 任务服务：查询与变更处理
//!
//! 所有读取经由 [`QueryCache`]，在网络边界上完成水合；变更成功后使相关缓存失效。
//!
//! | 查询 | 键 | 过期窗口 |
//! |------|----|---------|
//! | 全部任务 | `tasks.listing` | 无（每次读取都重新验证） |
//! | 今日任务 | `tasks.listing.today` | 15 分钟 |
//! | 身份验证 | `auth.checkAuth` | 5 分钟 |
//!
//! 所有查询都不重试，失败直接交给调用方展示。

use crate::api::{SessionUser, TaskApi, fallback};
use crate::cache::{QueryCache, QueryOptions, key};
use crate::error::{Result, TrackerError};
use crate::tasks::{Completion, DailySchedule, Hydrate, Task, TaskForm, TaskStatus};
use chrono::{DateTime, Duration, TimeZone};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TODAY_STALE_MINUTES: i64 = 15;
pub const AUTH_STALE_MINUTES: i64 = 5;

pub fn all_tasks_options() -> QueryOptions {
    QueryOptions::new(key::tasks::listing())
}

pub fn today_tasks_options() -> QueryOptions {
    QueryOptions::new(key::tasks::today()).stale_time(Duration::minutes(TODAY_STALE_MINUTES))
}

pub fn check_auth_options() -> QueryOptions {
    QueryOptions::new(key::auth::check_auth())
        .stale_time(Duration::minutes(AUTH_STALE_MINUTES))
        .retry(0)
}

/// 当前会话状态
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Authenticated(SessionUser),
    /// 附带未登录原因，直接展示给用户
    Unauthenticated(String),
}

impl AuthState {
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            AuthState::Unauthenticated(_) => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }
}

/// 视图模型的服务层，持有后端接口与缓存实例
#[derive(Clone)]
pub struct TaskService {
    api: Arc<dyn TaskApi>,
    cache: QueryCache,
}

impl TaskService {
    pub fn new(api: Arc<dyn TaskApi>, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// 查询会话状态；任何失败都视为未登录
    pub async fn check_auth(&self) -> AuthState {
        let api = Arc::clone(&self.api);
        let result = self
            .cache
            .fetch(&check_auth_options(), move || {
                let api = Arc::clone(&api);
                async move { api.check_auth().await }
            })
            .await;

        match result {
            Ok(info) => match (&info.user, &info.error) {
                (Some(user), None) => AuthState::Authenticated(user.clone()),
                (_, Some(reason)) => AuthState::Unauthenticated(reason.clone()),
                (None, None) => AuthState::Unauthenticated(fallback::CHECK_AUTH.to_string()),
            },
            Err(TrackerError::Api(e)) => AuthState::Unauthenticated(e.user_message().to_string()),
            Err(e) => AuthState::Unauthenticated(e.to_string()),
        }
    }

    pub async fn all_tasks(&self) -> Result<Arc<Vec<Task>>> {
        let api = Arc::clone(&self.api);
        self.cache
            .fetch(&all_tasks_options(), move || {
                let api = Arc::clone(&api);
                async move { api.list_tasks().await?.hydrate() }
            })
            .await
    }

    pub async fn today_tasks(&self) -> Result<Arc<Vec<Task>>> {
        let api = Arc::clone(&self.api);
        self.cache
            .fetch(&today_tasks_options(), move || {
                let api = Arc::clone(&api);
                async move { api.list_today_tasks().await?.hydrate() }
            })
            .await
    }

    /// 今日任务按 `now` 所在时区分入 24 个小时槽位
    pub async fn today_schedule<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DailySchedule> {
        let tasks = self.today_tasks().await?;
        Ok(DailySchedule::build(&tasks, now))
    }

    /// 提交新建任务
    ///
    /// 表单时刻按 `now` 所在日期与时区换算。校验失败时不发请求；请求失败时保留表单内容。
    /// 成功后清空表单并使任务列表族失效，若后端带回了新建任务则返回它。
    pub async fn create_task<Tz: TimeZone>(
        &self,
        form: &mut TaskForm,
        now: &DateTime<Tz>,
    ) -> Result<Option<Task>> {
        let request = form.validate(now)?;

        let response = match self.api.create_task(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(title = %request.title, error = %e, "创建任务失败");
                return Err(e);
            }
        };

        let invalidated = self.cache.invalidate(&key::tasks::listing());
        form.reset();
        info!(title = %request.title, invalidated, "任务已创建");

        // 任务已经创建成功，带回的数据无法解析不影响结果
        match response.task.map(Hydrate::hydrate).transpose() {
            Ok(task) => Ok(task),
            Err(e) => {
                warn!(error = %e, "新建任务数据无法解析");
                Ok(None)
            }
        }
    }

    /// 完成任务：pending → completed
    ///
    /// 已完成的任务直接返回 [`Completion::AlreadyCompleted`]，不发请求。成功后本地任务同步
    /// 标记为完成，并使今日列表与该任务详情失效。
    pub async fn complete_task(&self, task: &mut Task) -> Result<Completion> {
        if !task.can_complete() {
            debug!(task_id = %task.id, "任务已完成，忽略");
            return Ok(Completion::AlreadyCompleted);
        }

        self.submit_completion(&task.id).await?;
        Ok(task.mark_completed(self.cache.now().fixed_offset()))
    }

    /// 按 id 完成任务，先在今日任务与全部任务中查找它的当前状态
    pub async fn complete_task_by_id(&self, task_id: &str) -> Result<Completion> {
        match self.find_task(task_id).await? {
            Some(mut task) => self.complete_task(&mut task).await,
            None => {
                // 本地查不到时交给后端裁决
                self.submit_completion(task_id).await?;
                Ok(Completion::Applied)
            }
        }
    }

    async fn find_task(&self, task_id: &str) -> Result<Option<Task>> {
        let today = self.today_tasks().await?;
        if let Some(task) = today.iter().find(|t| t.id == task_id) {
            return Ok(Some(task.clone()));
        }
        let all = self.all_tasks().await?;
        Ok(all.iter().find(|t| t.id == task_id).cloned())
    }

    async fn submit_completion(&self, task_id: &str) -> Result<()> {
        if let Err(e) = self
            .api
            .update_task_status(task_id, TaskStatus::Completed)
            .await
        {
            warn!(task_id, error = %e, "标记任务完成失败");
            return Err(e);
        }

        self.cache.invalidate(&key::tasks::today());
        self.cache.invalidate(&key::tasks::by_id(task_id));
        info!(task_id, "任务已完成");
        Ok(())
    }
}
