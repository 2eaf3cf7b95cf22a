use crate::api::types::{
    CreateTaskResponse, ErrorBody, SessionInfo, StatusUpdate, StatusUpdateResponse,
    TasksEnvelope,
};
use crate::api::{
    CHECK_AUTH_PATH, TASKS_PATH, TODAY_TASKS_PATH, TaskApi, fallback, task_path,
};
use crate::config::ClientConfig;
use crate::error::{ApiError, ConfigError, Result};
use crate::tasks::{NewTaskRequest, TaskStatus};
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// 基于 reqwest 的后端客户端
///
/// 会话凭据走 Cookie：所有请求共享同一个 Cookie Jar，不在请求头里显式传 token。
pub struct HttpTaskApi {
    client: Client,
    config: ClientConfig,
}

impl HttpTaskApi {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        if let Some(cookie) = &config.session_cookie {
            let url: Url = config.base_url.parse().map_err(|e| ConfigError::InvalidValue {
                field: "base_url".to_string(),
                message: format!("{}", e),
            })?;
            jar.add_cookie_str(cookie, &url);
        }

        let mut builder = Client::builder().cookie_provider(jar);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        fallback_message: &str,
    ) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "请求未完成");
            ApiError::Network(fallback_message.to_string())
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            warn!(error = %e, status, "读取响应体失败");
            ApiError::Network(fallback_message.to_string())
        })?;
        debug!(status, bytes = body.len(), "收到响应");

        decode_body(status, &body, fallback_message)
    }
}

/// 按状态码解析响应体：2xx 解析为 `T`，否则取服务端 `error` 字段或兜底文案
pub(crate) fn decode_body<T: DeserializeOwned>(
    status: u16,
    body: &str,
    fallback_message: &str,
) -> Result<T> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback_message.to_string());
        return Err(ApiError::Status { status, message }.into());
    }

    serde_json::from_str(body).map_err(|e| ApiError::InvalidResponse(e.to_string()).into())
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn check_auth(&self) -> Result<SessionInfo> {
        let url = self.config.endpoint(CHECK_AUTH_PATH);
        debug!(%url, "GET check-auth");
        self.send(self.client.get(url), fallback::CHECK_AUTH).await
    }

    async fn list_tasks(&self) -> Result<TasksEnvelope> {
        let url = self.config.endpoint(TASKS_PATH);
        debug!(%url, "GET tasks");
        self.send(self.client.get(url), fallback::LIST_TASKS).await
    }

    async fn list_today_tasks(&self) -> Result<TasksEnvelope> {
        let url = self.config.endpoint(TODAY_TASKS_PATH);
        debug!(%url, "GET today's tasks");
        self.send(self.client.get(url), fallback::LIST_TASKS).await
    }

    async fn create_task(&self, request: &NewTaskRequest) -> Result<CreateTaskResponse> {
        let url = self.config.endpoint(TASKS_PATH);
        debug!(%url, title = %request.title, "POST task");
        self.send(self.client.post(url).json(request), fallback::CREATE_TASK)
            .await
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<StatusUpdateResponse> {
        let url = self.config.endpoint(&task_path(task_id));
        debug!(%url, %status, "PUT task status");
        let body = StatusUpdate { status };
        self.send(self.client.put(url).json(&body), fallback::COMPLETE_TASK)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;

    #[test]
    fn test_decode_success() {
        let info: SessionInfo =
            decode_body(200, r#"{"user":{"id":"u1","username":"a"}}"#, "x").unwrap();
        assert_eq!(info.user.unwrap().id, "u1");
    }

    #[test]
    fn test_decode_server_error_message_verbatim() {
        let err = decode_body::<TasksEnvelope>(404, r#"{"error":"Tarea no encontrada"}"#, "兜底")
            .unwrap_err();
        assert_eq!(
            err,
            TrackerError::Api(ApiError::Status {
                status: 404,
                message: "Tarea no encontrada".to_string()
            })
        );
    }

    #[test]
    fn test_decode_error_without_message_uses_fallback() {
        for body in ["", "<html>502</html>", r#"{"error":""}"#, "{}"] {
            let err = decode_body::<TasksEnvelope>(502, body, fallback::LIST_TASKS).unwrap_err();
            match err {
                TrackerError::Api(api) => assert_eq!(api.user_message(), fallback::LIST_TASKS),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_decode_invalid_success_body() {
        let err = decode_body::<TasksEnvelope>(200, "not json", "x").unwrap_err();
        assert!(matches!(err, TrackerError::Api(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_client_builds_with_cookie_and_timeout() {
        let config = ClientConfig::new("http://localhost:8080")
            .with_timeout_secs(3)
            .with_session_cookie("token=abc");
        let api = HttpTaskApi::new(config).unwrap();
        assert_eq!(api.config().timeout_secs, Some(3));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // 端口 9 (discard) 通常没有监听，连接会被拒绝
        let api = HttpTaskApi::new(ClientConfig::new("http://127.0.0.1:9").with_timeout_secs(2))
            .unwrap();
        let err = api.list_today_tasks().await.unwrap_err();
        assert_eq!(
            err,
            TrackerError::Api(ApiError::Network(fallback::LIST_TASKS.to_string()))
        );
    }
}
