//! 客户端配置加载
//!
//! 支持两种来源：
//!
//! - 环境变量（会先读取 `.env`）：
//!   ```text
//!   TASKTRACKER_BASE_URL=http://localhost:8080
//!   TASKTRACKER_TIMEOUT_SECS=30
//!   TASKTRACKER_SESSION_COOKIE=token=eyJhbGciOi...
//!   ```
//! - YAML 文件，字段名与 [`ClientConfig`] 一致。

use crate::error::{ConfigError, Result};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

const ENV_BASE_URL: &str = "TASKTRACKER_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "TASKTRACKER_TIMEOUT_SECS";
const ENV_SESSION_COOKIE: &str = "TASKTRACKER_SESSION_COOKIE";

/// 后端连接配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClientConfig {
    /// 后端根地址，接口路径 `/api/v1/...` 拼接在其后
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 单次请求超时（秒）。`None` = 使用传输层默认值（不限制）
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// 预置会话 Cookie（`name=value`），写入 base_url 对应的 Cookie Jar
    #[serde(default)]
    pub session_cookie: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
            session_cookie: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// 从 YAML 文件加载
    pub fn load(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        let config: ClientConfig = serde_yaml::from_reader(file)?;
        config.validated()
    }

    /// 从环境变量加载，未设置的项使用默认值
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_BASE_URL) {
            config.base_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    field: ENV_TIMEOUT_SECS.to_string(),
                    message: e.to_string(),
                })?;
            config.timeout_secs = Some(secs);
        }
        if let Some(cookie) = lookup(ENV_SESSION_COOKIE) {
            if !cookie.trim().is_empty() {
                config.session_cookie = Some(cookie);
            }
        }

        config.validated()
    }

    /// 覆盖后端地址（命令行参数优先于文件与环境变量）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self> {
        self.base_url = base_url.into();
        self.validated()
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// 拼接接口完整 URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn validated(self) -> Result<Self> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "base_url".to_string(),
                message: format!("必须以 http:// 或 https:// 开头: {}", self.base_url),
            }
            .into());
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs".to_string(),
                message: "超时必须大于 0".to_string(),
            }
            .into());
        }
        if let Some(cookie) = &self.session_cookie {
            if !cookie.contains('=') {
                return Err(ConfigError::InvalidValue {
                    field: "session_cookie".to_string(),
                    message: "格式应为 name=value".to_string(),
                }
                .into());
            }
        }
        Ok(self)
    }
}
