use std::fmt;

/// tasktracker 客户端的统一错误类型
///
/// 只携带字符串等可克隆数据，以便同一次请求的结果能被所有合并等待者共享。
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// 后端接口错误（网络失败或非 2xx 响应）
    Api(ApiError),
    /// 表单校验失败，提交前拦截
    Validation(ValidationErrors),
    /// 线上数据转换为强类型任务失败
    Hydration(HydrationError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误
    Other(String),
}

/// 后端接口错误
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 请求未完成（连接失败、超时等）
    Network(String),
    /// 后端返回非 2xx 状态码，`message` 为服务端 `error` 字段或本地化兜底文案
    Status { status: u16, message: String },
    /// 响应体无法解析
    InvalidResponse(String),
}

/// 单个表单字段的校验错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// 表单校验错误集合，至少包含一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

/// 数据水合错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HydrationError {
    /// 必需的时间字段缺失
    MissingField(&'static str),
    /// 时间字段格式无效
    InvalidTimestamp { field: &'static str, value: String },
    /// 字段取值超出范围
    OutOfRange { field: &'static str, value: String },
}

/// 配置错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),
    /// 配置解析失败
    ParseFailed(String),
    /// 配置值无效
    InvalidValue { field: String, message: String },
}

impl ValidationErrors {
    /// 查找某个字段的第一条错误信息
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|e| e.field).collect()
    }
}

impl ApiError {
    /// 面向用户展示的信息
    pub fn user_message(&self) -> &str {
        match self {
            ApiError::Network(msg) | ApiError::InvalidResponse(msg) => msg,
            ApiError::Status { message, .. } => message,
        }
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::Api(e) => write!(f, "API Error: {}", e),
            TrackerError::Validation(e) => write!(f, "Validation Error: {}", e),
            TrackerError::Hydration(e) => write!(f, "Hydration Error: {}", e),
            TrackerError::Config(e) => write!(f, "Config Error: {}", e),
            TrackerError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Status { status, message } => {
                write!(f, "status {}: {}", status, message)
            }
            ApiError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl fmt::Display for HydrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HydrationError::MissingField(field) => write!(f, "Missing field: {}", field),
            HydrationError::InvalidTimestamp { field, value } => {
                write!(f, "Invalid timestamp for '{}': {}", field, value)
            }
            HydrationError::OutOfRange { field, value } => {
                write!(f, "Value out of range for '{}': {}", field, value)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseFailed(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid config value for '{}': {}", field, message)
            }
        }
    }
}

impl std::error::Error for TrackerError {}
impl std::error::Error for ApiError {}
impl std::error::Error for ValidationErrors {}
impl std::error::Error for HydrationError {}
impl std::error::Error for ConfigError {}

// From 转换实现
impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TrackerError::Api(ApiError::Network("请求超时".to_string()))
        } else if err.is_connect() {
            TrackerError::Api(ApiError::Network(format!("连接失败: {}", err)))
        } else if err.is_decode() {
            TrackerError::Api(ApiError::InvalidResponse(err.to_string()))
        } else {
            TrackerError::Api(ApiError::Network(err.to_string()))
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Api(ApiError::InvalidResponse(err.to_string()))
    }
}

impl From<serde_yaml::Error> for TrackerError {
    fn from(err: serde_yaml::Error) -> Self {
        TrackerError::Config(ConfigError::ParseFailed(err.to_string()))
    }
}

impl From<ApiError> for TrackerError {
    fn from(err: ApiError) -> Self {
        TrackerError::Api(err)
    }
}

impl From<ValidationErrors> for TrackerError {
    fn from(err: ValidationErrors) -> Self {
        TrackerError::Validation(err)
    }
}

impl From<HydrationError> for TrackerError {
    fn from(err: HydrationError) -> Self {
        TrackerError::Hydration(err)
    }
}

impl From<ConfigError> for TrackerError {
    fn from(err: ConfigError) -> Self {
        TrackerError::Config(err)
    }
}

// 便捷的 Result 类型别名
pub type Result<T> = std::result::Result<T, TrackerError>;
