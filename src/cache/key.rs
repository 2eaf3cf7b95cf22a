use std::fmt;

/// 分层查询键，按段前缀匹配实现“整族失效”
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// 任务相关查询键
///
/// ```text
/// tasks
/// ├── listing
/// │   ├── today
/// │   └── history
/// └── detail
///     └── byId.<id>
/// ```
pub mod tasks {
    use super::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new(["tasks"])
    }

    pub fn listing() -> QueryKey {
        all().child("listing")
    }

    pub fn today() -> QueryKey {
        listing().child("today")
    }

    pub fn history() -> QueryKey {
        listing().child("history")
    }

    pub fn detail() -> QueryKey {
        all().child("detail")
    }

    pub fn by_id(id: &str) -> QueryKey {
        detail().child("byId").child(id)
    }
}

/// 身份验证查询键
pub mod auth {
    use super::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new(["auth"])
    }

    pub fn check_auth() -> QueryKey {
        all().child("checkAuth")
    }
}
