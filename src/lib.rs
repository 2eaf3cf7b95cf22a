pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod service;
pub mod tasks;
pub mod testing;

pub mod prelude {
    pub use crate::api::{HttpTaskApi, TaskApi};
    pub use crate::cache::{QueryCache, QueryKey, QueryOptions};
    pub use crate::config::ClientConfig;
    pub use crate::error::{Result, TrackerError};
    pub use crate::service::{AuthState, TaskService};
    pub use crate::tasks::{Completion, DailySchedule, Task, TaskForm, TaskStatus};
}
