//! API request and response types.

use serde::Serialize;

use crate::task::TaskInfo;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Model every task is sent to
    pub model: String,

    /// Number of registered tasks
    pub task_count: usize,
}

/// Response for `GET /api/tasks`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskInfo>,
}
