//! HTTP API for Due Process AI.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `GET /api/tasks` - List tasks with their input and output JSON Schemas
//! - `POST /api/tasks/:name` - Run a task; the body is the task input
//!
//! A task response body is always either the task's output object or
//! `{"error": "..."}`.

mod routes;
pub mod types;

pub use routes::{build_state, router, serve, AppState};
pub use types::*;
