//! Task dispatcher: the single entry point for running a task.
//!
//! Nothing fails past [`TaskDispatcher::dispatch`]. Every [`TaskError`] is
//! turned into an `{"error": "..."}` body there.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use super::invoker::GenerationInvoker;
use super::normalize::{normalize, short_circuited, NormalizedOutput};
use crate::error::TaskError;
use crate::task::TaskRegistry;

/// Stage of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Idle,
    Validating,
    ShortCircuited,
    Rendering,
    Invoking,
    Normalizing,
    Done,
    Failed,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Idle => "idle",
            DispatchState::Validating => "validating",
            DispatchState::ShortCircuited => "short_circuited",
            DispatchState::Rendering => "rendering",
            DispatchState::Invoking => "invoking",
            DispatchState::Normalizing => "normalizing",
            DispatchState::Done => "done",
            DispatchState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Record of one dispatch: the states it passed through and its outcome.
#[derive(Debug)]
pub struct DispatchRun {
    pub task: String,
    pub transitions: Vec<DispatchState>,
    pub result: Result<NormalizedOutput, TaskError>,
}

impl DispatchRun {
    /// State the run ended in.
    pub fn state(&self) -> DispatchState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(DispatchState::Idle)
    }

    pub fn into_response(self) -> DispatchResponse {
        DispatchResponse::from(self.result)
    }
}

/// `{"error": "..."}` body returned for any failed dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchError {
    pub error: String,
    #[serde(skip)]
    pub status: StatusCode,
}

/// Caller-facing result: the output object itself, or an error body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DispatchResponse {
    Output(NormalizedOutput),
    Error(DispatchError),
}

impl DispatchResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchResponse::Output(_) => StatusCode::OK,
            DispatchResponse::Error(e) => e.status,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DispatchResponse::Error(_))
    }

    pub fn to_value(&self) -> Value {
        match self {
            DispatchResponse::Output(output) => output.as_value().clone(),
            DispatchResponse::Error(e) => serde_json::json!({ "error": e.error }),
        }
    }
}

impl From<TaskError> for DispatchResponse {
    fn from(err: TaskError) -> Self {
        DispatchResponse::Error(DispatchError {
            error: err.user_message(),
            status: err.http_status(),
        })
    }
}

impl From<Result<NormalizedOutput, TaskError>> for DispatchResponse {
    fn from(result: Result<NormalizedOutput, TaskError>) -> Self {
        match result {
            Ok(output) => DispatchResponse::Output(output),
            Err(err) => err.into(),
        }
    }
}

/// Runs tasks by name: look up, validate, short-circuit, render, invoke,
/// normalize.
///
/// Holds only shared immutable state, so it is cheap to clone into handlers.
#[derive(Clone)]
pub struct TaskDispatcher {
    registry: Arc<TaskRegistry>,
    invoker: GenerationInvoker,
}

impl TaskDispatcher {
    pub fn new(registry: Arc<TaskRegistry>, invoker: GenerationInvoker) -> Self {
        Self { registry, invoker }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn invoker(&self) -> &GenerationInvoker {
        &self.invoker
    }

    /// Run a task and return the caller-facing response.
    pub async fn dispatch(&self, name: &str, raw_input: &Value) -> DispatchResponse {
        self.run(name, raw_input).await.into_response()
    }

    /// Run a task, keeping the full record of the run.
    pub async fn run(&self, name: &str, raw_input: &Value) -> DispatchRun {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("dispatch", task = %name, request_id = %request_id);
        self.run_inner(name, raw_input).instrument(span).await
    }

    async fn run_inner(&self, name: &str, raw_input: &Value) -> DispatchRun {
        let start = Instant::now();
        let mut transitions = vec![DispatchState::Idle];
        let result = self.execute(name, raw_input, &mut transitions).await;

        match &result {
            Ok(_) => {
                advance(&mut transitions, DispatchState::Done);
                tracing::info!("Task {} completed in {:?}", name, start.elapsed());
            }
            Err(err) => {
                advance(&mut transitions, DispatchState::Failed);
                tracing::warn!(
                    "Task {} failed ({}) in {:?}: {}",
                    name,
                    err.code(),
                    start.elapsed(),
                    err
                );
            }
        }

        DispatchRun {
            task: name.to_string(),
            transitions,
            result,
        }
    }

    async fn execute(
        &self,
        name: &str,
        raw_input: &Value,
        transitions: &mut Vec<DispatchState>,
    ) -> Result<NormalizedOutput, TaskError> {
        let task = self.registry.get(name)?;

        advance(transitions, DispatchState::Validating);
        let input = task
            .validate_input(raw_input)
            .map_err(|violations| TaskError::Validation { violations })?;

        if let Some(output) = short_circuited(&task, &input) {
            advance(transitions, DispatchState::ShortCircuited);
            tracing::info!("Task {} short-circuited without a model call", name);
            return Ok(output);
        }

        advance(transitions, DispatchState::Rendering);
        let prompt = task.template().render(&input);

        advance(transitions, DispatchState::Invoking);
        let response = self.invoker.invoke_task(&task, &prompt).await?;

        advance(transitions, DispatchState::Normalizing);
        normalize(response, &task)
    }
}

fn advance(transitions: &mut Vec<DispatchState>, next: DispatchState) {
    if let Some(current) = transitions.last() {
        tracing::debug!("{} -> {}", current, next);
    }
    transitions.push(next);
}
