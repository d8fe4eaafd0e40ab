//! Response normalization: overrides, fallbacks and short-circuit outputs.

use serde::Serialize;
use serde_json::Value;

use super::invoker::StructuredResponse;
use crate::error::TaskError;
use crate::schema::ValidatedInput;
use crate::task::{MissingOutput, TaskDefinition};

/// Final output of a task, with every override applied.
///
/// Built only here, so every value returned to a caller has been through
/// [`TaskDefinition::finish`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedOutput(Value);

impl NormalizedOutput {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Turn a model response into the caller-facing output.
pub fn normalize(
    response: StructuredResponse,
    task: &TaskDefinition,
) -> Result<NormalizedOutput, TaskError> {
    match response {
        StructuredResponse::Output(value) => Ok(NormalizedOutput(task.finish(value))),
        StructuredResponse::NoOutput => match task.missing_output() {
            MissingOutput::Fallback(value) => {
                tracing::warn!("Model returned no output for {}, using fallback", task.name());
                Ok(NormalizedOutput(task.finish(value.clone())))
            }
            MissingOutput::Fail => Err(TaskError::GenerationFailed {
                task: task.name().to_string(),
            }),
        },
    }
}

/// The task's canned output for this input, if its short-circuit applies.
pub fn short_circuited(task: &TaskDefinition, input: &ValidatedInput) -> Option<NormalizedOutput> {
    task.short_circuit(input)
        .map(|response| NormalizedOutput(task.finish(response.clone())))
}
