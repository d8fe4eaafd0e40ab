//! Generation invoker: one structured-output call to the model host.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use regex::Regex;
use serde_json::Value;

use crate::error::TaskError;
use crate::llm::{ChatMessage, ChatOptions, ChatResponse, LlmClient, LlmError, ResponseFormat, RetryConfig};
use crate::prompt::RenderedPrompt;
use crate::schema::{ObjectSchema, OutputContract, Violation, ViolationKind};
use crate::task::TaskDefinition;

/// Deadline for a single model call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const TEMPERATURE: f64 = 0.2;
const GENERIC_SCHEMA_NAME: &str = "task_output";
const GENERIC_SYSTEM_PROMPT: &str =
    "Respond only with a JSON object that matches the requested schema.";

/// What the model produced for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredResponse {
    /// JSON that satisfies the output schema, holding only declared fields.
    Output(Value),
    /// Nothing parseable came back.
    NoOutput,
}

/// Calls the model with a rendered prompt and an output schema.
///
/// Holds no per-call state, so clones share the client and can run
/// concurrently.
#[derive(Clone)]
pub struct GenerationInvoker {
    client: Arc<dyn LlmClient>,
    model: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl GenerationInvoker {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::disabled(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Invoke with a generic instruction.
    pub async fn invoke(
        &self,
        prompt: &RenderedPrompt,
        output: &ObjectSchema,
    ) -> Result<StructuredResponse, TaskError> {
        let contract = OutputContract::compile(output, &[]).map_err(|reason| {
            TaskError::SchemaViolation {
                violations: vec![Violation {
                    path: String::new(),
                    kind: ViolationKind::Rejected { reason },
                }],
            }
        })?;
        self.call(GENERIC_SCHEMA_NAME, GENERIC_SYSTEM_PROMPT, prompt, &contract)
            .await
    }

    /// Invoke with the task's own instruction, schema name and compiled contract.
    pub async fn invoke_task(
        &self,
        task: &TaskDefinition,
        prompt: &RenderedPrompt,
    ) -> Result<StructuredResponse, TaskError> {
        self.call(
            task.name(),
            task.system_prompt(),
            prompt,
            task.output_contract(),
        )
        .await
    }

    async fn call(
        &self,
        schema_name: &str,
        system_prompt: &str,
        prompt: &RenderedPrompt,
        contract: &OutputContract,
    ) -> Result<StructuredResponse, TaskError> {
        let messages = [
            ChatMessage::system(system_prompt),
            ChatMessage::user(prompt.as_str()),
        ];
        let options = ChatOptions {
            temperature: Some(TEMPERATURE),
            max_tokens: None,
            response_format: Some(ResponseFormat::json_schema(
                schema_name,
                contract.document().clone(),
            )),
        };

        tracing::debug!(
            "Invoking model {} for {} (prompt {} bytes)",
            self.model,
            schema_name,
            prompt.as_str().len()
        );

        let response = self.execute_with_retry(&messages, options).await?;

        let Some(content) = response.content.as_deref() else {
            tracing::debug!("Model returned no content (finish_reason={:?})", response.finish_reason);
            return Ok(StructuredResponse::NoOutput);
        };
        tracing::debug!("Model content: {}", content);

        let Some(value) = extract_json(content) else {
            return Ok(StructuredResponse::NoOutput);
        };

        let value = contract
            .check(value)
            .map_err(|violations| TaskError::SchemaViolation { violations })?;

        Ok(StructuredResponse::Output(value))
    }

    /// One model call with the per-call deadline applied.
    async fn attempt(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        match tokio::time::timeout(
            self.timeout,
            self.client
                .chat_completion_with_options(&self.model, messages, options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::timeout(self.timeout)),
        }
    }

    /// Retry transient transport failures with backoff, up to the configured limit.
    async fn execute_with_retry(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            match self.attempt(messages, options.clone()).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!(
                            "Request succeeded after {} retries (total time: {:?})",
                            attempt,
                            start.elapsed()
                        );
                    }
                    return Ok(response);
                }
                Err(error) => {
                    if !self.retry.should_retry(&error, attempt) {
                        if attempt > 0 {
                            tracing::error!(
                                "Request failed after {} retries (total time: {:?}): {}",
                                attempt,
                                start.elapsed(),
                                error
                            );
                        } else {
                            tracing::error!("Request failed: {}", error);
                        }
                        return Err(error);
                    }

                    let remaining = self.retry.budget.saturating_sub(start.elapsed());
                    if remaining.is_zero() {
                        tracing::warn!(
                            "Retry attempt {} failed, no time remaining: {}",
                            attempt + 1,
                            error
                        );
                        return Err(error);
                    }
                    let delay = self.retry.backoff(&error, attempt).min(remaining);

                    tracing::warn!(
                        "Retry attempt {} failed with {}, retrying in {:?}: {}",
                        attempt + 1,
                        error.kind,
                        delay,
                        error.message
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("fence pattern is valid")
    })
}

/// Pull a JSON value out of model text.
///
/// Accepts bare JSON, a fenced code block, or an object surrounded by prose.
/// Returns `None` for empty text, `null`, or anything that does not parse.
pub fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parsed = serde_json::from_str::<Value>(trimmed)
        .ok()
        .or_else(|| {
            fence_pattern()
                .captures(trimmed)
                .and_then(|c| serde_json::from_str(c.get(1)?.as_str()).ok())
        })
        .or_else(|| {
            let start = trimmed.find('{')?;
            let end = trimmed.rfind('}')?;
            serde_json::from_str(trimmed.get(start..=end)?).ok()
        })?;

    (!parsed.is_null()).then_some(parsed)
}
