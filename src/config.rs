//! Configuration management for Due Process AI.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. Your OpenRouter API key.
//! - `OPENROUTER_API_URL` - Optional. Chat completions endpoint. Defaults to OpenRouter.
//! - `DEFAULT_MODEL` - Optional. The model to use. Defaults to `google/gemini-2.0-flash-001`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `LLM_TIMEOUT_SECONDS` - Optional. Deadline for each model call. Defaults to `30`.
//! - `LLM_MAX_RETRIES` - Optional. Retries for transient model failures. Defaults to `0`.
//! - `LLM_RETRY_BUDGET_SECONDS` - Optional. Total time a call may spend retrying. Defaults to `60`.
//! - `TASK_CATALOG_PATH` - Optional. YAML file with extra or replacement tasks.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::llm::OPENROUTER_API_URL;

pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Model host configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    /// Deadline for a single model call
    pub timeout: Duration,
    /// Retries for transient transport failures (0 disables retry)
    pub max_retries: u32,
    /// Upper bound on time spent retrying one call
    pub retry_budget: Duration,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Optional YAML task catalog loaded on top of the built-in tasks
    pub task_catalog_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set,
    /// and `ConfigError::InvalidValue` for unparseable numbers.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("OPENROUTER_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let timeout_secs: u64 = parse_or(&lookup, "LLM_TIMEOUT_SECONDS", 30)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "LLM_TIMEOUT_SECONDS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            llm: LlmConfig {
                api_key,
                api_url: lookup("OPENROUTER_API_URL")
                    .unwrap_or_else(|| OPENROUTER_API_URL.to_string()),
                model: lookup("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout: Duration::from_secs(timeout_secs),
                max_retries: parse_or(&lookup, "LLM_MAX_RETRIES", 0)?,
                retry_budget: Duration::from_secs(parse_or(
                    &lookup,
                    "LLM_RETRY_BUDGET_SECONDS",
                    60,
                )?),
            },
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            task_catalog_path: lookup("TASK_CATALOG_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Address the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("OPENROUTER_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.llm.api_url, OPENROUTER_API_URL);
        assert_eq!(config.llm.timeout, Duration::from_secs(30));
        assert_eq!(config.llm.max_retries, 0);
        assert_eq!(config.llm.retry_budget, Duration::from_secs(60));
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
        assert!(config.task_catalog_path.is_none());
    }

    #[test]
    fn api_key_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingEnvVar(_))));
        assert!(matches!(
            load(&[("OPENROUTER_API_KEY", "  ")]),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("DEFAULT_MODEL", "openai/gpt-4o-mini"),
            ("PORT", "8080"),
            ("HOST", "0.0.0.0"),
            ("LLM_TIMEOUT_SECONDS", "10"),
            ("LLM_MAX_RETRIES", "2"),
            ("LLM_RETRY_BUDGET_SECONDS", "15"),
            ("TASK_CATALOG_PATH", "/etc/due-process/tasks.yaml"),
        ])
        .unwrap();
        assert_eq!(config.llm.model, "openai/gpt-4o-mini");
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.llm.timeout, Duration::from_secs(10));
        assert_eq!(config.llm.max_retries, 2);
        assert_eq!(config.llm.retry_budget, Duration::from_secs(15));
        assert_eq!(
            config.task_catalog_path,
            Some(PathBuf::from("/etc/due-process/tasks.yaml"))
        );
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = load(&[("OPENROUTER_API_KEY", "sk-test"), ("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "PORT"));

        let err = load(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("LLM_TIMEOUT_SECONDS", "0"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("LLM_TIMEOUT_SECONDS"));
    }
}
