//! # Due Process AI
//!
//! Structured generation service behind a set of legal self-help tools.
//!
//! Each tool is a *task*: an input schema, an output schema, a prompt
//! template, and a few post-processing rules (fixed disclaimers, fallbacks,
//! short-circuits). One generic pipeline runs every task against a hosted
//! model that is asked to answer in the output schema's shape.
//!
//! ## Architecture
//!
//! ```text
//!   POST /api/tasks/:name
//!            │
//!            ▼
//!   ┌──────────────────┐    ┌──────────────┐
//!   │  TaskDispatcher  │───►│ TaskRegistry │  name → TaskDefinition
//!   └────────┬─────────┘    └──────────────┘
//!            │ validate, short-circuit
//!            ▼
//!   ┌──────────────────┐
//!   │  PromptTemplate  │  ValidatedInput → RenderedPrompt
//!   └────────┬─────────┘
//!            ▼
//!   ┌───────────────────┐    ┌───────────┐
//!   │ GenerationInvoker │───►│ LlmClient │  json_schema response_format
//!   └────────┬──────────┘    └───────────┘
//!            ▼
//!   ┌──────────────────┐
//!   │    normalize     │  overrides, fallback
//!   └────────┬─────────┘
//!            ▼
//!     output object or {"error": "..."}
//! ```
//!
//! ## Modules
//! - `schema`: field schemas, validation, JSON Schema export
//! - `prompt`: template parsing and rendering
//! - `task`: task definitions, built-in catalog, registry
//! - `pipeline`: invoker, normalizer, dispatcher
//! - `llm`: model host client
//! - `api`: HTTP surface

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod task;

pub use config::Config;
pub use error::TaskError;
pub use pipeline::{DispatchResponse, TaskDispatcher};
pub use task::{TaskDefinition, TaskRegistry};
