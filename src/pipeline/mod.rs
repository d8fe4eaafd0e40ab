//! The generic task pipeline.
//!
//! ```text
//! raw JSON ──► TaskDispatcher ──► validate ──► short-circuit? ──────────────┐
//!                                   │                                        │
//!                                   ▼                                        ▼
//!                                render ──► GenerationInvoker ──► normalize ──► DispatchResponse
//! ```
//!
//! Every task runs through the same steps; only its [`TaskDefinition`]
//! differs.
//!
//! [`TaskDefinition`]: crate::task::TaskDefinition

mod dispatcher;
mod invoker;
mod normalize;

pub use dispatcher::{DispatchError, DispatchResponse, DispatchRun, DispatchState, TaskDispatcher};
pub use invoker::{extract_json, GenerationInvoker, StructuredResponse, DEFAULT_TIMEOUT};
pub use normalize::{normalize, short_circuited, NormalizedOutput};
