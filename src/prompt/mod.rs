//! Prompt binding: turns validated task input into the text sent to the model.
//!
//! Templates use `{{field}}` placeholders plus `{{#if}}` and `{{#each}}`
//! blocks:
//!
//! ```text
//! Case details:
//! {{caseDetails}}
//! {{#if jurisdiction}}
//! Jurisdiction: {{jurisdiction}}
//! {{/if}}
//! {{#each events}}
//! - {{date}} ({{eventType}}): {{description}}
//! {{/each}}
//! ```

mod template;

pub use template::{PromptTemplate, RenderedPrompt, TemplateError};
