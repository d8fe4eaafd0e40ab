//! Task definitions: the per-task contract between caller, template and model.
//!
//! A [`TaskSpec`] is the declarative form (built in Rust or loaded from YAML).
//! [`TaskDefinition::compile`] checks it once and produces the immutable value
//! the pipeline runs against.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::prompt::{PromptTemplate, TemplateError};
use crate::schema::{describe_violations, ObjectSchema, OutputContract, ValidatedInput, Violation};

/// A fixed value forced into every output of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputOverride {
    /// `output[field] = value`, whatever the model said.
    Replace { field: String, value: Value },
    /// Append `text` to a string field unless it already ends with it.
    EnsureSuffix { field: String, text: String },
}

impl OutputOverride {
    pub fn field(&self) -> &str {
        match self {
            OutputOverride::Replace { field, .. } | OutputOverride::EnsureSuffix { field, .. } => {
                field
            }
        }
    }

    /// Apply this override to an output object in place.
    pub fn apply(&self, output: &mut Map<String, Value>) {
        match self {
            OutputOverride::Replace { field, value } => {
                output.insert(field.clone(), value.clone());
            }
            OutputOverride::EnsureSuffix { field, text } => {
                let updated = match output.get(field).and_then(Value::as_str) {
                    Some(current) if current.trim_end().ends_with(text.as_str()) => return,
                    Some(current) if !current.trim().is_empty() => {
                        format!("{}\n\n{}", current.trim_end(), text)
                    }
                    _ => text.clone(),
                };
                output.insert(field.clone(), Value::String(updated));
            }
        }
    }
}

/// What to return when the model produces no usable output.
#[derive(Debug, Clone, PartialEq)]
pub enum MissingOutput {
    /// Surface a generation failure to the caller.
    Fail,
    /// Return this object instead (overrides still apply).
    Fallback(Value),
}

/// Input condition that makes a model call pointless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShortCircuitCondition {
    /// The array field is absent or has no elements.
    EmptyArray { field: String },
    /// The string field is absent or only whitespace.
    BlankString { field: String },
    /// The field is absent.
    MissingField { field: String },
}

impl ShortCircuitCondition {
    pub fn field(&self) -> &str {
        match self {
            ShortCircuitCondition::EmptyArray { field }
            | ShortCircuitCondition::BlankString { field }
            | ShortCircuitCondition::MissingField { field } => field,
        }
    }

    pub fn holds(&self, input: &ValidatedInput) -> bool {
        let value = input.get(self.field());
        match self {
            ShortCircuitCondition::EmptyArray { .. } => {
                value.and_then(Value::as_array).map_or(true, Vec::is_empty)
            }
            ShortCircuitCondition::BlankString { .. } => value
                .and_then(Value::as_str)
                .map_or(true, |s| s.trim().is_empty()),
            ShortCircuitCondition::MissingField { .. } => value.is_none(),
        }
    }
}

/// A canned response returned without calling the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortCircuit {
    pub when: ShortCircuitCondition,
    pub response: Value,
}

/// Declarative task description, as written in a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Instruction sent as the system message; a generic one is used if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub input: ObjectSchema,
    pub output: ObjectSchema,
    pub template: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<OutputOverride>,
    /// Object returned when the model gives nothing usable. Unset means the
    /// dispatch fails instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_circuit: Option<ShortCircuit>,
}

/// Reasons a [`TaskSpec`] cannot become a [`TaskDefinition`].
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("task name must not be empty")]
    EmptyName,

    #[error("task {task}: {schema} schema declares field {field} more than once")]
    DuplicateField {
        task: String,
        schema: &'static str,
        field: String,
    },

    #[error("task {task}: template error: {source}")]
    Template {
        task: String,
        #[source]
        source: TemplateError,
    },

    #[error("task {task}: override targets undeclared output field {field}")]
    UnknownOverrideField { task: String, field: String },

    #[error("task {task}: short-circuit checks undeclared input field {field}")]
    UnknownShortCircuitField { task: String, field: String },

    #[error("task {task}: output schema does not compile: {message}")]
    OutputContract { task: String, message: String },

    #[error("task {task}: {what} does not match the output schema: {}", describe_violations(.violations))]
    InvalidCannedOutput {
        task: String,
        what: &'static str,
        violations: Vec<Violation>,
    },
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a careful legal information assistant. \
Respond only with a JSON object that matches the requested schema.";

/// A checked, immutable task.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    name: String,
    description: String,
    system_prompt: String,
    input: ObjectSchema,
    output: ObjectSchema,
    contract: Arc<OutputContract>,
    template: PromptTemplate,
    overrides: Vec<OutputOverride>,
    missing_output: MissingOutput,
    short_circuit: Option<ShortCircuit>,
}

impl TaskDefinition {
    /// Check a spec and build the definition.
    ///
    /// Rejects duplicate schema fields, template syntax errors, template
    /// references to undeclared input fields, overrides on undeclared output
    /// fields, and canned outputs that would not satisfy the output schema
    /// once overrides are applied.
    pub fn compile(spec: TaskSpec) -> Result<Self, DefinitionError> {
        let TaskSpec {
            name,
            description,
            system_prompt,
            input,
            output,
            template,
            overrides,
            fallback,
            short_circuit,
        } = spec;

        if name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }

        for (schema, fields) in [("input", &input), ("output", &output)] {
            if let Some(field) = fields.duplicate_names().first() {
                return Err(DefinitionError::DuplicateField {
                    task: name,
                    schema,
                    field: field.to_string(),
                });
            }
        }

        let template = PromptTemplate::parse(&template)
            .and_then(|t| t.check_fields(&input).map(|_| t))
            .map_err(|source| DefinitionError::Template {
                task: name.clone(),
                source,
            })?;

        if let Some(bad) = overrides.iter().find(|o| output.field(o.field()).is_none()) {
            return Err(DefinitionError::UnknownOverrideField {
                task: name,
                field: bad.field().to_string(),
            });
        }

        if let Some(rule) = &short_circuit {
            if input.field(rule.when.field()).is_none() {
                return Err(DefinitionError::UnknownShortCircuitField {
                    task: name,
                    field: rule.when.field().to_string(),
                });
            }
        }

        // Replaced fields are overwritten after the call, so whatever the
        // model put there is never checked.
        let replaced: Vec<&str> = overrides
            .iter()
            .filter(|o| matches!(o, OutputOverride::Replace { .. }))
            .map(OutputOverride::field)
            .collect();
        let contract = OutputContract::compile(&output, &replaced).map_err(|message| {
            DefinitionError::OutputContract {
                task: name.clone(),
                message,
            }
        })?;

        let definition = TaskDefinition {
            name,
            description,
            system_prompt: system_prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            input,
            output,
            contract: Arc::new(contract),
            template,
            overrides,
            missing_output: fallback.map_or(MissingOutput::Fail, MissingOutput::Fallback),
            short_circuit,
        };

        if let MissingOutput::Fallback(value) = &definition.missing_output {
            definition.check_canned("fallback", value)?;
        }
        if let Some(rule) = &definition.short_circuit {
            definition.check_canned("short-circuit response", &rule.response)?;
        }

        Ok(definition)
    }

    fn check_canned(&self, what: &'static str, value: &Value) -> Result<(), DefinitionError> {
        let finished = self.finish(value.clone());
        self.output
            .validate(&finished)
            .map_err(|violations| DefinitionError::InvalidCannedOutput {
                task: self.name.clone(),
                what,
                violations,
            })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn input_schema(&self) -> &ObjectSchema {
        &self.input
    }

    pub fn output_schema(&self) -> &ObjectSchema {
        &self.output
    }

    /// Compiled output schema used for the model call.
    pub fn output_contract(&self) -> &OutputContract {
        &self.contract
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn overrides(&self) -> &[OutputOverride] {
        &self.overrides
    }

    pub fn missing_output(&self) -> &MissingOutput {
        &self.missing_output
    }

    /// Validate raw caller input against this task's input schema.
    pub fn validate_input(&self, raw: &Value) -> Result<ValidatedInput, Vec<Violation>> {
        self.input.validate_input(raw)
    }

    /// The canned response, if this input triggers the task's short-circuit.
    pub fn short_circuit(&self, input: &ValidatedInput) -> Option<&Value> {
        self.short_circuit
            .as_ref()
            .filter(|rule| rule.when.holds(input))
            .map(|rule| &rule.response)
    }

    /// Apply every override, in order, to an output value.
    pub fn finish(&self, mut output: Value) -> Value {
        if let Value::Object(map) = &mut output {
            for rule in &self.overrides {
                rule.apply(map);
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSchema, FieldType};
    use serde_json::json;

    fn spec() -> TaskSpec {
        TaskSpec {
            name: "summarize".to_string(),
            description: "Summarize notes".to_string(),
            system_prompt: None,
            input: ObjectSchema::new(vec![
                FieldSchema::required("notes", FieldType::array(FieldType::string())),
                FieldSchema::optional("context", FieldType::string()),
            ]),
            output: ObjectSchema::new(vec![
                FieldSchema::required("summary", FieldType::string()),
                FieldSchema::optional("disclaimer", FieldType::string()),
            ]),
            template: "{{#each notes}}- {{this}}\n{{/each}}{{#if context}}Context: {{context}}{{/if}}"
                .to_string(),
            overrides: vec![OutputOverride::Replace {
                field: "disclaimer".to_string(),
                value: json!("Not legal advice."),
            }],
            fallback: None,
            short_circuit: None,
        }
    }

    fn input(raw: Value) -> ValidatedInput {
        TaskDefinition::compile(spec())
            .unwrap()
            .validate_input(&raw)
            .unwrap()
    }

    #[test]
    fn compiles_and_defaults_to_hard_failure() {
        let definition = TaskDefinition::compile(spec()).unwrap();
        assert_eq!(definition.name(), "summarize");
        assert_eq!(definition.missing_output(), &MissingOutput::Fail);
        assert_eq!(definition.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn rejects_template_with_undeclared_field() {
        let mut bad = spec();
        bad.template = "Case: {{caseDetails}}".to_string();
        let err = TaskDefinition::compile(bad).unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::Template {
                source: TemplateError::UnknownField { .. },
                ..
            }
        ));
    }

    #[test]
    fn rejects_override_on_undeclared_field() {
        let mut bad = spec();
        bad.overrides.push(OutputOverride::EnsureSuffix {
            field: "closing".to_string(),
            text: "x".to_string(),
        });
        let err = TaskDefinition::compile(bad).unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownOverrideField { field, .. } if field == "closing"));
    }

    #[test]
    fn rejects_duplicate_fields() {
        let mut bad = spec();
        bad.output = ObjectSchema::new(vec![
            FieldSchema::required("summary", FieldType::string()),
            FieldSchema::required("summary", FieldType::string()),
        ]);
        assert!(matches!(
            TaskDefinition::compile(bad),
            Err(DefinitionError::DuplicateField { schema: "output", .. })
        ));
    }

    #[test]
    fn rejects_fallback_that_violates_output_schema() {
        let mut bad = spec();
        bad.fallback = Some(json!({"summary": 42}));
        let err = TaskDefinition::compile(bad).unwrap_err();
        assert!(err.to_string().contains("fallback"));
        assert!(err.to_string().contains("summary must be"));
    }

    #[test]
    fn fallback_is_checked_after_overrides() {
        let mut with_fallback = spec();
        with_fallback.fallback = Some(json!({"summary": "Nothing to summarize."}));
        let definition = TaskDefinition::compile(with_fallback).unwrap();
        assert!(matches!(definition.missing_output(), MissingOutput::Fallback(_)));
    }

    #[test]
    fn short_circuit_on_empty_array() {
        let mut with_rule = spec();
        with_rule.short_circuit = Some(ShortCircuit {
            when: ShortCircuitCondition::EmptyArray {
                field: "notes".to_string(),
            },
            response: json!({"summary": "No notes were provided."}),
        });
        let definition = TaskDefinition::compile(with_rule).unwrap();

        let empty = definition.validate_input(&json!({"notes": []})).unwrap();
        assert_eq!(
            definition.short_circuit(&empty),
            Some(&json!({"summary": "No notes were provided."}))
        );

        let full = definition.validate_input(&json!({"notes": ["a"]})).unwrap();
        assert!(definition.short_circuit(&full).is_none());
    }

    #[test]
    fn short_circuit_field_must_be_declared() {
        let mut bad = spec();
        bad.short_circuit = Some(ShortCircuit {
            when: ShortCircuitCondition::MissingField {
                field: "events".to_string(),
            },
            response: json!({"summary": "x"}),
        });
        assert!(matches!(
            TaskDefinition::compile(bad),
            Err(DefinitionError::UnknownShortCircuitField { .. })
        ));
    }

    #[test]
    fn conditions_cover_blank_and_missing() {
        let blank = ShortCircuitCondition::BlankString {
            field: "context".to_string(),
        };
        let missing = ShortCircuitCondition::MissingField {
            field: "context".to_string(),
        };

        let absent = input(json!({"notes": ["a"]}));
        assert!(blank.holds(&absent));
        assert!(missing.holds(&absent));

        let spaces = input(json!({"notes": ["a"], "context": "   "}));
        assert!(blank.holds(&spaces));
        assert!(!missing.holds(&spaces));

        let text = input(json!({"notes": ["a"], "context": "eviction"}));
        assert!(!blank.holds(&text));
    }

    #[test]
    fn ensure_suffix_appends_once() {
        let rule = OutputOverride::EnsureSuffix {
            field: "text".to_string(),
            text: "Consult an attorney.".to_string(),
        };

        let mut output = Map::new();
        output.insert("text".to_string(), json!("Here is an answer.  "));
        rule.apply(&mut output);
        assert_eq!(output["text"], json!("Here is an answer.\n\nConsult an attorney."));

        rule.apply(&mut output);
        assert_eq!(output["text"], json!("Here is an answer.\n\nConsult an attorney."));

        let mut empty = Map::new();
        rule.apply(&mut empty);
        assert_eq!(empty["text"], json!("Consult an attorney."));
    }

    #[test]
    fn contract_skips_replaced_fields() {
        let definition = TaskDefinition::compile(spec()).unwrap();
        let checked = definition
            .output_contract()
            .check(json!({"summary": "s", "disclaimer": {"text": "custom"}}))
            .unwrap();
        assert_eq!(checked, json!({"summary": "s"}));
        assert_eq!(
            definition.finish(checked)["disclaimer"],
            json!("Not legal advice.")
        );
    }

    #[test]
    fn finish_replaces_model_value() {
        let definition = TaskDefinition::compile(spec()).unwrap();
        let finished = definition.finish(json!({"summary": "s", "disclaimer": "made up"}));
        assert_eq!(finished["disclaimer"], json!("Not legal advice."));
    }

    #[test]
    fn task_spec_reads_from_yaml() {
        let yaml = r#"
name: triage
description: Decide urgency
input:
  - name: situation
    type: string
    min_length: 10
output:
  - name: urgency
    type: enum
    values: [low, high]
template: "Situation: {{situation}}"
fallback:
  urgency: low
short_circuit:
  when:
    kind: blank_string
    field: situation
  response:
    urgency: low
"#;
        let spec: TaskSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.fallback, Some(json!({"urgency": "low"})));
        let definition = TaskDefinition::compile(spec).unwrap();
        assert_eq!(definition.description(), "Decide urgency");
        assert!(definition.overrides().is_empty());
    }
}
