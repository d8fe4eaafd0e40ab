//! Output contract: the JSON Schema a task asks the model for, compiled once
//! and used to check what comes back.

use std::fmt;

use jsonschema::JSONSchema;
use serde_json::Value;

use super::{FieldType, ObjectSchema, Violation, ViolationKind};

/// Compiled structured-output contract for one output schema.
///
/// `document` is what the model host is sent. Checking first drops every
/// field the schema does not declare, plus the `discarded` fields whose
/// value is always overwritten afterwards, and then validates the rest
/// against the compiled schema.
pub struct OutputContract {
    document: Value,
    checked: ObjectSchema,
    validator: JSONSchema,
    discarded: Vec<String>,
}

impl fmt::Debug for OutputContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputContract")
            .field("document", &self.document)
            .field("discarded", &self.discarded)
            .finish()
    }
}

impl OutputContract {
    /// Compile `schema`, ignoring whatever the model puts in `discarded`.
    pub fn compile(schema: &ObjectSchema, discarded: &[&str]) -> Result<Self, String> {
        let checked = ObjectSchema::new(
            schema
                .fields()
                .iter()
                .filter(|f| !discarded.contains(&f.name.as_str()))
                .cloned()
                .collect(),
        );
        let validator =
            JSONSchema::compile(&checked.to_json_schema()).map_err(|e| e.to_string())?;

        Ok(Self {
            document: schema.to_json_schema(),
            checked,
            validator,
            discarded: discarded.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// JSON Schema sent as the `response_format`.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Strip undeclared and discarded fields, then validate.
    ///
    /// Returns the cleaned value, or every violation found.
    pub fn check(&self, mut value: Value) -> Result<Value, Vec<Violation>> {
        if let Value::Object(map) = &mut value {
            for name in &self.discarded {
                map.remove(name);
            }
        }
        let dropped = self.checked.retain_declared(&mut value);
        if !dropped.is_empty() {
            tracing::debug!("Dropped undeclared output fields: {}", dropped.join(", "));
        }

        let violations: Vec<Violation> = match self.validator.validate(&value) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| Violation {
                    path: dotted_path(&error.instance_path.to_string()),
                    kind: ViolationKind::Rejected {
                        reason: error.to_string(),
                    },
                })
                .collect(),
        };
        if violations.is_empty() {
            Ok(value)
        } else {
            Err(violations)
        }
    }
}

impl ObjectSchema {
    /// Remove object keys this schema does not declare, at every depth.
    ///
    /// Returns the paths that were removed.
    pub fn retain_declared(&self, value: &mut Value) -> Vec<String> {
        let mut dropped = Vec::new();
        self.retain_in(value, "", &mut dropped);
        dropped
    }

    fn retain_in(&self, value: &mut Value, path: &str, dropped: &mut Vec<String>) {
        let Value::Object(map) = value else {
            return;
        };
        map.retain(|key, _| {
            let declared = self.field(key).is_some();
            if !declared {
                dropped.push(join(path, key));
            }
            declared
        });
        for field in &self.fields {
            if let Some(child) = map.get_mut(&field.name) {
                retain_field(&field.field_type, child, &join(path, &field.name), dropped);
            }
        }
    }
}

fn retain_field(field_type: &FieldType, value: &mut Value, path: &str, dropped: &mut Vec<String>) {
    match (field_type, value) {
        (FieldType::Object { fields }, value) => fields.retain_in(value, path, dropped),
        (FieldType::Array { items, .. }, Value::Array(elements)) => {
            for (i, element) in elements.iter_mut().enumerate() {
                retain_field(items, element, &format!("{}[{}]", path, i), dropped);
            }
        }
        _ => {}
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

/// `/events/2/date` → `events[2].date`
fn dotted_path(pointer: &str) -> String {
    let mut path = String::new();
    for segment in pointer.split('/').filter(|s| !s.is_empty()) {
        if segment.chars().all(|c| c.is_ascii_digit()) {
            path.push_str(&format!("[{}]", segment));
        } else {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(segment);
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;
    use serde_json::json;

    fn analysis_schema() -> ObjectSchema {
        ObjectSchema::new(vec![
            FieldSchema::required("summary", FieldType::string()),
            FieldSchema::required(
                "points",
                FieldType::array(FieldType::object(vec![FieldSchema::required(
                    "text",
                    FieldType::string(),
                )])),
            ),
            FieldSchema::optional("disclaimer", FieldType::string()),
        ])
    }

    #[test]
    fn undeclared_fields_are_dropped_at_every_depth() {
        let contract = OutputContract::compile(&analysis_schema(), &[]).unwrap();
        let cleaned = contract
            .check(json!({
                "summary": "Lease dispute",
                "points": [{"text": "Deposit withheld", "severity": "high"}],
                "legalAdvice": "You will win, sue now."
            }))
            .unwrap();

        assert_eq!(
            cleaned,
            json!({"summary": "Lease dispute", "points": [{"text": "Deposit withheld"}]})
        );
    }

    #[test]
    fn discarded_fields_are_not_checked() {
        let contract = OutputContract::compile(&analysis_schema(), &["disclaimer"]).unwrap();
        let cleaned = contract
            .check(json!({"summary": "s", "points": [], "disclaimer": {"text": "custom"}}))
            .unwrap();
        assert_eq!(cleaned, json!({"summary": "s", "points": []}));

        // The model is still asked for the field.
        assert!(contract.document()["properties"]["disclaimer"].is_object());
    }

    #[test]
    fn violations_carry_dotted_paths() {
        let contract = OutputContract::compile(&analysis_schema(), &[]).unwrap();
        let violations = contract
            .check(json!({"summary": 3, "points": [{"text": 1}]}))
            .unwrap_err();

        let paths: Vec<_> = violations.iter().map(|v| v.path.as_str()).collect();
        assert!(paths.contains(&"summary"));
        assert!(paths.contains(&"points[0].text"));
    }

    #[test]
    fn missing_required_field_is_named() {
        let contract = OutputContract::compile(&analysis_schema(), &[]).unwrap();
        let violations = contract.check(json!({"points": []})).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].to_string().contains("summary"));
    }

    #[test]
    fn pointer_conversion() {
        assert_eq!(dotted_path(""), "");
        assert_eq!(dotted_path("/events/2/date"), "events[2].date");
        assert_eq!(dotted_path("/summary"), "summary");
    }
}
