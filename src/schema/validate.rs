//! Generic validator for [`ObjectSchema`] values.
//!
//! Validation never stops at the first problem: every violated field and
//! constraint is collected so callers can report them together.

use std::fmt;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::{FieldSchema, FieldType, ObjectSchema};

/// One violated constraint at a location inside a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Dotted/indexed path, e.g. `events[2].date`.
    pub path: String,
    pub kind: ViolationKind,
}

/// The constraint that was violated.
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    Missing,
    WrongType { expected: &'static str },
    TooShort { min: usize },
    TooLong { max: usize },
    BelowMinimum { min: f64 },
    AboveMaximum { max: f64 },
    NotAllowed { allowed: Vec<String> },
    InvalidDate,
    TooFewItems { min: usize },
    TooManyItems { max: usize },
    /// Reported by the compiled output contract.
    Rejected { reason: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "input"
        } else {
            self.path.as_str()
        };
        match &self.kind {
            ViolationKind::Missing => write!(f, "{} is required", path),
            ViolationKind::WrongType { expected } => write!(f, "{} must be {}", path, expected),
            ViolationKind::TooShort { min } => {
                write!(f, "{} must be at least {} characters", path, min)
            }
            ViolationKind::TooLong { max } => {
                write!(f, "{} must be at most {} characters", path, max)
            }
            ViolationKind::BelowMinimum { min } => {
                write!(f, "{} must be greater than or equal to {}", path, min)
            }
            ViolationKind::AboveMaximum { max } => {
                write!(f, "{} must be less than or equal to {}", path, max)
            }
            ViolationKind::NotAllowed { allowed } => {
                write!(f, "{} must be one of: {}", path, allowed.join(", "))
            }
            ViolationKind::InvalidDate => write!(f, "{} must be a date in YYYY-MM-DD form", path),
            ViolationKind::TooFewItems { min } => {
                write!(f, "{} must contain at least {} item(s)", path, min)
            }
            ViolationKind::TooManyItems { max } => {
                write!(f, "{} must contain at most {} item(s)", path, max)
            }
            ViolationKind::Rejected { reason } if self.path.is_empty() => write!(f, "{}", reason),
            ViolationKind::Rejected { reason } => write!(f, "{}: {}", path, reason),
        }
    }
}

/// Join violations into a single `; `-separated sentence fragment.
pub fn describe_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Caller input that satisfied a task's input schema.
///
/// Only fields declared by the schema are retained. The only way to obtain
/// one is [`ObjectSchema::validate_input`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInput(Value);

impl ValidatedInput {
    /// Top-level field value, if present and not null.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    /// The whole input as a JSON object.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl ObjectSchema {
    /// Check `value` against this schema, collecting every violation.
    pub fn validate(&self, value: &Value) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        self.check_object(value, "", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Validate raw caller input and keep only the declared fields.
    pub fn validate_input(&self, raw: &Value) -> Result<ValidatedInput, Vec<Violation>> {
        self.validate(raw)?;

        let mut projected = Map::new();
        if let Value::Object(map) = raw {
            for field in &self.fields {
                if let Some(value) = map.get(&field.name) {
                    if !value.is_null() {
                        projected.insert(field.name.clone(), value.clone());
                    }
                }
            }
        }
        Ok(ValidatedInput(Value::Object(projected)))
    }

    fn check_object(&self, value: &Value, path: &str, out: &mut Vec<Violation>) {
        let Value::Object(map) = value else {
            out.push(Violation {
                path: path.to_string(),
                kind: ViolationKind::WrongType {
                    expected: "an object",
                },
            });
            return;
        };

        for field in &self.fields {
            let field_path = join_path(path, &field.name);
            match map.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        out.push(Violation {
                            path: field_path,
                            kind: ViolationKind::Missing,
                        });
                    }
                }
                Some(v) => check_field(field, v, &field_path, out),
            }
        }
    }
}

fn check_field(field: &FieldSchema, value: &Value, path: &str, out: &mut Vec<Violation>) {
    check_type(&field.field_type, value, path, out);
}

fn check_type(field_type: &FieldType, value: &Value, path: &str, out: &mut Vec<Violation>) {
    let mut push = |kind: ViolationKind| {
        out.push(Violation {
            path: path.to_string(),
            kind,
        })
    };

    match field_type {
        FieldType::String {
            min_length,
            max_length,
        } => {
            let Some(s) = value.as_str() else {
                push(ViolationKind::WrongType {
                    expected: field_type.type_name(),
                });
                return;
            };
            let len = s.chars().count();
            if let Some(min) = *min_length {
                if len < min {
                    push(ViolationKind::TooShort { min });
                }
            }
            if let Some(max) = *max_length {
                if len > max {
                    push(ViolationKind::TooLong { max });
                }
            }
        }
        FieldType::Number { minimum, maximum } => {
            let Some(n) = value.as_f64() else {
                push(ViolationKind::WrongType {
                    expected: field_type.type_name(),
                });
                return;
            };
            check_range(n, *minimum, *maximum, &mut push);
        }
        FieldType::Integer { minimum, maximum } => {
            let Some(n) = value.as_i64() else {
                push(ViolationKind::WrongType {
                    expected: field_type.type_name(),
                });
                return;
            };
            check_range(
                n as f64,
                minimum.map(|m| m as f64),
                maximum.map(|m| m as f64),
                &mut push,
            );
        }
        FieldType::Boolean => {
            if !value.is_boolean() {
                push(ViolationKind::WrongType {
                    expected: field_type.type_name(),
                });
            }
        }
        FieldType::Enum { values } => match value.as_str() {
            Some(s) if values.iter().any(|v| v == s) => {}
            _ => push(ViolationKind::NotAllowed {
                allowed: values.clone(),
            }),
        },
        FieldType::Date => {
            let parsed = value
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            if parsed.is_none() {
                push(ViolationKind::InvalidDate);
            }
        }
        FieldType::Array {
            items,
            min_items,
            max_items,
        } => {
            let Some(elements) = value.as_array() else {
                push(ViolationKind::WrongType {
                    expected: field_type.type_name(),
                });
                return;
            };
            if let Some(min) = *min_items {
                if elements.len() < min {
                    push(ViolationKind::TooFewItems { min });
                }
            }
            if let Some(max) = *max_items {
                if elements.len() > max {
                    push(ViolationKind::TooManyItems { max });
                }
            }
            for (i, element) in elements.iter().enumerate() {
                check_type(items, element, &format!("{}[{}]", path, i), out);
            }
        }
        FieldType::Object { fields } => fields.check_object(value, path, out),
    }
}

fn check_range(
    n: f64,
    minimum: Option<f64>,
    maximum: Option<f64>,
    push: &mut impl FnMut(ViolationKind),
) {
    if let Some(min) = minimum {
        if n < min {
            push(ViolationKind::BelowMinimum { min });
        }
    }
    if let Some(max) = maximum {
        if n > max {
            push(ViolationKind::AboveMaximum { max });
        }
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}
