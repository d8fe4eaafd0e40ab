//! Structural schemas for task inputs and outputs.
//!
//! A schema is plain data: an ordered list of named fields, each with a
//! [`FieldType`] carrying its constraints. The same value is used three ways:
//!
//! - validating caller input into a [`ValidatedInput`]
//! - exporting a JSON Schema document that tells the model host what to return
//! - checking model output against that same document ([`OutputContract`])
//!
//! Schemas deserialize from YAML so task catalogs can be shipped as files:
//!
//! ```yaml
//! - name: caseDetails
//!   type: string
//!   min_length: 60
//! - name: jurisdiction
//!   type: string
//!   required: false
//! ```

mod contract;
mod json_schema;
mod validate;

pub use contract::OutputContract;
pub use validate::{describe_violations, ValidatedInput, Violation, ViolationKind};

use serde::{Deserialize, Serialize};

/// Type of a single field, with its constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    /// Free text. Lengths are counted in characters.
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    Boolean,
    /// One of a fixed set of strings.
    Enum { values: Vec<String> },
    /// Calendar date in `YYYY-MM-DD` form.
    Date,
    Array {
        items: Box<FieldType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },
    Object { fields: ObjectSchema },
}

impl FieldType {
    /// Unconstrained string.
    pub fn string() -> Self {
        FieldType::String {
            min_length: None,
            max_length: None,
        }
    }

    /// String with a minimum length.
    pub fn text(min_length: usize) -> Self {
        FieldType::String {
            min_length: Some(min_length),
            max_length: None,
        }
    }

    /// Number within an inclusive range.
    pub fn number_in(minimum: f64, maximum: f64) -> Self {
        FieldType::Number {
            minimum: Some(minimum),
            maximum: Some(maximum),
        }
    }

    pub fn enumeration(values: &[&str]) -> Self {
        FieldType::Enum {
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Unbounded array of `items`.
    pub fn array(items: FieldType) -> Self {
        FieldType::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    /// Array of `items` with inclusive size bounds.
    pub fn array_between(items: FieldType, min_items: usize, max_items: usize) -> Self {
        FieldType::Array {
            items: Box::new(items),
            min_items: Some(min_items),
            max_items: Some(max_items),
        }
    }

    pub fn object(fields: Vec<FieldSchema>) -> Self {
        FieldType::Object {
            fields: ObjectSchema::new(fields),
        }
    }

    /// Short name used in violation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String { .. } => "a string",
            FieldType::Number { .. } => "a number",
            FieldType::Integer { .. } => "an integer",
            FieldType::Boolean => "a boolean",
            FieldType::Enum { .. } => "one of the allowed values",
            FieldType::Date => "a date (YYYY-MM-DD)",
            FieldType::Array { .. } => "a list",
            FieldType::Object { .. } => "an object",
        }
    }
}

/// A named field inside an [`ObjectSchema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(flatten)]
    pub field_type: FieldType,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Shown to the model in the exported JSON Schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_required() -> bool {
    true
}

impl FieldSchema {
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            description: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Ordered set of fields describing a JSON object.
///
/// # Invariants
/// - Field order is preserved; validation reports and JSON Schema exports
///   follow it, which keeps both deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectSchema {
    fields: Vec<FieldSchema>,
}

impl ObjectSchema {
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names declared more than once, in declaration order.
    pub fn duplicate_names(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.fields
            .iter()
            .filter(|f| !seen.insert(f.name.as_str()))
            .map(|f| f.name.as_str())
            .collect()
    }
}
