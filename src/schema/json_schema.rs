//! JSON Schema export, used as the structured-output contract sent to the model host.

use serde_json::{json, Map, Value};

use super::{FieldType, ObjectSchema};

impl ObjectSchema {
    /// Render this schema as a JSON Schema object.
    ///
    /// `required` lists fields in declaration order.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut property = field.field_type.to_json_schema();
            if let (Some(description), Value::Object(map)) = (&field.description, &mut property) {
                map.insert("description".to_string(), json!(description));
            }
            properties.insert(field.name.clone(), property);
            if field.required {
                required.push(json!(field.name));
            }
        }

        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": required,
            "additionalProperties": false,
        })
    }
}

impl FieldType {
    pub fn to_json_schema(&self) -> Value {
        match self {
            FieldType::String {
                min_length,
                max_length,
            } => {
                let mut schema = Map::new();
                schema.insert("type".to_string(), json!("string"));
                if let Some(min) = min_length {
                    schema.insert("minLength".to_string(), json!(min));
                }
                if let Some(max) = max_length {
                    schema.insert("maxLength".to_string(), json!(max));
                }
                Value::Object(schema)
            }
            FieldType::Number { minimum, maximum } => {
                with_bounds("number", minimum.map(|m| json!(m)), maximum.map(|m| json!(m)))
            }
            FieldType::Integer { minimum, maximum } => {
                with_bounds("integer", minimum.map(|m| json!(m)), maximum.map(|m| json!(m)))
            }
            FieldType::Boolean => json!({ "type": "boolean" }),
            FieldType::Enum { values } => json!({ "type": "string", "enum": values }),
            FieldType::Date => json!({ "type": "string", "format": "date" }),
            FieldType::Array {
                items,
                min_items,
                max_items,
            } => {
                let mut schema = Map::new();
                schema.insert("type".to_string(), json!("array"));
                schema.insert("items".to_string(), items.to_json_schema());
                if let Some(min) = min_items {
                    schema.insert("minItems".to_string(), json!(min));
                }
                if let Some(max) = max_items {
                    schema.insert("maxItems".to_string(), json!(max));
                }
                Value::Object(schema)
            }
            FieldType::Object { fields } => fields.to_json_schema(),
        }
    }
}

fn with_bounds(type_name: &str, minimum: Option<Value>, maximum: Option<Value>) -> Value {
    let mut schema = Map::new();
    schema.insert("type".to_string(), json!(type_name));
    if let Some(min) = minimum {
        schema.insert("minimum".to_string(), min);
    }
    if let Some(max) = maximum {
        schema.insert("maximum".to_string(), max);
    }
    Value::Object(schema)
}
