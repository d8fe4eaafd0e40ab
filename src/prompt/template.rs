//! Prompt template engine.
//!
//! # Syntax
//!
//! - `{{field}}` - substitutes the value of `field`
//! - `{{#if field}}...{{/if}}` - the body is kept only when `field` is present
//!   and non-empty
//! - `{{#each field}}...{{/each}}` - the body is rendered once per element of
//!   the array `field`; inside it, `{{name}}` resolves against the element
//!   first and then the root input, and `{{this}}` is the element itself
//!
//! Blocks nest. Templates are parsed once when a task is registered, so a
//! malformed template is rejected at startup rather than on a request.
//!
//! Rendering is deterministic: the same input always yields the same bytes.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::schema::{FieldType, ObjectSchema, ValidatedInput};

/// Error type for template parsing and checking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A `{{` without a matching `}}`.
    #[error("unterminated tag at position {position} in template")]
    UnterminatedTag { position: usize },

    /// Tag content that is neither a field reference nor a block marker.
    #[error("invalid tag '{tag}' at position {position} in template")]
    InvalidTag { tag: String, position: usize },

    /// A closing tag that does not match the innermost open block.
    #[error("unexpected '{{{{/{block}}}}}' at position {position} in template")]
    UnexpectedClose { block: String, position: usize },

    /// A block that is never closed.
    #[error("'{{{{#{block}}}}}' opened at position {position} is never closed")]
    UnclosedBlock { block: String, position: usize },

    /// A reference to a field the input schema does not declare.
    #[error("template references unknown field '{name}'")]
    UnknownField { name: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Field(String),
    If { field: String, body: Vec<Node> },
    Each { field: String, body: Vec<Node> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Each,
}

impl BlockKind {
    fn keyword(self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::Each => "each",
        }
    }
}

struct OpenBlock {
    kind: BlockKind,
    field: String,
    position: usize,
    body: Vec<Node>,
}

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("tag pattern is valid"))
}

fn name_pattern() -> &'static Regex {
    static NAME: OnceLock<Regex> = OnceLock::new();
    NAME.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
            .expect("name pattern is valid")
    })
}

/// A parsed prompt template.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    nodes: Vec<Node>,
}

/// Prompt text produced by rendering a [`PromptTemplate`].
///
/// Only [`PromptTemplate::render`] creates these, so anything handed to the
/// model has gone through a task's template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt(String);

impl RenderedPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PromptTemplate {
    /// Parse a template string.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut stack: Vec<OpenBlock> = Vec::new();
        let mut root: Vec<Node> = Vec::new();
        let mut cursor = 0;

        for captures in tag_pattern().captures_iter(source) {
            let whole = captures.get(0).expect("group 0 always matches");
            push_text(
                current(&mut stack, &mut root),
                &source[cursor..whole.start()],
                cursor,
            )?;
            cursor = whole.end();

            let position = whole.start();
            let tag = captures[1].trim();

            if let Some(rest) = tag.strip_prefix('#') {
                let (kind, field) = parse_open_tag(rest, position)?;
                stack.push(OpenBlock {
                    kind,
                    field,
                    position,
                    body: Vec::new(),
                });
            } else if let Some(rest) = tag.strip_prefix('/') {
                let closing = rest.trim();
                let block = match stack.pop() {
                    Some(open) if open.kind.keyword() == closing => open,
                    _ => {
                        return Err(TemplateError::UnexpectedClose {
                            block: closing.to_string(),
                            position,
                        })
                    }
                };
                let node = match block.kind {
                    BlockKind::If => Node::If {
                        field: block.field,
                        body: block.body,
                    },
                    BlockKind::Each => Node::Each {
                        field: block.field,
                        body: block.body,
                    },
                };
                current(&mut stack, &mut root).push(node);
            } else if tag == "this" || name_pattern().is_match(tag) {
                current(&mut stack, &mut root).push(Node::Field(tag.to_string()));
            } else {
                return Err(TemplateError::InvalidTag {
                    tag: tag.to_string(),
                    position,
                });
            }
        }

        push_text(current(&mut stack, &mut root), &source[cursor..], cursor)?;

        if let Some(open) = stack.pop() {
            return Err(TemplateError::UnclosedBlock {
                block: open.kind.keyword().to_string(),
                position: open.position,
            });
        }

        Ok(Self { nodes: root })
    }

    /// Verify that every field the template references is declared by `schema`.
    ///
    /// Inside `{{#each}}` over an array of objects, the element's fields are
    /// also in scope.
    pub fn check_fields(&self, schema: &ObjectSchema) -> Result<(), TemplateError> {
        let mut scopes: Vec<Option<&ObjectSchema>> = vec![Some(schema)];
        check_nodes(&self.nodes, &mut scopes)
    }

    /// Render the template against validated input.
    pub fn render(&self, input: &ValidatedInput) -> RenderedPrompt {
        let mut out = String::new();
        let mut scopes: Vec<&Value> = vec![input.as_value()];
        render_nodes(&self.nodes, &mut scopes, &mut out);
        RenderedPrompt(out)
    }
}

fn current<'a>(stack: &'a mut [OpenBlock], root: &'a mut Vec<Node>) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some(open) => &mut open.body,
        None => root,
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str, base: usize) -> Result<(), TemplateError> {
    if let Some(offset) = text.find("{{") {
        // The tag regex skipped it, so it never closes.
        return Err(TemplateError::UnterminatedTag {
            position: base + offset,
        });
    }
    if !text.is_empty() {
        nodes.push(Node::Text(text.to_string()));
    }
    Ok(())
}

fn parse_open_tag(rest: &str, position: usize) -> Result<(BlockKind, String), TemplateError> {
    let mut parts = rest.split_whitespace();
    let kind = match parts.next() {
        Some("if") => BlockKind::If,
        Some("each") => BlockKind::Each,
        _ => {
            return Err(TemplateError::InvalidTag {
                tag: format!("#{}", rest),
                position,
            })
        }
    };
    match (parts.next(), parts.next()) {
        (Some(field), None) if name_pattern().is_match(field) => Ok((kind, field.to_string())),
        _ => Err(TemplateError::InvalidTag {
            tag: format!("#{}", rest),
            position,
        }),
    }
}

fn check_nodes<'s>(
    nodes: &[Node],
    scopes: &mut Vec<Option<&'s ObjectSchema>>,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Field(name) => {
                if name == "this" && scopes.len() > 1 {
                    continue;
                }
                lookup_field_type(name, scopes)?;
            }
            Node::If { field, body } => {
                lookup_field_type(field, scopes)?;
                check_nodes(body, scopes)?;
            }
            Node::Each { field, body } => {
                let element_scope = match lookup_field_type(field, scopes)? {
                    Some(FieldType::Array { items, .. }) => match items.as_ref() {
                        FieldType::Object { fields } => Some(fields),
                        _ => None,
                    },
                    _ => None,
                };
                scopes.push(element_scope);
                let result = check_nodes(body, scopes);
                scopes.pop();
                result?;
            }
        }
    }
    Ok(())
}

/// Resolve the first segment of `name` against the scopes, innermost first.
///
/// Returns the field's type when the full dotted path can be followed through
/// object schemas, `None` when only the first segment is known.
fn lookup_field_type<'a>(
    name: &str,
    scopes: &[Option<&'a ObjectSchema>],
) -> Result<Option<&'a FieldType>, TemplateError> {
    let mut segments = name.split('.');
    let first = segments.next().unwrap_or_default();

    let found = scopes
        .iter()
        .rev()
        .filter_map(|scope| *scope)
        .find_map(|schema| schema.field(first));

    let Some(field) = found else {
        return Err(TemplateError::UnknownField {
            name: name.to_string(),
        });
    };

    let mut field_type = &field.field_type;
    for segment in segments {
        match field_type {
            FieldType::Object { fields } => match fields.field(segment) {
                Some(nested) => field_type = &nested.field_type,
                None => {
                    return Err(TemplateError::UnknownField {
                        name: name.to_string(),
                    })
                }
            },
            _ => return Ok(None),
        }
    }
    Ok(Some(field_type))
}

fn render_nodes<'a>(nodes: &[Node], scopes: &mut Vec<&'a Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field(name) => {
                if let Some(value) = resolve(name, scopes) {
                    write_value(value, out);
                }
            }
            Node::If { field, body } => {
                if resolve(field, scopes).is_some_and(is_present) {
                    render_nodes(body, scopes, out);
                }
            }
            Node::Each { field, body } => match resolve(field, scopes) {
                Some(Value::Array(elements)) => {
                    for element in elements {
                        scopes.push(element);
                        render_nodes(body, scopes, out);
                        scopes.pop();
                    }
                }
                Some(Value::Null) | None => {}
                Some(single) => {
                    scopes.push(single);
                    render_nodes(body, scopes, out);
                    scopes.pop();
                }
            },
        }
    }
}

fn resolve<'a>(name: &str, scopes: &[&'a Value]) -> Option<&'a Value> {
    if name == "this" {
        return scopes.last().copied();
    }

    let mut segments = name.split('.');
    let first = segments.next()?;
    let mut value = scopes
        .iter()
        .rev()
        .copied()
        .find_map(|scope| scope.get(first))?;
    for segment in segments {
        value = value.get(segment)?;
    }
    Some(value)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "yes" } else { "no" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(item, out);
            }
        }
        Value::Object(_) => out.push_str(&value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;
    use serde_json::json;

    fn input_schema() -> ObjectSchema {
        ObjectSchema::new(vec![
            FieldSchema::required("caseDetails", FieldType::string()),
            FieldSchema::optional("jurisdiction", FieldType::string()),
            FieldSchema::optional(
                "events",
                FieldType::array(FieldType::object(vec![
                    FieldSchema::required("date", FieldType::Date),
                    FieldSchema::required("eventType", FieldType::string()),
                    FieldSchema::required("description", FieldType::string()),
                ])),
            ),
            FieldSchema::optional("goals", FieldType::array(FieldType::string())),
        ])
    }

    fn validated(raw: serde_json::Value) -> ValidatedInput {
        input_schema().validate_input(&raw).unwrap()
    }

    #[test]
    fn test_simple_substitution() {
        let template = PromptTemplate::parse("Case: {{caseDetails}}.").unwrap();
        let prompt = template.render(&validated(json!({"caseDetails": "Tenant dispute"})));
        assert_eq!(prompt.as_str(), "Case: Tenant dispute.");
    }

    #[test]
    fn test_whitespace_inside_tags() {
        let template = PromptTemplate::parse("{{ caseDetails }}").unwrap();
        let prompt = template.render(&validated(json!({"caseDetails": "x"})));
        assert_eq!(prompt.as_str(), "x");
    }

    #[test]
    fn test_conditional_included_when_present() {
        let template =
            PromptTemplate::parse("A{{#if jurisdiction}} in {{jurisdiction}}{{/if}}.").unwrap();
        let prompt = template.render(&validated(
            json!({"caseDetails": "x", "jurisdiction": "Ohio"}),
        ));
        assert_eq!(prompt.as_str(), "A in Ohio.");
    }

    #[test]
    fn test_conditional_omitted_when_absent() {
        let template = PromptTemplate::parse(
            "Facts.\n{{#if jurisdiction}}Jurisdiction note: {{jurisdiction}}\n{{/if}}End.",
        )
        .unwrap();
        let prompt = template.render(&validated(json!({"caseDetails": "x"})));
        assert_eq!(prompt.as_str(), "Facts.\nEnd.");
        assert!(!prompt.as_str().contains("Jurisdiction note"));
    }

    #[test]
    fn test_conditional_omitted_for_blank_string_and_empty_list() {
        let template =
            PromptTemplate::parse("{{#if jurisdiction}}J{{/if}}{{#if goals}}G{{/if}}").unwrap();
        let prompt = template.render(&validated(
            json!({"caseDetails": "x", "jurisdiction": "  ", "goals": []}),
        ));
        assert_eq!(prompt.as_str(), "");
    }

    #[test]
    fn test_each_renders_one_line_per_element() {
        let template = PromptTemplate::parse(
            "Events:\n{{#each events}}- {{date}} [{{eventType}}] {{description}} ({{caseDetails}})\n{{/each}}",
        )
        .unwrap();
        let prompt = template.render(&validated(json!({
            "caseDetails": "c",
            "events": [
                {"date": "2024-01-02", "eventType": "filing", "description": "Complaint filed"},
                {"date": "2024-02-10", "eventType": "hearing", "description": "Status hearing"}
            ]
        })));
        assert_eq!(
            prompt.as_str(),
            "Events:\n- 2024-01-02 [filing] Complaint filed (c)\n- 2024-02-10 [hearing] Status hearing (c)\n"
        );
    }

    #[test]
    fn test_each_over_scalars_uses_this() {
        let template = PromptTemplate::parse("{{#each goals}}* {{this}}\n{{/each}}").unwrap();
        let prompt = template.render(&validated(
            json!({"caseDetails": "x", "goals": ["Keep custody", "Avoid fees"]}),
        ));
        assert_eq!(prompt.as_str(), "* Keep custody\n* Avoid fees\n");
    }

    #[test]
    fn test_array_substitution_joins_values() {
        let template = PromptTemplate::parse("Goals: {{goals}}").unwrap();
        let prompt = template.render(&validated(json!({"caseDetails": "x", "goals": ["a", "b"]})));
        assert_eq!(prompt.as_str(), "Goals: a, b");
    }

    #[test]
    fn test_render_is_deterministic() {
        let template = PromptTemplate::parse(
            "{{caseDetails}}{{#if jurisdiction}} / {{jurisdiction}}{{/if}}{{#each goals}} {{this}}{{/each}}",
        )
        .unwrap();
        let input = validated(json!({
            "caseDetails": "Eviction without notice",
            "jurisdiction": "Texas",
            "goals": ["stay", "recover deposit"]
        }));
        let first = template.render(&input);
        let second = template.render(&input);
        assert_eq!(first.as_str().as_bytes(), second.as_str().as_bytes());
    }

    #[test]
    fn test_single_braces_are_literal() {
        let template = PromptTemplate::parse("Respond as {\"a\": 1} for {{caseDetails}}").unwrap();
        let prompt = template.render(&validated(json!({"caseDetails": "x"})));
        assert_eq!(prompt.as_str(), "Respond as {\"a\": 1} for x");
    }

    #[test]
    fn test_unterminated_tag() {
        let err = PromptTemplate::parse("Hello {{name").unwrap_err();
        assert_eq!(err, TemplateError::UnterminatedTag { position: 6 });
    }

    #[test]
    fn test_unclosed_block() {
        let err = PromptTemplate::parse("a{{#if x}}b").unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnclosedBlock {
                block: "if".to_string(),
                position: 1
            }
        );
    }

    #[test]
    fn test_mismatched_close() {
        let err = PromptTemplate::parse("{{#each x}}{{/if}}").unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnexpectedClose {
                block: "if".to_string(),
                position: 11
            }
        );
    }

    #[test]
    fn test_invalid_tags() {
        assert!(matches!(
            PromptTemplate::parse("{{}}"),
            Err(TemplateError::InvalidTag { .. })
        ));
        assert!(matches!(
            PromptTemplate::parse("{{#unless x}}{{/unless}}"),
            Err(TemplateError::InvalidTag { .. })
        ));
        assert!(matches!(
            PromptTemplate::parse("{{bad name}}"),
            Err(TemplateError::InvalidTag { .. })
        ));
    }

    #[test]
    fn test_check_fields_accepts_element_scope() {
        let template = PromptTemplate::parse(
            "{{#each events}}{{date}} {{description}} {{caseDetails}}{{/each}}{{#each goals}}{{this}}{{/each}}",
        )
        .unwrap();
        assert!(template.check_fields(&input_schema()).is_ok());
    }

    #[test]
    fn test_check_fields_rejects_unknown() {
        let template = PromptTemplate::parse("{{#if venue}}{{venue}}{{/if}}").unwrap();
        assert_eq!(
            template.check_fields(&input_schema()),
            Err(TemplateError::UnknownField {
                name: "venue".to_string()
            })
        );

        let template = PromptTemplate::parse("{{date}}").unwrap();
        assert!(template.check_fields(&input_schema()).is_err());

        let template = PromptTemplate::parse("{{this}}").unwrap();
        assert!(template.check_fields(&input_schema()).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = TemplateError::UnexpectedClose {
            block: "if".to_string(),
            position: 3,
        };
        assert_eq!(err.to_string(), "unexpected '{{/if}}' at position 3 in template");

        let err = TemplateError::UnclosedBlock {
            block: "each".to_string(),
            position: 0,
        };
        assert_eq!(err.to_string(), "'{{#each}}' opened at position 0 is never closed");
    }
}
