//! Built-in task catalog.
//!
//! Each function returns the declarative [`TaskSpec`] for one tool. The
//! registry compiles them at startup, so a typo in a template or a fallback
//! that does not fit its output schema stops the process before it serves.

use serde_json::json;

use super::definition::{OutputOverride, ShortCircuit, ShortCircuitCondition, TaskSpec};
use crate::schema::{FieldSchema, FieldType, ObjectSchema};

/// Disclaimer forced into every document analysis.
pub const DOCUMENT_ANALYSIS_DISCLAIMER: &str = "This analysis is conceptual and based only on the text provided. It is not legal advice and does not assess the admissibility or legal weight of any evidence. Please consult a qualified legal professional.";

/// Disclaimer forced into strategy and discovery suggestions.
pub const STRATEGY_DISCLAIMER: &str = "These suggestions are for informational purposes only and are not legal advice. Court rules and deadlines vary by jurisdiction, so please consult a licensed attorney before acting on them.";

/// Sentence every assistant reply must end with.
pub const ASSISTANT_CLOSING: &str = "Remember, this information is for general educational purposes and is not legal advice; please consult a qualified attorney about your specific situation.";

/// Fallback recommendation when the filing helper gets no model output.
pub const FILING_FALLBACK_RECOMMENDATION: &str = "AI was unable to determine suggestions";

const DOCUMENT_TYPES: &[&str] = &[
    "contract",
    "lease",
    "letter",
    "email",
    "court_filing",
    "police_report",
    "medical_record",
    "other",
];

const EVENT_TYPES: &[&str] = &[
    "incident",
    "communication",
    "filing",
    "hearing",
    "deadline",
    "payment",
    "other",
];

const CASE_TYPES: &[&str] = &[
    "eviction",
    "small_claims",
    "family",
    "employment",
    "consumer",
    "debt_collection",
    "other",
];

const COURT_LEVELS: &[&str] = &["small_claims", "district", "superior", "appellate", "federal"];

const CONFIDENCE_LEVELS: &[&str] = &["low", "medium", "high"];

const DISCOVERY_TYPES: &[&str] = &[
    "interrogatories",
    "requests_for_production",
    "requests_for_admission",
];

/// Every built-in task, in catalog order.
pub fn builtin_specs() -> Vec<TaskSpec> {
    vec![
        suggest_relevant_laws(),
        analyze_document_content(),
        suggest_strategies(),
        interactive_assistant(),
        analyze_timeline(),
        filing_decision_helper(),
        summarize_case(),
        generate_discovery_requests(),
    ]
}

fn string_list() -> FieldType {
    FieldType::array(FieldType::string())
}

fn disclaimer_field() -> FieldSchema {
    FieldSchema::optional("disclaimer", FieldType::string())
}

fn replace_disclaimer(text: &str) -> OutputOverride {
    OutputOverride::Replace {
        field: "disclaimer".to_string(),
        value: json!(text),
    }
}

fn suggest_relevant_laws() -> TaskSpec {
    TaskSpec {
        name: "suggest_relevant_laws".to_string(),
        description: "Identify statutes, regulations and doctrines that may bear on a case"
            .to_string(),
        system_prompt: None,
        input: ObjectSchema::new(vec![
            FieldSchema::required("caseDetails", FieldType::text(60))
                .describe("Plain-language description of the situation"),
            FieldSchema::optional("jurisdiction", FieldType::string()),
        ]),
        output: ObjectSchema::new(vec![
            FieldSchema::required("relevantLaws", FieldType::string())
                .describe("Laws that may apply, with a short note on why"),
            FieldSchema::required("confidenceScore", FieldType::number_in(0.0, 1.0)),
        ]),
        template: "\
Based on the case details below, list the laws, regulations and legal doctrines \
that may be relevant. For each, explain in one or two sentences why it may apply. \
Then give a confidence score between 0 and 1 for how well the details support \
your list.

Case details:
{{caseDetails}}
{{#if jurisdiction}}
Jurisdiction: {{jurisdiction}}. Prefer laws from this jurisdiction.
{{/if}}"
            .to_string(),
        overrides: Vec::new(),
        fallback: None,
        short_circuit: None,
    }
}

fn analyze_document_content() -> TaskSpec {
    TaskSpec {
        name: "analyze_document_content".to_string(),
        description: "Summarize a document and note how it may relate to a case".to_string(),
        system_prompt: None,
        input: ObjectSchema::new(vec![
            FieldSchema::required("documentText", FieldType::text(20)),
            FieldSchema::required("documentType", FieldType::enumeration(DOCUMENT_TYPES)),
            FieldSchema::optional("caseContext", FieldType::string()),
        ]),
        output: ObjectSchema::new(vec![
            FieldSchema::required("summary", FieldType::string()),
            FieldSchema::required("keyPoints", string_list()),
            FieldSchema::required("potentialRelevance", FieldType::string()),
            disclaimer_field(),
        ]),
        template: "\
Analyze the following {{documentType}} document. Summarize it, list its key points, \
and describe how it could be relevant to the person's situation. Do not judge \
whether it is admissible as evidence.
{{#if caseContext}}
Case context: {{caseContext}}
{{/if}}
Document text:
{{documentText}}"
            .to_string(),
        overrides: vec![replace_disclaimer(DOCUMENT_ANALYSIS_DISCLAIMER)],
        fallback: None,
        short_circuit: None,
    }
}

fn suggest_strategies() -> TaskSpec {
    TaskSpec {
        name: "suggest_strategies".to_string(),
        description: "Propose possible approaches for handling a case".to_string(),
        system_prompt: None,
        input: ObjectSchema::new(vec![
            FieldSchema::required("caseSummary", FieldType::text(50)),
            FieldSchema::optional("jurisdiction", FieldType::string()),
            FieldSchema::optional("goals", string_list()),
        ]),
        output: ObjectSchema::new(vec![
            FieldSchema::required(
                "strategies",
                FieldType::array_between(
                    FieldType::object(vec![
                        FieldSchema::required("title", FieldType::string()),
                        FieldSchema::required("description", FieldType::string()),
                        FieldSchema::optional("considerations", FieldType::string()),
                    ]),
                    1,
                    8,
                ),
            ),
            disclaimer_field(),
        ]),
        template: "\
Suggest practical strategies a self-represented person could consider for the case \
below. Give each strategy a short title, a description, and any risks or \
considerations.

Case summary:
{{caseSummary}}
{{#if jurisdiction}}
Jurisdiction: {{jurisdiction}}
{{/if}}{{#if goals}}
The person's goals:
{{#each goals}}- {{this}}
{{/each}}{{/if}}"
            .to_string(),
        overrides: vec![replace_disclaimer(STRATEGY_DISCLAIMER)],
        fallback: None,
        short_circuit: None,
    }
}

fn interactive_assistant() -> TaskSpec {
    TaskSpec {
        name: "interactive_assistant".to_string(),
        description: "Answer a legal-process question in conversation".to_string(),
        system_prompt: Some(
            "You are a friendly assistant that explains legal processes in plain language. \
You do not give legal advice. Respond only with a JSON object that matches the \
requested schema."
                .to_string(),
        ),
        input: ObjectSchema::new(vec![
            FieldSchema::required("userQuestion", FieldType::text(5)),
            FieldSchema::optional("caseContext", FieldType::string()),
            FieldSchema::optional(
                "previousMessages",
                FieldType::array(FieldType::object(vec![
                    FieldSchema::required("role", FieldType::enumeration(&["user", "assistant"])),
                    FieldSchema::required("content", FieldType::string()),
                ])),
            ),
        ]),
        output: ObjectSchema::new(vec![
            FieldSchema::required("responseText", FieldType::string()),
            FieldSchema::optional("suggestedFollowUps", string_list()),
        ]),
        template: "\
{{#if caseContext}}Case context: {{caseContext}}

{{/if}}{{#if previousMessages}}Conversation so far:
{{#each previousMessages}}{{role}}: {{content}}
{{/each}}
{{/if}}Question: {{userQuestion}}

Answer clearly and briefly. Optionally suggest up to three follow-up questions."
            .to_string(),
        overrides: vec![OutputOverride::EnsureSuffix {
            field: "responseText".to_string(),
            text: ASSISTANT_CLOSING.to_string(),
        }],
        fallback: None,
        short_circuit: None,
    }
}

fn analyze_timeline() -> TaskSpec {
    TaskSpec {
        name: "analyze_timeline".to_string(),
        description: "Find patterns and gaps in a case timeline".to_string(),
        system_prompt: None,
        input: ObjectSchema::new(vec![
            FieldSchema::required(
                "events",
                FieldType::array_between(
                    FieldType::object(vec![
                        FieldSchema::required("date", FieldType::Date),
                        FieldSchema::required("eventType", FieldType::enumeration(EVENT_TYPES)),
                        FieldSchema::required("description", FieldType::text(3)),
                    ]),
                    0,
                    200,
                ),
            ),
            FieldSchema::optional("caseContext", FieldType::string()),
        ]),
        output: ObjectSchema::new(vec![
            FieldSchema::required("insights", FieldType::string()),
            FieldSchema::required("potentialGaps", string_list()),
            FieldSchema::required("suggestedNextSteps", string_list()),
        ]),
        template: "\
Review this timeline of events. Describe patterns or insights, point out gaps \
where documentation may be missing, and suggest next steps.
{{#if caseContext}}
Case context: {{caseContext}}
{{/if}}
Events:
{{#each events}}- {{date}} ({{eventType}}): {{description}}
{{/each}}"
            .to_string(),
        overrides: Vec::new(),
        fallback: Some(json!({
            "insights": "AI was unable to analyze the timeline at this time.",
            "potentialGaps": [],
            "suggestedNextSteps": []
        })),
        short_circuit: Some(ShortCircuit {
            when: ShortCircuitCondition::EmptyArray {
                field: "events".to_string(),
            },
            response: json!({
                "insights": "No events to analyze yet. Add events to your timeline to receive insights.",
                "potentialGaps": [],
                "suggestedNextSteps": ["Add dated events to your timeline."]
            }),
        }),
    }
}

fn filing_decision_helper() -> TaskSpec {
    TaskSpec {
        name: "filing_decision_helper".to_string(),
        description: "Help decide whether and where to file".to_string(),
        system_prompt: None,
        input: ObjectSchema::new(vec![
            FieldSchema::required("situation", FieldType::text(40)),
            FieldSchema::required("caseType", FieldType::enumeration(CASE_TYPES)),
            FieldSchema::optional("courtLevel", FieldType::enumeration(COURT_LEVELS)),
            FieldSchema::optional("deadlineInfo", FieldType::string()),
        ]),
        output: ObjectSchema::new(vec![
            FieldSchema::required("recommendation", FieldType::string()),
            FieldSchema::required("considerations", string_list()),
            FieldSchema::required("confidence", FieldType::enumeration(CONFIDENCE_LEVELS)),
        ]),
        template: "\
A person with a {{caseType}} matter is deciding whether to file. Give a \
recommendation, the main considerations, and your confidence (low, medium or high).

Situation:
{{situation}}
{{#if courtLevel}}
Court level under consideration: {{courtLevel}}
{{/if}}{{#if deadlineInfo}}
Known deadlines: {{deadlineInfo}}
{{/if}}"
            .to_string(),
        overrides: Vec::new(),
        fallback: Some(json!({
            "recommendation": FILING_FALLBACK_RECOMMENDATION,
            "considerations": [],
            "confidence": "low"
        })),
        short_circuit: None,
    }
}

fn summarize_case() -> TaskSpec {
    TaskSpec {
        name: "summarize_case".to_string(),
        description: "Summarize the key facts, issues and parties of a case".to_string(),
        system_prompt: None,
        input: ObjectSchema::new(vec![FieldSchema::required(
            "caseDetails",
            FieldType::text(60),
        )]),
        output: ObjectSchema::new(vec![
            FieldSchema::required("summary", FieldType::string()),
            FieldSchema::required(
                "keyIssues",
                FieldType::array_between(FieldType::string(), 1, 10),
            ),
            FieldSchema::required("partiesInvolved", string_list()),
        ]),
        template: "\
Summarize the case below in a short paragraph, list the key legal issues, and name \
the parties involved.

Case details:
{{caseDetails}}"
            .to_string(),
        overrides: Vec::new(),
        fallback: None,
        short_circuit: None,
    }
}

fn generate_discovery_requests() -> TaskSpec {
    TaskSpec {
        name: "generate_discovery_requests".to_string(),
        description: "Draft discovery requests for a case".to_string(),
        system_prompt: None,
        input: ObjectSchema::new(vec![
            FieldSchema::required("caseSummary", FieldType::text(50)),
            FieldSchema::required("discoveryType", FieldType::enumeration(DISCOVERY_TYPES)),
            FieldSchema::optional("focusAreas", FieldType::string()),
        ]),
        output: ObjectSchema::new(vec![
            FieldSchema::required(
                "requests",
                FieldType::array_between(FieldType::string(), 1, 25),
            ),
            disclaimer_field(),
        ]),
        template: "\
Draft numbered {{discoveryType}} suitable for the case below. Keep each request \
specific and tied to the facts.

Case summary:
{{caseSummary}}
{{#if focusAreas}}
Focus on: {{focusAreas}}
{{/if}}"
            .to_string(),
        overrides: vec![replace_disclaimer(STRATEGY_DISCLAIMER)],
        fallback: None,
        short_circuit: None,
    }
}
