//! Parsing of research-model replies into typed directives.
//!
//! The model is asked for one JSON object per turn:
//! `{"action":"call_tool","tool":"web_search","input":{"query":"..."}}` or
//! `{"action":"finish","notes":"..."}`. Replies may wrap that object in prose
//! or a fenced code block.

use scout_core::{ToolError, ToolInvocation};
use serde_json::{Map, Value};

const CALL_TOOL: &str = "call_tool";
const FINISH: &str = "finish";
/// Keys that carry finish notes, in lookup order.
const NOTE_KEYS: [&str; 4] = ["notes", "response", "answer", "summary"];

/// What the research model asked for on one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    CallTool(ToolInvocation),
    Finish { notes: String },
    /// A JSON directive that names an unknown tool or carries bad arguments.
    Invalid { tool: Option<String>, error: ToolError },
}

impl Directive {
    /// Parse a completion. Text without any JSON object counts as `Finish`.
    pub fn parse(content: &str) -> Self {
        match extract_json(content) {
            Some(Value::Object(map)) => parse_object(map),
            _ => Directive::Finish {
                notes: content.trim().to_string(),
            },
        }
    }

    /// The finish directive in wire form, used when replaying a transcript.
    pub fn finish_json(notes: &str) -> Value {
        serde_json::json!({ "action": FINISH, "notes": notes })
    }
}

fn parse_object(map: Map<String, Value>) -> Directive {
    let tool = map.get("tool").and_then(Value::as_str).map(str::to_string);
    let action = map
        .get("action")
        .and_then(Value::as_str)
        .map(|action| action.trim().to_ascii_lowercase());

    match action.as_deref() {
        Some(CALL_TOOL) | Some("tool") | Some("call") => call_tool(tool, &map),
        Some(FINISH) | Some("final") | Some("done") => Directive::Finish {
            notes: notes_of(&map),
        },
        None if tool.is_some() => call_tool(tool, &map),
        None if NOTE_KEYS.iter().any(|key| map.contains_key(*key)) => Directive::Finish {
            notes: notes_of(&map),
        },
        None => Directive::Invalid {
            tool: None,
            error: ToolError::InvalidArguments(
                "directive is missing the `action` field".to_string(),
            ),
        },
        Some(other) => Directive::Invalid {
            tool,
            error: ToolError::InvalidArguments(format!(
                "unknown action `{other}`; expected `{CALL_TOOL}` or `{FINISH}`"
            )),
        },
    }
}

fn call_tool(tool: Option<String>, map: &Map<String, Value>) -> Directive {
    let Some(name) = tool.filter(|name| !name.trim().is_empty()) else {
        return Directive::Invalid {
            tool: None,
            error: ToolError::InvalidArguments(
                "call_tool directive is missing the `tool` field".to_string(),
            ),
        };
    };

    let input = map
        .get("input")
        .or_else(|| map.get("arguments"))
        .cloned()
        .unwrap_or(Value::Null);

    match ToolInvocation::from_parts(&name, input) {
        Ok(invocation) => Directive::CallTool(invocation),
        Err(error) => Directive::Invalid {
            tool: Some(name),
            error,
        },
    }
}

fn notes_of(map: &Map<String, Value>) -> String {
    NOTE_KEYS
        .iter()
        .find_map(|key| map.get(*key))
        .map(|value| match value {
            Value::String(text) => text.trim().to_string(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

/// Find the first JSON value in `content`: whole text, fenced block, or outermost braces.
pub fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(start) = trimmed.find("```") {
        let fenced = &trimmed[start + 3..];
        let fenced = fenced
            .strip_prefix("json")
            .or_else(|| fenced.strip_prefix("JSON"))
            .unwrap_or(fenced);
        if let Some(end) = fenced.find("```") {
            if let Ok(value) = serde_json::from_str::<Value>(fenced[..end].trim()) {
                return Some(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return Some(value);
            }
        }
    }

    None
}
