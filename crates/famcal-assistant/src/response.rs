//! Pull tool calls and follow-up buttons out of free-form model text.

use serde_json::Value;
use tracing::warn;

use crate::tools::{ToolCall, ToolCallError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// Model text with the JSON blocks removed
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub followup_buttons: Vec<String>,
    /// Objects that named a tool but failed validation
    pub rejected: Vec<ToolCallError>,
}

impl ParsedResponse {
    fn absorb(&mut self, value: Value) {
        match value {
            Value::Array(items) => {
                for item in items {
                    self.absorb(item);
                }
            }
            Value::Object(ref object) => {
                if object.contains_key("tool") {
                    match ToolCall::from_value(&value) {
                        Ok(call) => self.tool_calls.push(call),
                        Err(e) => {
                            warn!("Rejected tool call: {}", e);
                            self.rejected.push(e);
                        }
                    }
                    return;
                }
                if let Some(Value::Array(calls)) = object.get("tool_calls") {
                    for call in calls.clone() {
                        self.absorb(call);
                    }
                }
                if let Some(Value::Array(buttons)) = object.get("followup_buttons") {
                    self.followup_buttons.extend(
                        buttons
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::trim)
                            .filter(|b| !b.is_empty())
                            .map(str::to_string),
                    );
                }
                for key in ["content", "message"] {
                    if let Some(Value::String(text)) = object.get(key) {
                        push_text(&mut self.content, text);
                    }
                }
            }
            _ => {}
        }
    }
}

fn is_structured(value: &Value) -> bool {
    match value {
        Value::Object(o) => {
            o.contains_key("tool") || o.contains_key("tool_calls") || o.contains_key("followup_buttons")
        }
        Value::Array(items) => !items.is_empty() && items.iter().all(is_structured),
        _ => false,
    }
}

fn push_text(out: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(text);
}

/// Byte offset just past the bracket closing the one at `open`, honoring
/// JSON strings.
fn balanced_end(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split out ```` ``` ```` fenced blocks. Returns the surrounding text and
/// the block bodies.
fn split_fences(text: &str) -> (String, Vec<String>) {
    let mut prose = String::new();
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let Some(close) = after.find("```") else {
            break;
        };
        prose.push_str(&rest[..open]);
        let body = &after[..close];
        // drop the info string ("json") on the opening line
        let body = match body.find('\n') {
            Some(nl) if !body[..nl].trim_start().starts_with(['{', '[']) => &body[nl + 1..],
            _ => body,
        };
        blocks.push(body.trim().to_string());
        rest = &after[close + 3..];
    }
    prose.push_str(rest);
    (prose, blocks)
}

/// Parse a model reply into tool calls, follow-up buttons and the prose to
/// show the user. Malformed JSON is logged and skipped.
pub fn parse_model_response(text: &str) -> ParsedResponse {
    let mut parsed = ParsedResponse::default();
    let (prose, blocks) = split_fences(text);

    for block in blocks {
        match serde_json::from_str::<Value>(&block) {
            Ok(value) if is_structured(&value) => parsed.absorb(value),
            Ok(_) => push_text(&mut parsed.content, &block),
            Err(e) => warn!("Skipping malformed JSON block from model: {}", e),
        }
    }

    let mut remaining = String::new();
    let mut cursor = 0;
    let mut search = 0;
    while let Some(offset) = prose[search..].find(['{', '[']) {
        let open = search + offset;
        let Some(end) = balanced_end(&prose, open) else {
            search = open + 1;
            continue;
        };
        match serde_json::from_str::<Value>(&prose[open..end]) {
            Ok(value) if is_structured(&value) => {
                remaining.push_str(&prose[cursor..open]);
                parsed.absorb(value);
                cursor = end;
                search = end;
            }
            Ok(_) => search = end,
            Err(e) => {
                if prose[open..end].contains("\"tool\"") {
                    warn!("Skipping malformed tool call JSON: {}", e);
                    remaining.push_str(&prose[cursor..open]);
                    cursor = end;
                    search = end;
                } else {
                    search = open + 1;
                }
            }
        }
    }
    remaining.push_str(&prose[cursor..]);

    let prose_text = collapse_blank_lines(&remaining);
    let mut content = prose_text;
    push_text(&mut content, &parsed.content);
    parsed.content = content;
    parsed
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::new();
    let mut blank_run = 0;
    for line in text.trim().lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.trim_end().to_string()
}
