use serde_json::Value;

/// Node types whose children form a line of their own.
const BLOCK_NODES: &[&str] = &[
    "paragraph",
    "heading",
    "blockquote",
    "codeBlock",
    "listItem",
    "tableRow",
    "panel",
];

/// Flatten Jira's Atlassian Document Format (ADF) into plain text.
///
/// Block nodes are separated by newlines. Plain strings (API v2 bodies) pass through.
pub fn extract_text_from_adf(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => {
            let mut out = String::new();
            collect(other, &mut out);
            out.trim_end().to_string()
        }
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn collect(value: &Value, out: &mut String) {
    match value {
        Value::Array(nodes) => nodes.iter().for_each(|n| collect(n, out)),
        Value::Object(obj) => {
            let node_type = obj.get("type").and_then(Value::as_str).unwrap_or("");
            match node_type {
                "text" => {
                    if let Some(text) = obj.get("text").and_then(Value::as_str) {
                        out.push_str(text);
                    }
                }
                "hardBreak" => out.push('\n'),
                "mention" => {
                    if let Some(text) = obj
                        .get("attrs")
                        .and_then(|a| a.get("text"))
                        .and_then(Value::as_str)
                    {
                        out.push_str(text);
                    }
                }
                _ => {
                    if let Some(content) = obj.get("content") {
                        collect(content, out);
                    }
                    if BLOCK_NODES.contains(&node_type) && !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
        }
        _ => {}
    }
}
