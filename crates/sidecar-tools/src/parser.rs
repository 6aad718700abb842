// ── Tool-call parser ─────────────────────────────────────────────────────────
// Extracts tool invocations out of a model response body, across the two
// dialects providers ship. Fail-open by design: a shape we don't recognize
// yields an empty list, never an error — a parsing gap here must never take
// down the proxy path that calls it.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Which provider-response dialect a parsed invocation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFormat {
    OpenAi,
    Anthropic,
}

/// One tool invocation extracted from a response body.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolInvocation {
    pub function_name: String,
    pub arguments_hash: String,
    pub provider_format: ProviderFormat,
    pub tool_call_id: Option<String>,
    pub index: usize,
}

/// Extracts every tool invocation from a parsed model-response JSON body.
/// Tries the OpenAI-family shape first, then the Anthropic shape; an
/// unrecognized body shape returns an empty vector.
pub fn extract_tool_calls(body: &Value) -> Vec<ToolInvocation> {
    let openai = extract_openai(body);
    if !openai.is_empty() {
        return openai;
    }
    extract_anthropic(body)
}

fn extract_openai(body: &Value) -> Vec<ToolInvocation> {
    let mut out = Vec::new();
    let Some(choices) = body.get("choices").and_then(|c| c.as_array()) else {
        return out;
    };
    let mut index = 0;
    for choice in choices {
        let Some(tool_calls) = choice
            .get("message")
            .and_then(|m| m.get("tool_calls"))
            .and_then(|t| t.as_array())
        else {
            continue;
        };
        for call in tool_calls {
            let Some(function) = call.get("function") else { continue };
            let Some(name) = function.get("name").and_then(|n| n.as_str()) else { continue };
            let arguments = function.get("arguments").cloned().unwrap_or(Value::Null);
            out.push(ToolInvocation {
                function_name: name.to_string(),
                arguments_hash: hash_arguments(&arguments),
                provider_format: ProviderFormat::OpenAi,
                tool_call_id: call.get("id").and_then(|v| v.as_str()).map(|s| s.to_string()),
                index,
            });
            index += 1;
        }
    }
    out
}

fn extract_anthropic(body: &Value) -> Vec<ToolInvocation> {
    let mut out = Vec::new();
    let Some(content) = body.get("content").and_then(|c| c.as_array()) else {
        return out;
    };
    for (index, block) in content.iter().enumerate() {
        if block.get("type").and_then(|t| t.as_str()) != Some("tool_use") {
            continue;
        }
        let Some(name) = block.get("name").and_then(|n| n.as_str()) else { continue };
        let input = block.get("input").cloned().unwrap_or(Value::Null);
        out.push(ToolInvocation {
            function_name: name.to_string(),
            arguments_hash: hash_arguments(&input),
            provider_format: ProviderFormat::Anthropic,
            tool_call_id: block.get("id").and_then(|v| v.as_str()).map(|s| s.to_string()),
            index,
        });
    }
    out
}

/// Hashes canonicalized arguments so semantically identical calls — same
/// keys and values, any key order, either dialect's argument encoding
/// (OpenAI ships a JSON *string*, Anthropic a JSON *object*) — hash equal.
fn hash_arguments(arguments: &Value) -> String {
    let parsed = match arguments {
        Value::String(s) => serde_json::from_str::<Value>(s).unwrap_or(Value::String(s.clone())),
        other => other.clone(),
    };
    let canonical = canonicalize(&parsed);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Serializes `value` with object keys sorted recursively, so key order in
/// the source never affects the hash.
fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{:?}:{}", k, canonicalize(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_openai_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "id": "call_1",
                        "function": { "name": "aws.iam_create_user", "arguments": "{\"username\":\"bob\"}" }
                    }]
                }
            }]
        });
        let calls = extract_tool_calls(&body);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function_name, "aws.iam_create_user");
        assert_eq!(calls[0].provider_format, ProviderFormat::OpenAi);
        assert_eq!(calls[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn extracts_anthropic_tool_use_blocks() {
        let body = json!({
            "content": [
                { "type": "text", "text": "I'll do that." },
                { "type": "tool_use", "id": "toolu_1", "name": "gmail.send_email", "input": {"to": "x@y.com"} }
            ]
        });
        let calls = extract_tool_calls(&body);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function_name, "gmail.send_email");
        assert_eq!(calls[0].provider_format, ProviderFormat::Anthropic);
    }

    #[test]
    fn unrecognized_shape_yields_empty_not_error() {
        let body = json!({ "something": "else entirely" });
        assert!(extract_tool_calls(&body).is_empty());
    }

    #[test]
    fn arguments_hash_is_stable_across_key_order_and_dialect_encoding() {
        let openai_args = json!("{\"b\":2,\"a\":1}");
        let anthropic_args = json!({"a": 1, "b": 2});
        assert_eq!(hash_arguments(&openai_args), hash_arguments(&anthropic_args));
    }

    #[test]
    fn hash_is_16_hex_chars() {
        let hash = hash_arguments(&json!({"x": 1}));
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
