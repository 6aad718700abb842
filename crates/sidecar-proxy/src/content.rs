// ── Outbound content extraction ──────────────────────────────────────────────
// Pulls the human-readable text out of a request or response body so the
// analyzer has something to score. Best-effort across dialects; an
// unrecognized shape yields no text rather than an error — a request the
// proxy can't parse for scanning purposes must still be forwarded.

use serde_json::Value;

/// Extracts the latest user-authored text from an outbound request body,
/// trying the OpenAI/Anthropic `messages` shape, then Gemini's `contents`,
/// then a bare Ollama `prompt` field.
pub fn extract_request_text(body: &Value) -> Option<String> {
    if let Some(messages) = body.get("messages").and_then(|m| m.as_array()) {
        let texts: Vec<String> = messages
            .iter()
            .filter(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))
            .filter_map(message_text)
            .collect();
        if !texts.is_empty() {
            return Some(texts.join("\n"));
        }
    }

    if let Some(contents) = body.get("contents").and_then(|c| c.as_array()) {
        let texts: Vec<String> = contents
            .iter()
            .filter_map(|c| c.get("parts").and_then(|p| p.as_array()))
            .flat_map(|parts| parts.iter().filter_map(|p| p.get("text").and_then(|t| t.as_str())))
            .map(|s| s.to_string())
            .collect();
        if !texts.is_empty() {
            return Some(texts.join("\n"));
        }
    }

    body.get("prompt").and_then(|p| p.as_str()).map(|s| s.to_string())
}

/// Extracts the assistant-authored text from a non-streaming response body,
/// across the same dialect set.
pub fn extract_response_text(body: &Value) -> Option<String> {
    if let Some(choices) = body.get("choices").and_then(|c| c.as_array()) {
        let texts: Vec<String> = choices
            .iter()
            .filter_map(|c| c.get("message"))
            .filter_map(message_text)
            .collect();
        if !texts.is_empty() {
            return Some(texts.join("\n"));
        }
    }

    if let Some(content) = body.get("content").and_then(|c| c.as_array()) {
        let texts: Vec<String> = content
            .iter()
            .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
            .map(|s| s.to_string())
            .collect();
        if !texts.is_empty() {
            return Some(texts.join("\n"));
        }
    }

    if let Some(candidates) = body.get("candidates").and_then(|c| c.as_array()) {
        let texts: Vec<String> = candidates
            .iter()
            .filter_map(|c| c.get("content").and_then(|c| c.get("parts")).and_then(|p| p.as_array()))
            .flat_map(|parts| parts.iter().filter_map(|p| p.get("text").and_then(|t| t.as_str())))
            .map(|s| s.to_string())
            .collect();
        if !texts.is_empty() {
            return Some(texts.join("\n"));
        }
    }

    if let Some(message) = body.get("message") {
        if let Some(text) = message_text(message) {
            return Some(text);
        }
    }

    body.get("response").and_then(|r| r.as_str()).map(|s| s.to_string())
}

fn message_text(message: &Value) -> Option<String> {
    match message.get("content") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(blocks)) => {
            let texts: Vec<String> = blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .map(|s| s.to_string())
                .collect();
            if texts.is_empty() { None } else { Some(texts.join("\n")) }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_openai_style_request_text() {
        let body = json!({"messages": [{"role": "system", "content": "be nice"}, {"role": "user", "content": "hello there"}]});
        assert_eq!(extract_request_text(&body).as_deref(), Some("hello there"));
    }

    #[test]
    fn extracts_gemini_style_request_text() {
        let body = json!({"contents": [{"parts": [{"text": "what is rust"}]}]});
        assert_eq!(extract_request_text(&body).as_deref(), Some("what is rust"));
    }

    #[test]
    fn extracts_openai_style_response_text() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "here you go"}}]});
        assert_eq!(extract_response_text(&body).as_deref(), Some("here you go"));
    }

    #[test]
    fn extracts_anthropic_style_response_text() {
        let body = json!({"content": [{"type": "text", "text": "sure thing"}]});
        assert_eq!(extract_response_text(&body).as_deref(), Some("sure thing"));
    }

    #[test]
    fn unrecognized_body_yields_none() {
        assert!(extract_request_text(&json!({"foo": "bar"})).is_none());
        assert!(extract_response_text(&json!({"foo": "bar"})).is_none());
    }
}
