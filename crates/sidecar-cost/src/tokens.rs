// ── Token extraction ─────────────────────────────────────────────────────────
// Pulls prompt/completion/cached token counts out of a provider response
// body. Tries every known shape in turn and returns the first match — the
// recorder doesn't need to know in advance which dialect a given provider
// speaks, and this keeps one-off re-hosted providers (an OpenAI-compatible
// shape served under an unfamiliar provider label) working for free.

use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cached_input_tokens: i64,
}

pub fn extract(body: &Value) -> Option<TokenUsage> {
    extract_openai(body)
        .or_else(|| extract_anthropic(body))
        .or_else(|| extract_gemini(body))
        .or_else(|| extract_ollama(body))
}

fn extract_openai(body: &Value) -> Option<TokenUsage> {
    // The "responses API" wraps the real payload one level down.
    let usage = body
        .get("usage")
        .or_else(|| body.get("response").and_then(|r| r.get("usage")))?;

    let input_tokens = usage.get("prompt_tokens").and_then(|v| v.as_i64())?;
    let output_tokens = usage.get("completion_tokens").and_then(|v| v.as_i64()).unwrap_or(0);
    let cached_input_tokens = usage
        .get("prompt_tokens_details")
        .and_then(|d| d.get("cached_tokens"))
        .or_else(|| usage.get("input_tokens_details").and_then(|d| d.get("cached_tokens")))
        .and_then(|v| v.as_i64())
        .unwrap_or(0);

    Some(TokenUsage { input_tokens, output_tokens, cached_input_tokens })
}

fn extract_anthropic(body: &Value) -> Option<TokenUsage> {
    let usage = body.get("usage")?;
    let input_tokens = usage.get("input_tokens").and_then(|v| v.as_i64())?;
    let output_tokens = usage.get("output_tokens").and_then(|v| v.as_i64()).unwrap_or(0);
    let cached_input_tokens = usage.get("cache_read_input_tokens").and_then(|v| v.as_i64()).unwrap_or(0);
    Some(TokenUsage { input_tokens, output_tokens, cached_input_tokens })
}

fn extract_gemini(body: &Value) -> Option<TokenUsage> {
    let usage = body.get("usageMetadata")?;
    let input_tokens = usage.get("promptTokenCount").and_then(|v| v.as_i64())?;
    let output_tokens = usage.get("candidatesTokenCount").and_then(|v| v.as_i64()).unwrap_or(0);
    let cached_input_tokens = usage.get("cachedContentTokenCount").and_then(|v| v.as_i64()).unwrap_or(0);
    Some(TokenUsage { input_tokens, output_tokens, cached_input_tokens })
}

fn extract_ollama(body: &Value) -> Option<TokenUsage> {
    let input_tokens = body.get("prompt_eval_count").and_then(|v| v.as_i64())?;
    let output_tokens = body.get("eval_count").and_then(|v| v.as_i64()).unwrap_or(0);
    Some(TokenUsage { input_tokens, output_tokens, cached_input_tokens: 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_openai_usage() {
        let body = json!({"usage": {"prompt_tokens": 100, "completion_tokens": 50, "prompt_tokens_details": {"cached_tokens": 20}}});
        let usage = extract(&body).unwrap();
        assert_eq!(usage.input_tokens, 100);
        assert_eq!(usage.output_tokens, 50);
        assert_eq!(usage.cached_input_tokens, 20);
    }

    #[test]
    fn extracts_openai_responses_api_wrapper() {
        let body = json!({"response": {"usage": {"prompt_tokens": 10, "completion_tokens": 5}}});
        let usage = extract(&body).unwrap();
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.output_tokens, 5);
    }

    #[test]
    fn extracts_anthropic_usage() {
        let body = json!({"usage": {"input_tokens": 1000, "output_tokens": 500, "cache_read_input_tokens": 200}});
        let usage = extract(&body).unwrap();
        assert_eq!(usage.input_tokens, 1000);
        assert_eq!(usage.cached_input_tokens, 200);
    }

    #[test]
    fn extracts_gemini_usage() {
        let body = json!({"usageMetadata": {"promptTokenCount": 30, "candidatesTokenCount": 10, "cachedContentTokenCount": 5}});
        let usage = extract(&body).unwrap();
        assert_eq!(usage.input_tokens, 30);
        assert_eq!(usage.cached_input_tokens, 5);
    }

    #[test]
    fn extracts_ollama_usage_with_no_cache_field() {
        let body = json!({"prompt_eval_count": 40, "eval_count": 12});
        let usage = extract(&body).unwrap();
        assert_eq!(usage.input_tokens, 40);
        assert_eq!(usage.cached_input_tokens, 0);
    }

    #[test]
    fn unrecognized_body_yields_none() {
        let body = json!({"error": "boom"});
        assert!(extract(&body).is_none());
    }
}
