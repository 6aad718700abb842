// ── Proxy request pipeline ───────────────────────────────────────────────────
// The six-step handling described for a single proxied call: identify,
// budget pre-check, rewrite+forward, stream back (with inline scanning for
// non-streaming responses), post-call bookkeeping off the response path, and
// verbatim upstream-failure propagation.

use crate::circuit::CircuitBreaker;
use crate::content::{extract_request_text, extract_response_text};
use crate::providers::{self, AuthHeaderTemplate, ProviderRoute};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use serde_json::{json, Value};
use sidecar_analyzer::ThreatAnalyzer;
use sidecar_cloud::{CredentialKey, Vault};
use sidecar_cost::{BudgetDecision, BudgetGuardian, CostRecorder};
use sidecar_core::models::AnalyzedEvent;
use sidecar_core::repo::EventsRepository;
use sidecar_core::Store;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::task::{Context, Poll};
use std::time::Duration;
use uuid::Uuid;

const TEE_CAP_BYTES: usize = 256 * 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const AGENT_HEADER: &str = "x-sv-agent-id";

static CIRCUITS: LazyLock<HashMap<&'static str, CircuitBreaker>> =
    LazyLock::new(|| providers::PROVIDERS.iter().map(|p| (p.id, CircuitBreaker::with_defaults())).collect());

#[derive(Clone)]
pub struct ProxyState {
    pub store: Arc<Store>,
    pub analyzer: Arc<ThreatAnalyzer>,
    pub cost_recorder: Arc<CostRecorder>,
    pub http: reqwest::Client,
    pub block_mode: Arc<AtomicBool>,
}

impl ProxyState {
    pub fn new(store: Arc<Store>, analyzer: Arc<ThreatAnalyzer>, cost_recorder: Arc<CostRecorder>, block_mode: bool) -> Self {
        let http = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build().unwrap_or_default();
        Self { store, analyzer, cost_recorder, http, block_mode: Arc::new(AtomicBool::new(block_mode)) }
    }
}

/// Handler bound to `/{provider}/*rest` for every HTTP method.
pub async fn handle(
    State(state): State<ProxyState>,
    Path((provider_prefix, rest)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(route) = providers::lookup(&provider_prefix) else {
        return error_response(StatusCode::NOT_FOUND, "unknown_provider", format!("no provider registered for '{provider_prefix}'"));
    };

    let agent_id = headers
        .get(AGENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("default")
        .to_string();
    let request_id = Uuid::new_v4().to_string();

    // Step 2: budget pre-check.
    let guardian = BudgetGuardian::new(&state.store);
    let mut budget_status: Option<&'static str> = None;
    match guardian.evaluate(&agent_id) {
        Ok(BudgetDecision::Deny { retry_after_seconds }) => {
            return budget_denied_response(&agent_id, retry_after_seconds);
        }
        Ok(BudgetDecision::Warn) => budget_status = Some("warn"),
        Ok(BudgetDecision::Allow) => {}
        Err(err) => log::warn!("[proxy] budget check failed, allowing call: {err}"),
    }

    // Pre-flight scan of outbound user content, if parseable.
    let mut threat_status: &'static str = "none";
    let request_json: Option<Value> = serde_json::from_slice(&body).ok();
    if let Some(json_body) = &request_json {
        if let Some(text) = extract_request_text(json_body) {
            match state.analyzer.analyze(&text) {
                Ok(result) if result.is_threat && state.block_mode.load(Ordering::Relaxed) => {
                    log::warn!("[proxy] blocked outbound request for agent={agent_id} provider={} risk={}", route.id, result.risk_score);
                    return blocked_response(result.risk_score, result.threat_type.as_deref());
                }
                Ok(result) if result.is_threat => threat_status = "matched",
                Ok(_) => {}
                Err(err) => log::warn!("[analyzer] outbound scan failed: {err}"),
            }
        }
    }

    let circuit = CIRCUITS.get(route.id);
    if let Some(circuit) = circuit {
        if let Err(reason) = circuit.check() {
            return error_response(StatusCode::BAD_GATEWAY, "circuit_open", reason);
        }
    }

    // Step 3: rewrite and forward.
    let target_url = build_target_url(route, &rest, &headers);
    let mut outbound = state.http.request(method.clone(), &target_url);
    outbound = apply_forward_headers(outbound, &headers, route);
    outbound = outbound.body(body.clone());

    let upstream_result = outbound.send().await;

    let upstream = match upstream_result {
        Ok(resp) => {
            if let Some(circuit) = circuit {
                circuit.record_success();
            }
            resp
        }
        Err(err) => {
            if let Some(circuit) = circuit {
                circuit.record_failure();
            }
            log::warn!("[proxy] upstream call failed for provider={}: {err}", route.id);
            record_event_best_effort(&state, &request_id, &agent_id, route.id, None, Some(err.to_string()));
            return error_response(StatusCode::BAD_GATEWAY, "upstream_unreachable", err.to_string());
        }
    };

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let response_headers = upstream.headers().clone();
    let is_event_stream = response_headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("text/event-stream"))
        .unwrap_or(false);

    if !status.is_success() {
        let error_body = upstream.bytes().await.unwrap_or_default();
        record_event_best_effort(&state, &request_id, &agent_id, route.id, None, Some(String::from_utf8_lossy(&error_body).to_string()));
        return forward_verbatim(status, &response_headers, error_body, budget_status, threat_status);
    }

    if is_event_stream {
        return stream_through(state, upstream, status, response_headers, request_id, agent_id, route.id, budget_status, threat_status);
    }

    // Non-streaming: buffer fully so scanning can block before anything is sent.
    let response_body = match upstream.bytes().await {
        Ok(b) => b,
        Err(err) => return error_response(StatusCode::BAD_GATEWAY, "upstream_read_failed", err.to_string()),
    };
    let response_json: Option<Value> = serde_json::from_slice(&response_body).ok();

    if let Some(json_body) = &response_json {
        if let Some(text) = extract_response_text(json_body) {
            match state.analyzer.analyze(&text) {
                Ok(result) if result.is_threat && state.block_mode.load(Ordering::Relaxed) => {
                    log::warn!("[proxy] blocked inbound response for agent={agent_id} provider={} risk={}", route.id, result.risk_score);
                    spawn_post_call(state.clone(), request_id, agent_id, route.id.to_string(), request_json, response_json.clone());
                    return blocked_response(result.risk_score, result.threat_type.as_deref());
                }
                Ok(result) if result.is_threat => threat_status = "matched",
                Ok(_) => {}
                Err(err) => log::warn!("[analyzer] inbound scan failed: {err}"),
            }
        }
    }

    spawn_post_call(state.clone(), request_id, agent_id, route.id.to_string(), request_json, response_json);
    forward_verbatim(status, &response_headers, response_body, budget_status, threat_status)
}

fn build_target_url(route: &ProviderRoute, rest: &str, headers: &HeaderMap) -> String {
    let base = route.upstream_base.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    let mut url = format!("{base}/{rest}");
    if route.auth_header == AuthHeaderTemplate::QueryParamKey {
        if let Ok(Some(key)) = Vault::get(&CredentialKey::Provider(route.id.to_string())) {
            let separator = if url.contains('?') { '&' } else { '?' };
            url = format!("{url}{separator}key={key}");
        }
    }
    let _ = headers;
    url
}

fn apply_forward_headers(mut outbound: reqwest::RequestBuilder, inbound: &HeaderMap, route: &ProviderRoute) -> reqwest::RequestBuilder {
    for (name, value) in inbound.iter() {
        if is_hop_by_hop(name) || name.as_str().eq_ignore_ascii_case("authorization") || name.as_str().eq_ignore_ascii_case(AGENT_HEADER) {
            continue;
        }
        outbound = outbound.header(name.as_str(), value.as_bytes());
    }

    let credential = Vault::get(&CredentialKey::Provider(route.id.to_string())).ok().flatten();
    if let Some(key) = credential {
        outbound = match route.auth_header {
            AuthHeaderTemplate::BearerAuthorization => outbound.bearer_auth(&key),
            AuthHeaderTemplate::XApiKey => outbound.header("x-api-key", &key).header("authorization", format!("Bearer {key}")),
            AuthHeaderTemplate::QueryParamKey | AuthHeaderTemplate::None => outbound,
        };
    }
    outbound
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str().to_ascii_lowercase().as_str(),
        "connection" | "keep-alive" | "proxy-authenticate" | "proxy-authorization" | "te" | "trailers" | "transfer-encoding" | "upgrade" | "host"
    )
}

fn forward_verbatim(
    status: StatusCode,
    upstream_headers: &reqwest::header::HeaderMap,
    body: Bytes,
    budget_status: Option<&'static str>,
    threat_status: &'static str,
) -> Response {
    let mut response = Response::builder().status(status);
    for (name, value) in upstream_headers.iter() {
        if let Ok(name) = HeaderName::from_bytes(name.as_str().as_bytes()) {
            if is_hop_by_hop(&name) {
                continue;
            }
            if let Ok(value) = HeaderValue::from_bytes(value.as_bytes()) {
                response = response.header(name, value);
            }
        }
    }
    response = apply_sv_headers(response, budget_status, threat_status);
    response.body(Body::from(body)).unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Attaches the `X-SV-Budget-Status` (absent/`warn`/`block`) and
/// `X-SV-Threat` (`none`/`matched`/`blocked`) annotation headers described
/// for the proxy surface. Blocked responses build their own headers inline
/// via [`blocked_response`]; this only covers forwarded (allowed) calls.
fn apply_sv_headers(mut builder: axum::http::response::Builder, budget_status: Option<&'static str>, threat_status: &'static str) -> axum::http::response::Builder {
    if let Some(status) = budget_status {
        builder = builder.header(HeaderName::from_static("x-sv-budget-status"), HeaderValue::from_static(status));
    }
    builder = builder.header(HeaderName::from_static("x-sv-threat"), HeaderValue::from_static(threat_status));
    builder
}

/// Streams a `text/event-stream` response straight through to the client,
/// teeing into a bounded buffer for post-call (not inline) analysis —
/// consistent with not reassembling or rewriting content already in flight.
fn stream_through(
    state: ProxyState,
    upstream: reqwest::Response,
    status: StatusCode,
    upstream_headers: reqwest::header::HeaderMap,
    request_id: String,
    agent_id: String,
    provider_id: &'static str,
    budget_status: Option<&'static str>,
    threat_status: &'static str,
) -> Response {
    let (tx, rx) = tokio::sync::oneshot::channel::<Option<Vec<u8>>>();
    let tee = TeeStream {
        inner: Box::pin(upstream.bytes_stream()),
        buffer: Vec::new(),
        cap: TEE_CAP_BYTES,
        capped: false,
        on_complete: Some(tx),
    };

    tokio::spawn(async move {
        if let Ok(Some(captured)) = rx.await {
            let response_json: Option<Value> = serde_json::from_slice(&captured).ok();
            spawn_post_call(state, request_id, agent_id, provider_id.to_string(), None, response_json);
        }
    });

    let mut response = Response::builder().status(status);
    for (name, value) in upstream_headers.iter() {
        if let Ok(name) = HeaderName::from_bytes(name.as_str().as_bytes()) {
            if is_hop_by_hop(&name) {
                continue;
            }
            if let Ok(value) = HeaderValue::from_bytes(value.as_bytes()) {
                response = response.header(name, value);
            }
        }
    }
    response = apply_sv_headers(response, budget_status, threat_status);
    response
        .body(Body::from_stream(tee))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

struct TeeStream {
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: Vec<u8>,
    cap: usize,
    capped: bool,
    on_complete: Option<tokio::sync::oneshot::Sender<Option<Vec<u8>>>>,
}

impl Stream for TeeStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if !this.capped {
                    if this.buffer.len() + chunk.len() <= this.cap {
                        this.buffer.extend_from_slice(&chunk);
                    } else {
                        this.capped = true;
                        this.buffer.clear();
                    }
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(std::io::Error::other(err)))),
            Poll::Ready(None) => {
                if let Some(tx) = this.on_complete.take() {
                    let bytes = if this.capped { None } else { Some(std::mem::take(&mut this.buffer)) };
                    let _ = tx.send(bytes);
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Step 5: everything off the response path. Never allowed to fail the
/// inbound call — spawned after the response has already been decided.
fn spawn_post_call(state: ProxyState, request_id: String, agent_id: String, provider_id: String, request_json: Option<Value>, response_json: Option<Value>) {
    tokio::spawn(async move {
        let source_identifier = Some(format!("proxy:{provider_id}"));

        if let Some(response_body) = &response_json {
            for invocation in sidecar_tools::extract_tool_calls(response_body) {
                match sidecar_tools::evaluate(&state.store, &invocation.function_name) {
                    Ok(decision) => {
                        log::info!(
                            "[proxy] tool call {} by agent={agent_id} -> {:?} ({})",
                            invocation.function_name, decision.action, decision.reason
                        );
                    }
                    Err(err) => log::warn!("[proxy] permission evaluation failed for {}: {err}", invocation.function_name),
                }
            }

            let model_id = response_body.get("model").and_then(|m| m.as_str()).unwrap_or("unknown").to_string();
            state.cost_recorder.record(&agent_id, &provider_id, &model_id, Some(&request_id), response_body);
        }

        let text = response_json
            .as_ref()
            .and_then(extract_response_text)
            .or_else(|| request_json.as_ref().and_then(extract_request_text));

        if let Some(text) = text {
            match state.analyzer.analyze_to_event(&text, true, Some(request_id), source_identifier, None) {
                Ok(event) => {
                    if let Err(err) = EventsRepository::new(&state.store).insert(&event) {
                        log::warn!("[proxy] failed to persist analyzed event: {err}");
                    }
                }
                Err(err) => log::warn!("[proxy] post-call analysis failed: {err}"),
            }
        }
    });
}

fn record_event_best_effort(state: &ProxyState, request_id: &str, agent_id: &str, provider_id: &str, _response: Option<&Value>, upstream_error: Option<String>) {
    let Some(upstream_error) = upstream_error else { return };
    let mut metadata = std::collections::HashMap::new();
    metadata.insert("upstream_error".to_string(), json!(upstream_error));
    metadata.insert("provider".to_string(), json!(provider_id));

    let event = AnalyzedEvent {
        id: Uuid::new_v4().to_string(),
        request_id: Some(request_id.to_string()),
        text_content: None,
        text_hash: String::new(),
        text_length: 0,
        is_threat: false,
        threat_type: None,
        risk_score: 0,
        confidence: 0.0,
        matched_rules: Vec::new(),
        source_identifier: Some(format!("proxy:{provider_id}")),
        session_id: None,
        processing_time_ms: 0,
        created_at: chrono::Utc::now(),
        metadata,
        review: None,
    };
    if let Err(err) = EventsRepository::new(&state.store).insert(&event) {
        log::warn!("[proxy] failed to persist upstream-failure event for agent={agent_id}: {err}");
    }
}

fn blocked_response(risk_score: i64, threat_type: Option<&str>) -> Response {
    let body = json!({
        "error": {
            "kind": "threat_blocked",
            "message": "request blocked by threat policy",
            "detail": { "risk_score": risk_score, "threat_type": threat_type },
        }
    });
    (
        StatusCode::FORBIDDEN,
        [(HeaderName::from_static("x-sv-threat"), HeaderValue::from_static("blocked"))],
        axum::Json(body),
    )
        .into_response()
}

fn budget_denied_response(agent_id: &str, retry_after_seconds: i64) -> Response {
    let body = json!({
        "error": {
            "kind": "budget_exceeded",
            "message": format!("daily budget exceeded for agent '{agent_id}'"),
            "detail": { "retry_after_seconds": retry_after_seconds },
        }
    });
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(HeaderName::from_static("retry-after"), HeaderValue::from_str(&retry_after_seconds.to_string()).unwrap_or(HeaderValue::from_static("86400")))],
        axum::Json(body),
    )
        .into_response()
}

fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    (status, axum::Json(json!({"error": {"kind": kind, "message": message.into()}}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_headers_are_filtered() {
        assert!(is_hop_by_hop(&HeaderName::from_static("connection")));
        assert!(is_hop_by_hop(&HeaderName::from_static("transfer-encoding")));
        assert!(!is_hop_by_hop(&HeaderName::from_static("content-type")));
    }

    #[test]
    fn target_url_strips_leading_slash_and_joins_base() {
        let route = providers::lookup("openai").unwrap();
        let url = build_target_url(route, "/v1/chat/completions", &HeaderMap::new());
        assert_eq!(url, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn unknown_provider_prefix_yields_not_found() {
        assert!(providers::lookup("not-a-real-provider").is_none());
    }

    #[test]
    fn forward_verbatim_annotates_budget_and_threat_headers() {
        let response = forward_verbatim(StatusCode::OK, &reqwest::header::HeaderMap::new(), Bytes::from_static(b"{}"), Some("warn"), "matched");
        assert_eq!(response.headers().get("x-sv-budget-status").unwrap(), "warn");
        assert_eq!(response.headers().get("x-sv-threat").unwrap(), "matched");
    }

    #[test]
    fn forward_verbatim_omits_budget_header_when_allowed() {
        let response = forward_verbatim(StatusCode::OK, &reqwest::header::HeaderMap::new(), Bytes::from_static(b"{}"), None, "none");
        assert!(response.headers().get("x-sv-budget-status").is_none());
        assert_eq!(response.headers().get("x-sv-threat").unwrap(), "none");
    }
}
