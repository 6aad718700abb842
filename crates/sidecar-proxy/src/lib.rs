// ── sidecar-proxy ────────────────────────────────────────────────────────────
// The multi-provider LLM reverse proxy: provider registry, fast-fail circuit
// breakers, and the per-request pipeline (budget pre-check, forward, stream
// or buffer-and-scan, post-call bookkeeping).

pub mod circuit;
pub mod content;
pub mod pipeline;
pub mod providers;

use axum::routing::any;
use axum::Router;

pub use pipeline::ProxyState;

/// Builds the router a caller (typically `sidecar-server`) mounts under
/// whatever prefix it chooses — usually the server root, since provider
/// prefixes (`/openai/...`) are already namespaced enough on their own.
pub fn router(state: ProxyState) -> Router {
    Router::new().route("/:provider/*rest", any(pipeline::handle)).with_state(state)
}
