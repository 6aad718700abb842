// ── Error Types ────────────────────────────────────────────────────────────
// Single canonical error enum for the sidecar, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (store, migration, upstream…).
//   • `#[from]` wires std/external error conversions automatically.
//   • No variant carries secret material (API keys, passwords) in its message.
//   • Budget denials and cost-recording failures are NOT variants here —
//     they're ordinary return values or swallowed+logged, never exceptions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SidecarError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite / rusqlite database failure.
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Schema migration failure at startup. Always fatal.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A caller-supplied value failed validation (bad regex, empty input,
    /// out-of-range score, bad pagination params).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upstream LLM provider returned a non-2xx/3xx, or the connection
    /// failed. `status` is 0 for connect/timeout errors that never reached
    /// the wire.
    #[error("Upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// Analyzer runtime error isolated to a single rule/pattern.
    #[error("Analyzer error: {0}")]
    Analyzer(String),

    /// Engine or proxy configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// OS keychain / credential store failure.
    #[error("Keyring error: {0}")]
    Keyring(String),

    /// HTTP / network failure (reqwest layer) not already classified as Upstream.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Catch-all for errors that do not yet have a dedicated variant.
    /// Prefer adding a specific variant over using this in new code.
    #[error("{0}")]
    Other(String),
}

impl SidecarError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream { status, body: body.into() }
    }
}

impl From<String> for SidecarError {
    fn from(s: String) -> Self {
        SidecarError::Other(s)
    }
}

impl From<&str> for SidecarError {
    fn from(s: &str) -> Self {
        SidecarError::Other(s.to_string())
    }
}

/// All sidecar operations should return this type.
pub type SidecarResult<T> = Result<T, SidecarError>;

impl From<SidecarError> for String {
    fn from(e: SidecarError) -> Self {
        e.to_string()
    }
}
