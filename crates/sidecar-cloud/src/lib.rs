// ── sidecar-cloud ────────────────────────────────────────────────────────────
// OS-keychain credential vault + the local-side client for the out-of-scope
// cloud analyzer. Callers are responsible for the fallback-to-local policy
// described in the analyzer's design notes — this crate only reports what
// the cloud side said.

pub mod client;
pub mod vault;

pub use client::{CloudAnalyzeResponse, CloudClient, CloudCredentialValidation};
pub use vault::{CredentialKey, Vault};
