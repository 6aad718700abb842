// ── sidecar-core ─────────────────────────────────────────────────────────────
// Shared foundation for every other crate in the workspace: the data model,
// the error type, OS paths, the persistent store + migrations, and the
// typed repositories built on top of it. Nothing here knows about HTTP,
// providers, or the analyzer — those live in sidecar-analyzer, sidecar-tools,
// sidecar-cost, and sidecar-proxy, all of which depend on this crate.

pub mod error;
pub mod models;
pub mod paths;
pub mod redact;
pub mod repo;
pub mod store;

pub use error::{SidecarError, SidecarResult};
pub use store::Store;
