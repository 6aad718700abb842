// ── sidecar-tools ────────────────────────────────────────────────────────────
// Tool-call parser (provider-dialect extraction) + permission engine
// (essential-tool registry, user overrides, custom tools).

pub mod parser;
pub mod permission;
pub mod registry;

pub use parser::{extract_tool_calls, ProviderFormat, ToolInvocation};
pub use permission::{evaluate, PermissionDecision};
