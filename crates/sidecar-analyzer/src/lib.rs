// ── sidecar-analyzer ─────────────────────────────────────────────────────────
// Rule loader + threat analyzer: ingests community rule files, compiles the
// enabled-rules view into a flat pattern vector, and scores text against it.

pub mod analyzer;
pub mod generator;
pub mod loader;

pub use analyzer::{AnalysisResult, ThreatAnalyzer};
pub use generator::{generate_from_description, GeneratedRule};
