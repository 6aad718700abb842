// ── Rule loader ──────────────────────────────────────────────────────────────
// Ingests community rule files into the community-rules cache table on first
// run. Rule files are YAML (or JSON, a YAML subset) documents in one of two
// shapes — a `rules` sequence or a legacy flat `patterns` sequence. Parse
// errors in one file never abort another; an entry with no usable `id` is
// skipped.

use chrono::Utc;
use log::warn;
use sidecar_core::models::{CommunityRuleCacheEntry, Severity};
use sidecar_core::repo::CommunityRulesRepository;
use sidecar_core::{SidecarResult, Store};
use std::collections::HashMap;
use std::path::Path;

/// Rule files bundled with the binary. Declaring these as `include_str!`
/// keeps first-run ingestion self-contained — no install step has to copy a
/// rules directory onto disk before the analyzer can compile anything.
const BUNDLED_RULE_FILES: &[(&str, &str)] = &[
    ("prompt_injection.yaml", include_str!("../assets/rules/prompt_injection.yaml")),
    ("data_exfiltration.yaml", include_str!("../assets/rules/data_exfiltration.yaml")),
    ("jailbreak.yaml", include_str!("../assets/rules/jailbreak.yaml")),
    ("legacy_patterns.yaml", include_str!("../assets/rules/legacy_patterns.yaml")),
];

/// Loads the bundled community rule set into the cache, skipping if it's
/// already populated. Idempotent — safe to call on every startup.
pub fn load_bundled_if_empty(store: &Store) -> SidecarResult<usize> {
    let repo = CommunityRulesRepository::new(store);
    if repo.count()? > 0 {
        return Ok(0);
    }
    let mut total = 0;
    for (file_name, content) in BUNDLED_RULE_FILES {
        match parse_document(file_name, content) {
            Ok(entries) => {
                for entry in &entries {
                    repo.upsert(entry)?;
                }
                total += entries.len();
            }
            Err(e) => {
                warn!("[rule-loader] failed to parse bundled rule file {file_name}: {e}");
            }
        }
    }
    Ok(total)
}

/// Walks `dir` for files with a recognized extension (`.yaml`, `.yml`,
/// `.json`) and upserts every rule they define into the cache. Used for
/// user-supplied community rule directories outside the bundled set; a
/// parse failure in one file is logged and the rest still load.
pub fn load_dir_into(store: &Store, dir: &Path) -> SidecarResult<usize> {
    let repo = CommunityRulesRepository::new(store);
    let mut total = 0;
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        warn!("[rule-loader] rules directory not found: {}", dir.display());
        return Ok(0);
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !matches!(ext, "yaml" | "yml" | "json") {
            continue;
        }
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown").to_string();
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!("[rule-loader] could not read {file_name}: {e}");
                continue;
            }
        };
        match parse_document(&file_name, &content) {
            Ok(entries) => {
                for rule_entry in &entries {
                    repo.upsert(rule_entry)?;
                }
                total += entries.len();
            }
            Err(e) => warn!("[rule-loader] failed to parse {file_name}: {e}"),
        }
    }
    Ok(total)
}

/// Parses one rule document (YAML parses JSON too, it's a strict subset).
/// Recognizes two document shapes; unknown top-level keys are ignored.
fn parse_document(file_name: &str, content: &str) -> Result<Vec<CommunityRuleCacheEntry>, String> {
    let doc: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| format!("invalid document: {e}"))?;

    let stem = file_name.rsplit_once('.').map(|(s, _)| s).unwrap_or(file_name);

    if let Some(rules) = doc.get("rules").and_then(|v| v.as_sequence()) {
        let mut out = Vec::new();
        for (idx, entry) in rules.iter().enumerate() {
            match parse_rule_entry(entry, file_name) {
                Some(rule) => out.push(rule),
                None => warn!("[rule-loader] {file_name}: entry #{idx} has no usable id, skipped"),
            }
        }
        return Ok(out);
    }

    // Legacy shape: a flat `patterns` sequence, one rule per pattern.
    if let Some(patterns) = doc.get("patterns").and_then(|v| v.as_sequence()) {
        let mut out = Vec::new();
        for (idx, p) in patterns.iter().enumerate() {
            let Some(pattern) = p.as_str() else { continue };
            out.push(CommunityRuleCacheEntry {
                rule_id: format!("{stem}-{idx}"),
                name: format!("{stem} pattern {idx}"),
                category: "legacy".to_string(),
                description: format!("Legacy pattern imported from {file_name}"),
                severity: Severity::Medium,
                patterns: vec![pattern.to_string()],
                enabled: true,
                source_file: Some(file_name.to_string()),
                metadata: HashMap::new(),
                loaded_at: Utc::now(),
            });
        }
        return Ok(out);
    }

    Ok(Vec::new())
}

fn parse_rule_entry(entry: &serde_yaml::Value, file_name: &str) -> Option<CommunityRuleCacheEntry> {
    let id = entry.get("id").and_then(|v| v.as_str())?.to_string();
    let name = string_field(entry, "name").unwrap_or_else(|| id.clone());
    let category = string_field(entry, "category").unwrap_or_else(|| "uncategorized".to_string());
    let description = string_field(entry, "description").unwrap_or_default();
    let severity = entry
        .get("severity")
        .and_then(|v| v.as_str())
        .and_then(Severity::parse)
        .unwrap_or(Severity::Medium);
    let patterns = extract_patterns(entry);
    if patterns.is_empty() {
        return None;
    }
    let enabled = entry.get("enabled").and_then(|v| v.as_bool()).unwrap_or(true);

    Some(CommunityRuleCacheEntry {
        rule_id: id,
        name,
        category,
        description,
        severity,
        patterns,
        enabled,
        source_file: Some(file_name.to_string()),
        metadata: HashMap::new(),
        loaded_at: Utc::now(),
    })
}

fn string_field(entry: &serde_yaml::Value, key: &str) -> Option<String> {
    entry.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Patterns may appear as `patterns` (scalar or list), `pattern.value`
/// (scalar or list), or `rule.detection[].match` (scalar or list per
/// detection entry). All hits across the shapes are collected.
fn extract_patterns(entry: &serde_yaml::Value) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(v) = entry.get("patterns") {
        out.extend(scalar_or_list(v));
    }
    if let Some(v) = entry.get("pattern").and_then(|p| p.get("value")) {
        out.extend(scalar_or_list(v));
    }
    if let Some(detections) = entry.get("rule").and_then(|r| r.get("detection")).and_then(|d| d.as_sequence()) {
        for detection in detections {
            if let Some(m) = detection.get("match") {
                out.extend(scalar_or_list(m));
            }
        }
    }
    out
}

fn scalar_or_list(v: &serde_yaml::Value) -> Vec<String> {
    if let Some(s) = v.as_str() {
        return vec![s.to_string()];
    }
    if let Some(seq) = v.as_sequence() {
        return seq.iter().filter_map(|item| item.as_str().map(|s| s.to_string())).collect();
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_structured_rules_document() {
        let doc = r#"
rules:
  - id: pi-001
    name: Ignore previous instructions
    category: prompt_injection
    description: classic override attempt
    severity: high
    patterns:
      - "ignore (all )?previous instructions"
      - "disregard (the )?system prompt"
"#;
        let entries = parse_document("test.yaml", doc).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rule_id, "pi-001");
        assert_eq!(entries[0].patterns.len(), 2);
        assert_eq!(entries[0].severity, Severity::High);
    }

    #[test]
    fn parses_pattern_value_and_detection_shapes() {
        let doc = r#"
rules:
  - id: pv-001
    name: scalar pattern.value
    category: x
    severity: low
    pattern:
      value: "foo bar"
  - id: dt-001
    name: detection list
    category: x
    severity: low
    rule:
      detection:
        - match: "baz"
        - match: ["qux", "quux"]
"#;
        let entries = parse_document("test.yaml", doc).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].patterns, vec!["foo bar".to_string()]);
        assert_eq!(entries[1].patterns, vec!["baz".to_string(), "qux".to_string(), "quux".to_string()]);
    }

    #[test]
    fn entries_without_id_are_skipped_not_fatal() {
        let doc = r#"
rules:
  - name: no id here
    category: x
    severity: low
    patterns: ["a"]
  - id: has-id
    name: fine
    category: x
    severity: low
    patterns: ["b"]
"#;
        let entries = parse_document("test.yaml", doc).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rule_id, "has-id");
    }

    #[test]
    fn legacy_flat_patterns_shape_derives_synthetic_ids() {
        let doc = r#"
patterns:
  - "alpha"
  - "beta"
"#;
        let entries = parse_document("old_rules.yaml", doc).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rule_id, "old_rules-0");
        assert_eq!(entries[1].rule_id, "old_rules-1");
    }

    #[test]
    fn malformed_document_is_an_error_not_a_panic() {
        let result = parse_document("broken.yaml", "{ not: [valid");
        assert!(result.is_err());
    }

    #[test]
    fn load_bundled_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let first = load_bundled_if_empty(&store).unwrap();
        assert!(first > 0);
        let second = load_bundled_if_empty(&store).unwrap();
        assert_eq!(second, 0);
    }

    #[test]
    fn load_dir_skips_bad_file_but_loads_others() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("good.yaml"),
            "rules:\n  - id: g1\n    name: good\n    category: x\n    severity: low\n    patterns: [\"ok\"]\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("bad.yaml"), "{ broken [ yaml").unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "not a rule file").unwrap();

        let store = Store::open_in_memory().unwrap();
        let loaded = load_dir_into(&store, dir.path()).unwrap();
        assert_eq!(loaded, 1);
    }
}
