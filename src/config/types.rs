use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One or more grok/regex extraction patterns — either a single string or a
/// list, the same scalar-or-list shape `tokf`'s `CommandPattern` uses for
/// `command`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternList {
    Single(String),
    Multiple(Vec<String>),
}

impl PatternList {
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        match self {
            Self::Single(s) => std::slice::from_ref(s),
            Self::Multiple(v) => v,
        }
    }
}

impl Default for PatternList {
    fn default() -> Self {
        Self::Multiple(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Error
    }
}

/// The as-written YAML shape of a single check, before defaulting,
/// interpolation, or validation. Mirrors `tokf::config::types::FilterConfig`'s
/// raw-struct role: every field optional/defaulted, validity enforced later
/// by the loader rather than by the type itself. `deny_unknown_fields` so a
/// misspelled key is a load-time `ConfigError::Parse`, not a silently
/// ignored no-op — spec.md §6: "Illegal or unknown top-level keys are
/// rejected."
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCheck {
    pub id: String,
    pub run: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub grok: PatternList,
    #[serde(default)]
    pub assert: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub fix: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub timeout: Option<String>,
}

/// The as-written top-level document. `version` is kept as the raw scalar
/// string spec.md §3 names ("currently the literal `\"1\"`"), not an integer —
/// comparing against the literal is the loader's job, not serde's.
/// `deny_unknown_fields` rejects any top-level key outside
/// `version`/`vars`/`checks` (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default = "default_version", deserialize_with = "deserialize_version")]
    pub version: String,
    #[serde(default)]
    pub vars: HashMap<String, String>,
    pub checks: Vec<RawCheck>,
}

fn default_version() -> String {
    "1".to_string()
}

/// Accepts both `version: 1` and `version: "1"` — YAML happily parses an
/// unquoted `1` as an integer scalar, and the spec's own examples are not
/// consistent about quoting it.
fn deserialize_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum VersionScalar {
        Str(String),
        Int(i64),
    }
    Ok(match VersionScalar::deserialize(deserializer)? {
        VersionScalar::Str(s) => s,
        VersionScalar::Int(n) => n.to_string(),
    })
}

/// Default per-check timeout when none is configured: spec.md §3 names
/// "~5 minutes" explicitly.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A validated, immutable check ready to execute. Every field here has
/// already survived `config::loader`'s defaulting, interpolation, and
/// validation passes — the executor and orchestrator never see a `RawCheck`.
#[derive(Debug, Clone)]
pub struct Check {
    pub id: String,
    pub run: String,
    pub file: Option<String>,
    pub grok: Vec<String>,
    pub assert: Option<String>,
    pub severity: Severity,
    pub suggestion: Option<String>,
    pub fix: Option<String>,
    pub requires: Vec<String>,
    pub timeout: Duration,
    /// 1-based line of this check's `id:` key in the source document, for
    /// error/violation attribution. Best-effort (see `DESIGN.md`).
    pub line: usize,
}

/// A fully loaded and validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub version: String,
    pub vars: HashMap<String, String>,
    pub checks: Vec<Check>,
}

impl Config {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.id == id)
    }
}
