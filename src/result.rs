use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::types::Severity;

/// Why a check did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// The command's exit code was non-zero.
    CommandFailed,
    /// The command ran and exited 0 but the assertion evaluated false.
    AssertionFailed,
    /// The assertion expression itself could not be evaluated.
    AssertionError,
    /// The declared `file` could not be read as the analysis subject.
    FileReadError,
    /// A `grok` pattern failed to compile or apply at run time. The loader
    /// already compiles every pattern eagerly (spec.md §4.4), so this is a
    /// defensive duplicate of that check — analogous to `graph`'s cycle
    /// check re-verifying what the loader already rejected.
    GrokError,
    /// The command did not finish within its configured timeout.
    TimedOut,
    /// The run's cancellation scope was cancelled while this check was in flight.
    Cancelled,
    /// A dependency failed or was skipped, so this check never ran.
    Skipped,
}

/// A reportable non-passing outcome for one check. Distinct from
/// `ExecutionError`/`ConfigError` — this is a result, not a failure of the
/// engine itself (spec.md §7's typed-errors-vs-violations split).
#[derive(Debug, Clone)]
pub struct Violation {
    pub check_id: String,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub command: String,
    pub message: String,
    pub suggestion: Option<String>,
    pub fix: Option<String>,
    pub extracted: HashMap<String, String>,
    pub timedout: bool,
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub check_id: String,
    pub passed: bool,
    pub exit_code: i32,
    pub extracted: HashMap<String, String>,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
    pub timedout: bool,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub results: Vec<CheckResult>,
    pub violations: Vec<Violation>,
    pub duration: Duration,
    pub exit_code: i32,
    pub fail_fast_triggered: bool,
}

impl RunResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}
