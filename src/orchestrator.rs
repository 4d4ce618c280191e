use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};

use crate::assert_eval;
use crate::cancel::CancelScope;
use crate::config::error::ConfigError;
use crate::config::types::{Check, Config, Severity};
use crate::executor::{ExecutionError, ExecutionRecord, Executor, StopReason};
use crate::extract::{self, GrokPattern};
use crate::result::{CheckResult, RunResult, Violation, ViolationKind};

/// A fatal failure of the run itself, as opposed to a `Violation` (a
/// non-passing check outcome, which is data, not an error). spec.md §7:
/// "executor spawn errors ... propagate up and abort the run."
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("check \"{0}\" failed to spawn: {1}")]
    Spawn(String, #[source] ExecutionError),
}

/// Default log directory, spec.md §4.6/§6: `.vibeguard/log`.
pub const DEFAULT_LOG_DIR: &str = ".vibeguard/log";

/// Per-run shared state, guarded by a single mutex held only for the short
/// critical sections below — spec.md §9: performance here is dominated by
/// subprocess wall time, not lock contention, so one coarse mutex is the
/// right tool, not four fine-grained ones.
struct RunState {
    passed: HashSet<String>,
    results: Vec<CheckResult>,
    violations: Vec<Violation>,
    fail_fast_triggered: bool,
    /// First spawn failure observed by any worker; once set the whole run
    /// aborts rather than continuing level by level.
    abort: Option<(String, ExecutionError)>,
}

impl RunState {
    fn new() -> Self {
        Self {
            passed: HashSet::new(),
            results: Vec::new(),
            violations: Vec::new(),
            fail_fast_triggered: false,
            abort: None,
        }
    }
}

pub struct Orchestrator {
    config: Config,
    max_parallel: NonZeroUsize,
    fail_fast: bool,
    error_exit_code: i32,
    cwd: Option<PathBuf>,
    log_dir: PathBuf,
}

impl Orchestrator {
    #[must_use]
    pub fn new(config: Config, max_parallel: usize, fail_fast: bool, error_exit_code: i32) -> Self {
        let default_parallelism = NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            max_parallel: NonZeroUsize::new(max_parallel).unwrap_or(default_parallelism),
            fail_fast,
            error_exit_code,
            cwd: None,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = Some(cwd);
        self
    }

    #[must_use]
    pub fn with_log_dir(mut self, log_dir: PathBuf) -> Self {
        self.log_dir = log_dir;
        self
    }

    /// Run every check in dependency order, level by level, with at most
    /// `max_parallel` checks executing concurrently within a level.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Config` if the dependency graph itself is
    /// malformed (the loader already rejects this before a run is ever
    /// built — see `graph::build_levels`'s "defensive duplicate" role), or
    /// `RunError::Spawn` if any check's shell could not be launched at all.
    pub async fn run(&self) -> Result<RunResult, RunError> {
        self.run_with_scope(CancelScope::root()).await
    }

    pub async fn run_with_scope(&self, root: CancelScope) -> Result<RunResult, RunError> {
        let started = Instant::now();
        let levels = crate::graph::build_levels(&self.config.checks).map_err(|e| {
            ConfigError::InvalidCheck {
                file: PathBuf::from("<config>"),
                line: 0,
                check_id: String::new(),
                message: e.to_string(),
            }
        })?;

        let state = Arc::new(Mutex::new(RunState::new()));
        let semaphore = Arc::new(Semaphore::new(self.max_parallel.get()));
        let run_span = info_span!("run", checks = self.config.checks.len());

        for level in &levels {
            if root.is_cancelled() {
                break;
            }
            self.run_level(level, &state, &semaphore, &root)
                .instrument(run_span.clone())
                .await;

            let locked = state.lock().await;
            if locked.fail_fast_triggered || locked.abort.is_some() {
                break;
            }
        }

        let mut locked = state.lock().await;
        if let Some((id, cause)) = locked.abort.take() {
            return Err(RunError::Spawn(id, cause));
        }

        let error_exit_code = self.error_exit_code;
        let exit_code = compute_exit_code(&locked.violations, error_exit_code);

        Ok(RunResult {
            results: std::mem::take(&mut locked.results),
            violations: std::mem::take(&mut locked.violations),
            duration: started.elapsed(),
            exit_code,
            fail_fast_triggered: locked.fail_fast_triggered,
        })
    }

    /// Run a single named check, bypassing the dependency graph entirely —
    /// the `--check` CLI flag's escape hatch.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Config` (`ConfigError::UnknownCheck`) if `id` is
    /// not in the config, or `RunError::Spawn` if the check's shell could
    /// not be launched.
    pub async fn run_check(&self, id: &str) -> Result<RunResult, RunError> {
        let started = Instant::now();
        let check = self.config.get(id).ok_or_else(|| ConfigError::UnknownCheck {
            file: PathBuf::from("<config>"),
            check_id: id.to_string(),
        })?;

        let scope = CancelScope::root();
        let (result, violation) = self
            .execute_one(check, &scope)
            .await
            .map_err(|e| RunError::Spawn(check.id.clone(), e))?;
        let mut violations = Vec::new();
        let passed = result.passed;
        if let Some(v) = violation {
            violations.push(v);
        }
        let exit_code = if passed { 0 } else { self.error_exit_code };
        Ok(RunResult {
            results: vec![result],
            violations,
            duration: started.elapsed(),
            exit_code,
            fail_fast_triggered: false,
        })
    }

    /// Runs one level, then folds its outcomes into the shared run state in
    /// declaration order — spec.md §4.6's "slots indexed by the check's
    /// position in the level" tie-break. Workers race each other to finish,
    /// so each writes its own outcome into a per-level, index-addressed slot
    /// rather than appending straight to the run-wide `results`/`violations`
    /// vectors; only after every worker in the level has joined do we drain
    /// the slots in order and extend the shared state.
    async fn run_level(
        &self,
        level: &[String],
        state: &Arc<Mutex<RunState>>,
        semaphore: &Arc<Semaphore>,
        root: &CancelScope,
    ) {
        let level_scope = root.child();
        let mut joins = JoinSet::new();
        let slots: Arc<Mutex<Vec<Option<(CheckResult, Option<Violation>)>>>> =
            Arc::new(Mutex::new((0..level.len()).map(|_| None).collect()));

        for (index, id) in level.iter().enumerate() {
            let Some(check) = self.config.get(id) else {
                continue;
            };

            let requires_satisfied = {
                let locked = state.lock().await;
                check.requires.iter().all(|r| locked.passed.contains(r))
            };

            if !requires_satisfied {
                let result = CheckResult {
                    check_id: check.id.clone(),
                    passed: false,
                    exit_code: -1,
                    extracted: std::collections::HashMap::new(),
                    duration: std::time::Duration::ZERO,
                    stdout: String::new(),
                    stderr: String::new(),
                    timedout: false,
                };
                let violation = Violation {
                    check_id: check.id.clone(),
                    kind: ViolationKind::Skipped,
                    severity: check.severity,
                    command: check.run.clone(),
                    message: "a required check did not pass".to_string(),
                    suggestion: Some("Skipped: required dependency failed".to_string()),
                    fix: check.fix.clone(),
                    extracted: std::collections::HashMap::new(),
                    timedout: false,
                    log_path: None,
                };
                slots.lock().await[index] = Some((result, Some(violation)));
                continue;
            }

            let permit = Arc::clone(semaphore);
            let scope = level_scope.child();
            let check = check.clone();
            let state = Arc::clone(state);
            let slots = Arc::clone(&slots);
            let fail_fast = self.fail_fast;
            let level_scope_for_cancel = level_scope.clone();
            let root_for_abort = root.clone();
            let cwd = self.cwd.clone();
            let log_dir = self.log_dir.clone();

            joins.spawn(async move {
                let _permit = match permit.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return,
                };
                if scope.is_cancelled() {
                    return;
                }
                let span = info_span!("check", id = %check.id);
                let record = Executor::run(&check, &scope, cwd.as_deref())
                    .instrument(span)
                    .await;

                let record = match record {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(check_id = %check.id, error = %e, "check failed to spawn, aborting run");
                        let mut locked = state.lock().await;
                        if locked.abort.is_none() {
                            locked.abort = Some((check.id.clone(), e));
                        }
                        drop(locked);
                        root_for_abort.cancel();
                        return;
                    }
                };

                let log_path = write_log(&log_dir, &check.id, &record.combined);
                let (result, violation) = classify(&check, record, log_path);

                let passed = result.passed;
                let is_error = violation.as_ref().is_some_and(|v| v.severity == Severity::Error);
                slots.lock().await[index] = Some((result, violation));

                if passed {
                    state.lock().await.passed.insert(check.id.clone());
                } else if fail_fast && is_error {
                    let mut locked = state.lock().await;
                    locked.fail_fast_triggered = true;
                    drop(locked);
                    level_scope_for_cancel.cancel();
                }
            });
        }

        while joins.join_next().await.is_some() {}

        let level_slots = std::mem::take(&mut *slots.lock().await);
        let mut locked = state.lock().await;
        for slot in level_slots {
            let Some((result, violation)) = slot else { continue };
            locked.results.push(result);
            if let Some(v) = violation {
                locked.violations.push(v);
            }
        }
    }

    async fn execute_one(
        &self,
        check: &Check,
        scope: &CancelScope,
    ) -> Result<(CheckResult, Option<Violation>), ExecutionError> {
        let record = Executor::run(check, scope, self.cwd.as_deref()).await?;
        let log_path = write_log(&self.log_dir, &check.id, &record.combined);
        Ok(classify(check, record, log_path))
    }
}

/// Write a check's combined output to `<log_dir>/<id>.log`, overwriting any
/// prior run's log — spec.md §5: "writes are last-writer-wins across runs."
/// Best-effort: directory creation and write failures are logged, not
/// propagated, per spec.md §4.6 ("failure does not affect the run").
fn write_log(log_dir: &std::path::Path, check_id: &str, combined: &str) -> Option<PathBuf> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        warn!(check_id, error = %e, "failed to create log directory");
        return None;
    }
    let path = log_dir.join(format!("{check_id}.log"));
    match std::fs::write(&path, combined) {
        Ok(()) => Some(path),
        Err(e) => {
            warn!(check_id, error = %e, "failed to write check log");
            None
        }
    }
}

/// Resolve the text the extractor/assertion stage see: the declared `file`'s
/// contents when set, else the command's combined output — spec.md §3
/// ("analysis subject") / §4.6.
fn analysis_subject(check: &Check, record: &ExecutionRecord) -> Result<String, std::io::Error> {
    match &check.file {
        Some(path) => std::fs::read_to_string(path),
        None => Ok(record.combined.clone()),
    }
}

fn classify(check: &Check, record: ExecutionRecord, log_path: Option<PathBuf>) -> (CheckResult, Option<Violation>) {
    if record.reason == StopReason::Cancelled {
        info!(check_id = %check.id, "check cancelled mid-flight");
        let result = CheckResult {
            check_id: check.id.clone(),
            passed: false,
            exit_code: record.exit_code,
            extracted: std::collections::HashMap::new(),
            duration: record.duration,
            stdout: record.stdout,
            stderr: record.stderr,
            timedout: false,
        };
        let violation = Violation {
            check_id: check.id.clone(),
            kind: ViolationKind::Cancelled,
            severity: Severity::Error,
            command: check.run.clone(),
            message: "cancelled before completion".to_string(),
            suggestion: check.suggestion.clone(),
            fix: check.fix.clone(),
            extracted: std::collections::HashMap::new(),
            timedout: false,
            log_path,
        };
        return (result, Some(violation));
    }

    if record.reason == StopReason::TimedOut {
        info!(check_id = %check.id, "check timed out");
        let result = CheckResult {
            check_id: check.id.clone(),
            passed: false,
            exit_code: record.exit_code,
            extracted: std::collections::HashMap::new(),
            duration: record.duration,
            stdout: record.stdout,
            stderr: record.stderr,
            timedout: true,
        };
        // A timeout is always reported at error severity regardless of the
        // check's configured severity — DESIGN.md Open Question 2. The
        // suggestion is a fixed message, optionally followed by the check's
        // own configured guidance — spec.md §3: "possibly rewritten if the
        // cause was a timeout."
        let fixed = format!(
            "Timed out after {:?}: check did not complete within its configured timeout.",
            check.timeout
        );
        let suggestion = Some(match &check.suggestion {
            Some(custom) => format!("{fixed} {custom}"),
            None => fixed,
        });
        let violation = Violation {
            check_id: check.id.clone(),
            kind: ViolationKind::TimedOut,
            severity: Severity::Error,
            command: check.run.clone(),
            message: format!("timed out after {:?}", check.timeout),
            suggestion,
            fix: check.fix.clone(),
            extracted: std::collections::HashMap::new(),
            timedout: true,
            log_path,
        };
        return (result, Some(violation));
    }

    let subject = match analysis_subject(check, &record) {
        Ok(s) => s,
        Err(e) => {
            warn!(check_id = %check.id, error = %e, "failed to read analysis subject file");
            let result = CheckResult {
                check_id: check.id.clone(),
                passed: false,
                exit_code: record.exit_code,
                extracted: std::collections::HashMap::new(),
                duration: record.duration,
                stdout: record.stdout,
                stderr: record.stderr,
                timedout: false,
            };
            let violation = Violation {
                check_id: check.id.clone(),
                kind: ViolationKind::FileReadError,
                severity: check.severity,
                command: check.run.clone(),
                message: format!(
                    "could not read {}: {e}",
                    check.file.as_deref().unwrap_or("<file>")
                ),
                suggestion: check.suggestion.clone(),
                fix: check.fix.clone(),
                extracted: std::collections::HashMap::new(),
                timedout: false,
                log_path,
            };
            return (result, Some(violation));
        }
    };

    // The loader already compiled every pattern eagerly at load time
    // (spec.md §4.4), so this should never fail in practice — recompiling
    // here (rather than threading compiled `Regex`es through `Check`) keeps
    // `Check` plain data. A failure is still surfaced as a real violation
    // rather than swallowed, the same defensive-duplicate posture
    // `graph::build_levels` takes toward the loader's own cycle check.
    let mut patterns = Vec::with_capacity(check.grok.len());
    for pattern in &check.grok {
        match GrokPattern::compile(pattern) {
            Ok(compiled) => patterns.push(compiled),
            Err(e) => {
                warn!(check_id = %check.id, pattern = %pattern, error = %e, "grok pattern failed to compile");
                let result = CheckResult {
                    check_id: check.id.clone(),
                    passed: false,
                    exit_code: record.exit_code,
                    extracted: std::collections::HashMap::new(),
                    duration: record.duration,
                    stdout: record.stdout,
                    stderr: record.stderr,
                    timedout: false,
                };
                let violation = Violation {
                    check_id: check.id.clone(),
                    kind: ViolationKind::GrokError,
                    severity: check.severity,
                    command: check.run.clone(),
                    message: format!("invalid grok pattern \"{pattern}\": {e}"),
                    suggestion: check.suggestion.clone(),
                    fix: check.fix.clone(),
                    extracted: std::collections::HashMap::new(),
                    timedout: false,
                    log_path,
                };
                return (result, Some(violation));
            }
        }
    }
    let extracted = extract::apply(&patterns, &subject);

    if record.exit_code != 0 {
        let suggestion = render_template(check.suggestion.as_deref(), &extracted);
        let fix = render_template(check.fix.as_deref(), &extracted);
        let result = CheckResult {
            check_id: check.id.clone(),
            passed: false,
            exit_code: record.exit_code,
            extracted: extracted.clone(),
            duration: record.duration,
            stdout: record.stdout,
            stderr: record.stderr,
            timedout: false,
        };
        let violation = Violation {
            check_id: check.id.clone(),
            kind: ViolationKind::CommandFailed,
            severity: check.severity,
            command: check.run.clone(),
            message: format!("command exited {}", record.exit_code),
            suggestion,
            fix,
            extracted,
            timedout: false,
            log_path,
        };
        return (result, Some(violation));
    }

    let Some(expr) = &check.assert else {
        let result = CheckResult {
            check_id: check.id.clone(),
            passed: true,
            exit_code: record.exit_code,
            extracted,
            duration: record.duration,
            stdout: record.stdout,
            stderr: record.stderr,
            timedout: false,
        };
        return (result, None);
    };

    match assert_eval::eval(expr, &extracted) {
        Ok(true) => {
            let result = CheckResult {
                check_id: check.id.clone(),
                passed: true,
                exit_code: record.exit_code,
                extracted,
                duration: record.duration,
                stdout: record.stdout,
                stderr: record.stderr,
                timedout: false,
            };
            (result, None)
        }
        Ok(false) => {
            let result = CheckResult {
                check_id: check.id.clone(),
                passed: false,
                exit_code: record.exit_code,
                extracted: extracted.clone(),
                duration: record.duration,
                stdout: record.stdout,
                stderr: record.stderr,
                timedout: false,
            };
            let violation = Violation {
                check_id: check.id.clone(),
                kind: ViolationKind::AssertionFailed,
                severity: check.severity,
                command: check.run.clone(),
                message: format!("assertion failed: {expr}"),
                suggestion: render_template(check.suggestion.as_deref(), &extracted),
                fix: render_template(check.fix.as_deref(), &extracted),
                extracted,
                timedout: false,
                log_path,
            };
            (result, Some(violation))
        }
        Err(e) => {
            let result = CheckResult {
                check_id: check.id.clone(),
                passed: false,
                exit_code: record.exit_code,
                extracted: extracted.clone(),
                duration: record.duration,
                stdout: record.stdout,
                stderr: record.stderr,
                timedout: false,
            };
            let violation = Violation {
                check_id: check.id.clone(),
                kind: ViolationKind::AssertionError,
                severity: check.severity,
                command: check.run.clone(),
                message: format!("could not evaluate assertion \"{expr}\": {e}"),
                suggestion: check.suggestion.clone(),
                fix: check.fix.clone(),
                extracted,
                timedout: false,
                log_path,
            };
            (result, Some(violation))
        }
    }
}

/// Interpolate `{{.name}}` placeholders in `suggestion`/`fix` text from the
/// check's own extracted map, at report time — DESIGN.md Open Question 3.
/// A placeholder with no matching key is left verbatim.
fn render_template(template: Option<&str>, vars: &std::collections::HashMap<String, String>) -> Option<String> {
    let template = template?;
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{.{key}}}}}"), value);
    }
    Some(out)
}

/// Any timeout violation, or any error-severity violation → the configured
/// error exit code; otherwise 0 (warnings-only or a clean run) —
/// DESIGN.md Open Question 2.
fn compute_exit_code(violations: &[Violation], error_exit_code: i32) -> i32 {
    let has_timeout = violations.iter().any(|v| v.timedout);
    let has_error = violations.iter().any(|v| v.severity == Severity::Error);
    if has_timeout || has_error {
        error_exit_code
    } else {
        0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn minimal_config(yaml: &str) -> Config {
        crate::config::from_str(yaml, std::path::Path::new("f")).unwrap()
    }

    fn orch(cfg: Config, max_parallel: usize, fail_fast: bool, error_exit_code: i32) -> Orchestrator {
        let dir = std::env::temp_dir().join(format!("vibeguard-test-{:?}", std::thread::current().id()));
        Orchestrator::new(cfg, max_parallel, fail_fast, error_exit_code).with_log_dir(dir)
    }

    #[tokio::test]
    async fn passing_check_yields_zero_exit_code() {
        let cfg = minimal_config("version: 1\nchecks:\n  - id: a\n    run: exit 0\n");
        let result = orch(cfg, 4, false, 1).run().await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(result.violations.is_empty());
    }

    #[tokio::test]
    async fn error_severity_failure_sets_configured_exit_code() {
        let cfg = minimal_config("version: 1\nchecks:\n  - id: a\n    run: exit 1\n");
        let result = orch(cfg, 4, false, 1).run().await.unwrap();
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.violations.len(), 1);
    }

    #[tokio::test]
    async fn warning_only_failure_exits_zero() {
        let cfg = minimal_config(
            "version: 1\nchecks:\n  - id: a\n    run: exit 1\n    severity: warning\n",
        );
        let result = orch(cfg, 4, false, 1).run().await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.violations.len(), 1);
    }

    #[tokio::test]
    async fn dependent_check_is_skipped_when_parent_fails() {
        let cfg = minimal_config(
            "version: 1\nchecks:\n  - id: a\n    run: exit 1\n  - id: b\n    run: exit 0\n    requires: [a]\n",
        );
        let result = orch(cfg, 4, false, 1).run().await.unwrap();
        let b = result.results.iter().find(|r| r.check_id == "b").unwrap();
        assert!(!b.passed);
        assert_eq!(b.exit_code, -1);
        let v = result.violations.iter().find(|v| v.check_id == "b").unwrap();
        assert_eq!(v.kind, ViolationKind::Skipped);
        assert_eq!(v.suggestion.as_deref(), Some("Skipped: required dependency failed"));
    }

    #[test]
    fn invalid_grok_pattern_is_rejected_before_any_check_runs() {
        // The command here would prove a run happened (it writes a marker
        // file); config::from_str must fail before Orchestrator::new is ever
        // reachable, so the marker is never created.
        let marker = std::env::temp_dir().join("vibeguard-grok-reject-marker");
        let _ = std::fs::remove_file(&marker);
        let yaml = format!(
            "version: 1\nchecks:\n  - id: a\n    run: \"touch {}\"\n    grok: \"(unclosed\"\n",
            marker.display()
        );
        let err = crate::config::from_str(&yaml, std::path::Path::new("f")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn timeout_is_always_error_severity() {
        let cfg = minimal_config(
            "version: 1\nchecks:\n  - id: a\n    run: sleep 5\n    timeout: 100ms\n    severity: warning\n",
        );
        let result = orch(cfg, 4, false, 1).run().await.unwrap();
        assert_eq!(result.exit_code, 1);
        let v = result.violations.iter().find(|v| v.check_id == "a").unwrap();
        assert!(v.timedout);
        assert_eq!(v.severity, Severity::Error);
        assert!(v.suggestion.as_deref().is_some_and(|s| s.contains("Timed out")));
    }

    #[tokio::test]
    async fn grok_and_assert_pass_together() {
        let cfg = minimal_config(
            "version: 1\nchecks:\n  - id: a\n    run: echo 'coverage 87.5%'\n    grok: \"coverage %{NUMBER:pct}%%\"\n    assert: pct > 80\n",
        );
        let result = orch(cfg, 4, false, 1).run().await.unwrap();
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn run_check_bypasses_the_graph() {
        let cfg = minimal_config(
            "version: 1\nchecks:\n  - id: a\n    run: exit 0\n  - id: b\n    run: exit 1\n    requires: [a]\n",
        );
        let result = orch(cfg, 4, false, 1).run_check("b").await.unwrap();
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test]
    async fn unknown_check_id_is_a_config_error() {
        let cfg = minimal_config("version: 1\nchecks:\n  - id: a\n    run: exit 0\n");
        assert!(matches!(
            orch(cfg, 4, false, 1).run_check("nope").await,
            Err(RunError::Config(ConfigError::UnknownCheck { .. }))
        ));
    }

    #[tokio::test]
    async fn fail_fast_stops_later_levels() {
        let cfg = minimal_config(
            "version: 1\nchecks:\n  - id: a\n    run: exit 1\n  - id: b\n    run: exit 0\n    requires: [a]\n  - id: c\n    run: exit 0\n",
        );
        let result = orch(cfg, 4, true, 1).run().await.unwrap();
        assert!(result.fail_fast_triggered);
        assert!(!result.results.iter().any(|r| r.check_id == "c" && r.passed));
    }

    #[tokio::test]
    async fn results_within_a_level_keep_declaration_order_regardless_of_completion_speed() {
        // "slow" sleeps longer than "fast", so if completion order leaked
        // into result order, "fast" would land first. Declaration order
        // must win instead — spec.md §4.6's "Results ... within a level
        // appear in declaration order."
        let cfg = minimal_config(
            "version: 1\nchecks:\n  - id: slow\n    run: sleep 0.2\n  - id: fast\n    run: \"true\"\n",
        );
        let result = orch(cfg, 4, false, 1).run().await.unwrap();
        let ids: Vec<&str> = result.results.iter().map(|r| r.check_id.as_str()).collect();
        assert_eq!(ids, vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn file_based_check_reads_declared_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "coverage: 91%\n").unwrap();
        let yaml = format!(
            "version: 1\nchecks:\n  - id: a\n    run: \"true\"\n    file: \"{}\"\n    grok: \"coverage: %{{NUMBER:pct}}%\"\n    assert: pct >= 90\n",
            tmp.path().display()
        );
        let cfg = minimal_config(&yaml);
        let result = orch(cfg, 4, false, 1).run().await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.results[0].extracted.get("pct").map(String::as_str), Some("91"));
    }

    #[tokio::test]
    async fn missing_declared_file_is_a_violation() {
        let cfg = minimal_config(
            "version: 1\nchecks:\n  - id: a\n    run: \"true\"\n    file: /nonexistent/path/xyz\n",
        );
        let result = orch(cfg, 4, false, 1).run().await.unwrap();
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.violations[0].kind, ViolationKind::FileReadError);
    }

    #[tokio::test]
    async fn check_writes_a_log_file() {
        let cfg = minimal_config("version: 1\nchecks:\n  - id: a\n    run: echo hi\n");
        let dir = std::env::temp_dir().join("vibeguard-log-test");
        let o = Orchestrator::new(cfg, 4, false, 1).with_log_dir(dir.clone());
        o.run().await.unwrap();
        let content = std::fs::read_to_string(dir.join("a.log")).unwrap();
        assert!(content.contains("hi"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
