use crate::config::types::Severity;
use crate::result::{RunResult, ViolationKind};

/// Render a completed run to stdout/stderr. The only rendering logic this
/// crate carries — a handful of `println!`/`eprintln!` calls, the same thin
/// surface `tokf::main`'s `cmd_*` functions keep (see spec.md §4.7).
pub fn render(run: &RunResult, verbose: bool) {
    for result in &run.results {
        let status = if result.passed { "PASS" } else { "FAIL" };
        println!("{status}  {}", result.check_id);
        if verbose {
            if !result.stdout.is_empty() {
                eprintln!("  stdout: {}", result.stdout);
            }
            if !result.stderr.is_empty() {
                eprintln!("  stderr: {}", result.stderr);
            }
        }
    }

    if run.violations.is_empty() {
        println!("\n{} checks passed", run.results.len());
        return;
    }

    println!("\n{} violation(s):", run.violations.len());
    for v in &run.violations {
        let label = match v.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        let kind = match v.kind {
            ViolationKind::CommandFailed => "command failed",
            ViolationKind::AssertionFailed => "assertion failed",
            ViolationKind::AssertionError => "assertion error",
            ViolationKind::FileReadError => "file read error",
            ViolationKind::GrokError => "invalid grok pattern",
            ViolationKind::TimedOut => "timed out",
            ViolationKind::Cancelled => "cancelled",
            ViolationKind::Skipped => "skipped",
        };
        println!("  [{label}] {} ({kind}): {}", v.check_id, v.message);
        if let Some(suggestion) = &v.suggestion {
            println!("    suggestion: {suggestion}");
        }
        if let Some(fix) = &v.fix {
            println!("    fix: {fix}");
        }
    }
}
