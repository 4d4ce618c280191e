use std::path::PathBuf;

/// A fatal, pre-execution configuration problem (spec §7). Always maps to
/// exit code 2 — nothing ran, so there is nothing to report as a violation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{file}: {message}")]
    Parse {
        file: PathBuf,
        message: String,
        #[source]
        cause: serde_yaml::Error,
    },

    #[error("{file}: no vibeguard config found (looked for vibeguard.yaml, vibeguard.yml, .vibeguard.yaml, .vibeguard.yml)")]
    NotFound { file: PathBuf },

    #[error("{file}: unsupported config version \"{version}\" (expected \"1\")")]
    UnsupportedVersion { file: PathBuf, version: String },

    #[error("{file}: checks list is empty")]
    NoChecks { file: PathBuf },

    #[error("{file}:{line}: check id \"{check_id}\" is invalid: {message}")]
    InvalidCheck {
        file: PathBuf,
        line: usize,
        check_id: String,
        message: String,
    },

    #[error("{file}:{line}: duplicate check id \"{check_id}\"")]
    DuplicateId {
        file: PathBuf,
        line: usize,
        check_id: String,
    },

    #[error("{file}:{line}: check \"{check_id}\" requires unknown check \"{requires}\"")]
    UnknownDependency {
        file: PathBuf,
        line: usize,
        check_id: String,
        requires: String,
    },

    #[error("{file}:{line}: check \"{check_id}\" requires itself")]
    SelfDependency {
        file: PathBuf,
        line: usize,
        check_id: String,
    },

    #[error("{file}:{line}: cyclic dependency: {path}")]
    Cycle {
        file: PathBuf,
        line: usize,
        path: String,
    },

    #[error("{file}:{line}: check \"{check_id}\" interpolates unknown variable \"{var_name}\"")]
    UnknownVariable {
        file: PathBuf,
        line: usize,
        check_id: String,
        var_name: String,
    },

    /// A `grok` pattern failed to compile — caught eagerly at load time so
    /// syntax errors surface before any command runs, per spec.md §4.4.
    #[error("{file}:{line}: check \"{check_id}\" has an invalid grok pattern \"{pattern}\": {cause}")]
    InvalidPattern {
        file: PathBuf,
        line: usize,
        check_id: String,
        pattern: String,
        #[source]
        cause: regex::Error,
    },

    #[error("{file}: unknown check \"{check_id}\" (passed via --check)")]
    UnknownCheck { file: PathBuf, check_id: String },
}

impl ConfigError {
    #[must_use]
    pub const fn exit_code() -> i32 {
        2
    }
}
