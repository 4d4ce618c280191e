pub mod error;
pub mod types;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;

use error::ConfigError;
use types::{Check, Config, RawCheck, RawConfig, Severity};

/// Config file names tried in order in the current directory, first match
/// wins — the flat collapse of `tokf::config::default_search_dirs`' layered
/// priority list down to a single document (VibeGuard has one config, not a
/// library of filters to merge).
pub const SEARCH_NAMES: &[&str] = &[
    "vibeguard.yaml",
    "vibeguard.yml",
    ".vibeguard.yaml",
    ".vibeguard.yml",
];

/// Find the config file in `dir` using `SEARCH_NAMES`'s priority order.
#[must_use]
pub fn discover(dir: &Path) -> Option<PathBuf> {
    SEARCH_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Load and fully validate the config at `path`.
///
/// # Errors
///
/// Returns `ConfigError` for any parse or validation failure (exit code 2
/// territory — nothing has executed yet).
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let source = std::fs::read_to_string(path).map_err(|_| ConfigError::NotFound {
        file: path.to_path_buf(),
    })?;
    from_str(&source, path)
}

/// Parse and validate a config document already read into memory. Exposed
/// separately from `load` so tests don't need a filesystem fixture for every
/// case, matching `tokf::config::try_load_filter`'s split between I/O and
/// parsing.
///
/// # Errors
///
/// Returns `ConfigError` for any parse or validation failure.
pub fn from_str(source: &str, file: &Path) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(source).map_err(|cause| ConfigError::Parse {
        file: file.to_path_buf(),
        message: cause.to_string(),
        cause,
    })?;

    if raw.version != "1" {
        return Err(ConfigError::UnsupportedVersion {
            file: file.to_path_buf(),
            version: raw.version,
        });
    }
    if raw.checks.is_empty() {
        return Err(ConfigError::NoChecks {
            file: file.to_path_buf(),
        });
    }

    let checks = build_checks(source, file, &raw)?;
    validate_dependencies(file, &checks)?;
    detect_cycles(file, &checks)?;

    Ok(Config {
        version: raw.version,
        vars: raw.vars,
        checks,
    })
}

fn id_regex() -> Regex {
    #[allow(clippy::unwrap_used)] // compile-time-constant pattern, infallible
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").unwrap()
}

fn build_checks(source: &str, file: &Path, raw: &RawConfig) -> Result<Vec<Check>, ConfigError> {
    let id_re = id_regex();
    let mut seen = std::collections::HashSet::new();
    let mut checks = Vec::with_capacity(raw.checks.len());

    for rc in &raw.checks {
        let line = locate_line(source, &rc.id);

        if !id_re.is_match(&rc.id) {
            return Err(ConfigError::InvalidCheck {
                file: file.to_path_buf(),
                line,
                check_id: rc.id.clone(),
                message: "id must match [A-Za-z_][A-Za-z0-9_-]*".to_string(),
            });
        }
        if !seen.insert(rc.id.clone()) {
            return Err(ConfigError::DuplicateId {
                file: file.to_path_buf(),
                line,
                check_id: rc.id.clone(),
            });
        }
        if rc.requires.iter().any(|r| r == &rc.id) {
            return Err(ConfigError::SelfDependency {
                file: file.to_path_buf(),
                line,
                check_id: rc.id.clone(),
            });
        }

        let timeout = match &rc.timeout {
            Some(raw_timeout) => {
                let nanos = go_parse_duration::parse_duration(raw_timeout).map_err(|e| {
                    ConfigError::InvalidCheck {
                        file: file.to_path_buf(),
                        line,
                        check_id: rc.id.clone(),
                        message: format!("invalid timeout \"{raw_timeout}\": {e:?}"),
                    }
                })?;
                if nanos <= 0 {
                    return Err(ConfigError::InvalidCheck {
                        file: file.to_path_buf(),
                        line,
                        check_id: rc.id.clone(),
                        message: "timeout must be positive".to_string(),
                    });
                }
                #[allow(clippy::cast_sign_loss)]
                Duration::from_nanos(nanos as u64)
            }
            None => types::DEFAULT_TIMEOUT,
        };

        // Interpolate before validating emptiness — spec.md §3 requires `run`
        // "non-empty after interpolation" and §4.1's pipeline orders
        // interpolate (step 4) ahead of validate (step 5). A `vars` entry
        // that resolves to an empty string must not slip a blank `run` past
        // this check.
        let run = interpolate_vars(&rc.run, &raw.vars).map_err(|var_name| {
            ConfigError::UnknownVariable {
                file: file.to_path_buf(),
                line,
                check_id: rc.id.clone(),
                var_name,
            }
        })?;
        let file_field = rc
            .file
            .as_ref()
            .map(|f| interpolate_vars(f, &raw.vars))
            .transpose()
            .map_err(|var_name| ConfigError::UnknownVariable {
                file: file.to_path_buf(),
                line,
                check_id: rc.id.clone(),
                var_name,
            })?;

        if run.trim().is_empty() {
            return Err(ConfigError::InvalidCheck {
                file: file.to_path_buf(),
                line,
                check_id: rc.id.clone(),
                message: "run must not be empty".to_string(),
            });
        }

        let grok = rc.grok.patterns().to_vec();
        for pattern in &grok {
            if let Err(cause) = crate::extract::GrokPattern::compile(pattern) {
                return Err(ConfigError::InvalidPattern {
                    file: file.to_path_buf(),
                    line,
                    check_id: rc.id.clone(),
                    pattern: pattern.clone(),
                    cause,
                });
            }
        }

        checks.push(Check {
            id: rc.id.clone(),
            run,
            file: file_field,
            grok,
            assert: rc.assert.clone(),
            severity: rc.severity,
            suggestion: rc.suggestion.clone(),
            fix: rc.fix.clone(),
            requires: rc.requires.clone(),
            timeout,
            line,
        });
    }

    Ok(checks)
}

fn validate_dependencies(file: &Path, checks: &[Check]) -> Result<(), ConfigError> {
    let ids: std::collections::HashSet<&str> = checks.iter().map(|c| c.id.as_str()).collect();
    for check in checks {
        for req in &check.requires {
            if !ids.contains(req.as_str()) {
                return Err(ConfigError::UnknownDependency {
                    file: file.to_path_buf(),
                    line: check.line,
                    check_id: check.id.clone(),
                    requires: req.clone(),
                });
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Gray/black DFS cycle detection, defensive duplicate of `graph::build_levels`'s
/// own check — the loader runs first in practice, so this is what actually
/// produces the `Cycle` error an operator sees.
fn detect_cycles(file: &Path, checks: &[Check]) -> Result<(), ConfigError> {
    let by_id: HashMap<&str, &Check> = checks.iter().map(|c| (c.id.as_str(), c)).collect();
    let mut color: HashMap<&str, Color> = checks.iter().map(|c| (c.id.as_str(), Color::White)).collect();
    let mut path: Vec<&str> = Vec::new();

    for check in checks {
        if color[check.id.as_str()] == Color::White {
            visit(check.id.as_str(), &by_id, &mut color, &mut path, file)?;
        }
    }
    Ok(())
}

fn visit<'a>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a Check>,
    color: &mut HashMap<&'a str, Color>,
    path: &mut Vec<&'a str>,
    file: &Path,
) -> Result<(), ConfigError> {
    color.insert(id, Color::Gray);
    path.push(id);

    let Some(check) = by_id.get(id) else {
        path.pop();
        color.insert(id, Color::Black);
        return Ok(());
    };

    for req in &check.requires {
        match color.get(req.as_str()) {
            Some(Color::Gray) => {
                let start = path.iter().position(|x| *x == req.as_str()).unwrap_or(0);
                let mut cycle: Vec<&str> = path[start..].to_vec();
                cycle.push(req.as_str());
                return Err(ConfigError::Cycle {
                    file: file.to_path_buf(),
                    line: check.line,
                    path: cycle.join(" -> "),
                });
            }
            Some(Color::Black) => {}
            _ => visit(req.as_str(), by_id, color, path, file)?,
        }
    }

    path.pop();
    color.insert(id, Color::Black);
    Ok(())
}

/// Replace `{{.name}}` placeholders with `vars[name]`. An unknown name is a
/// hard error carrying that name — spec.md §4.1 step 4 is explicit ("unknown
/// variable is an error with the check's line number"). Scoped to `run`/`file`
/// only; see `DESIGN.md` Open Question 3 for why `suggestion`/`fix` resolve
/// from the extracted map instead.
///
/// # Errors
///
/// Returns the unresolved placeholder's name.
fn interpolate_vars(template: &str, vars: &HashMap<String, String>) -> Result<String, String> {
    #[allow(clippy::unwrap_used)] // compile-time-constant pattern, infallible
    let placeholder_re = Regex::new(r"\{\{\.(\w+)\}\}").unwrap();
    let mut err = None;
    let result = placeholder_re.replace_all(template, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match vars.get(name) {
            Some(value) => value.clone(),
            None => {
                err.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });
    match err {
        Some(name) => Err(name),
        None => Ok(result.into_owned()),
    }
}

/// Best-effort 1-based line lookup for a check's `id: <id>` declaration.
/// `serde_yaml` does not carry source positions through derive-based
/// deserialization, so this is a textual scan rather than a real parser
/// position — documented as an Open Question in `DESIGN.md`.
fn locate_line(source: &str, check_id: &str) -> usize {
    let needle_quoted_1 = format!("id: \"{check_id}\"");
    let needle_quoted_2 = format!("id: '{check_id}'");
    let needle_bare = format!("id: {check_id}");

    for (idx, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with(&needle_quoted_1)
            || trimmed.starts_with(&needle_quoted_2)
            || trimmed == needle_bare
            || trimmed.starts_with(&format!("{needle_bare} "))
            || trimmed.starts_with(&format!("{needle_bare}#"))
        {
            return idx + 1;
        }
    }
    1
}
