use std::collections::HashMap;

use crate::config::types::Check;

/// A dependency-graph error. Kept distinct from `ConfigError` even though
/// the loader's own cycle check (see `config::mod::detect_cycles`) always
/// catches cycles first in practice — spec.md §4.2 calls this out as a
/// "defensive duplicate," so the graph does not trust the loader blindly.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("dependency cycle: {0}")]
    Cycle(String),
}

/// Build a deterministic layered execution order: each returned `Vec<String>`
/// is a "level" of check ids whose dependencies are all satisfied by every
/// earlier level, and whose members carry no dependency on each other — so a
/// level's checks may run concurrently, but levels themselves run strictly
/// in sequence.
///
/// Kahn's algorithm: repeatedly collect every check whose in-degree (number
/// of not-yet-scheduled `requires` entries) is zero, in declaration order,
/// then remove that level's ids from the remaining in-degree counts.
///
/// # Errors
///
/// Returns `GraphError::Cycle` if any check can never reach in-degree zero.
pub fn build_levels(checks: &[Check]) -> Result<Vec<Vec<String>>, GraphError> {
    let mut in_degree: HashMap<&str, usize> = checks
        .iter()
        .map(|c| (c.id.as_str(), c.requires.len()))
        .collect();

    // dependents[x] = ids that require x, so removing x can drop their count.
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for check in checks {
        for req in &check.requires {
            dependents.entry(req.as_str()).or_default().push(check.id.as_str());
        }
    }

    let mut levels: Vec<Vec<String>> = Vec::new();
    let mut scheduled = 0usize;

    while scheduled < checks.len() {
        let ready: Vec<&str> = checks
            .iter()
            .map(|c| c.id.as_str())
            .filter(|id| in_degree.get(id).copied() == Some(0))
            .collect();

        if ready.is_empty() {
            let stuck: Vec<&str> = in_degree
                .iter()
                .filter(|(_, &deg)| deg > 0)
                .map(|(id, _)| *id)
                .collect();
            return Err(GraphError::Cycle(stuck.join(", ")));
        }

        for id in &ready {
            in_degree.remove(id);
            scheduled += 1;
            if let Some(deps) = dependents.get(id) {
                for dependent in deps {
                    if let Some(deg) = in_degree.get_mut(dependent) {
                        *deg = deg.saturating_sub(1);
                    }
                }
            }
        }

        levels.push(ready.into_iter().map(str::to_string).collect());
    }

    Ok(levels)
}
