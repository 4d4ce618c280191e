use std::collections::HashMap;

use regex::Regex;

/// A compiled extraction pattern. Generalizes `tokf::filter::extract`'s
/// first-match/passthrough idiom from "numbered-group interpolation into a
/// template" to "named-capture accumulation into a value map," which is what
/// spec.md §4.4 asks the extractor to do.
pub struct GrokPattern {
    regex: Regex,
}

/// Translate a small, self-contained subset of grok vocabulary
/// (`%{TOKEN:name}`) into named-capture regex fragments. Raw regex with
/// `(?P<name>...)` groups is also accepted unchanged — the spec treats the
/// grok library as an external capability with a specified contract, and this
/// subset covers the token families spec.md's own examples use.
fn grok_to_regex(pattern: &str) -> String {
    #[allow(clippy::unwrap_used)] // compile-time-constant pattern, infallible
    let token_re = Regex::new(r"%\{(\w+):(\w+)\}").unwrap();
    token_re
        .replace_all(pattern, |caps: &regex::Captures<'_>| {
            let kind = &caps[1];
            let name = &caps[2];
            let fragment = match kind {
                "NUMBER" => r"-?\d+(?:\.\d+)?",
                "INT" => r"-?\d+",
                "WORD" => r"\w+",
                "DATA" => r".*?",
                "GREEDYDATA" => r".*",
                _ => r".*?",
            };
            format!("(?P<{name}>{fragment})")
        })
        .into_owned()
}

impl GrokPattern {
    /// Compile a grok or raw-regex pattern string.
    ///
    /// # Errors
    ///
    /// Returns the underlying `regex::Error` if the translated pattern is
    /// not valid regex syntax.
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let translated = grok_to_regex(pattern);
        Ok(Self {
            regex: Regex::new(&translated)?,
        })
    }
}

/// Apply every pattern against `text`, accumulating named captures into one
/// map. Later patterns in the slice overwrite earlier ones on key collision
/// (spec.md §4.4); a pattern that does not match contributes nothing and is
/// not an error — extraction is best-effort, the assertion stage is where
/// missing data becomes meaningful (an empty string, coerced to `0`).
#[must_use]
pub fn apply(patterns: &[GrokPattern], text: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for pattern in patterns {
        let Some(caps) = pattern.regex.captures(text) else {
            continue;
        };
        for name in pattern.regex.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                values.insert(name.to_string(), m.as_str().to_string());
            }
        }
    }
    values
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn extracts_number_token() {
        let p = GrokPattern::compile("coverage: %{NUMBER:pct}%").unwrap();
        let values = apply(&[p], "coverage: 87.5%");
        assert_eq!(values.get("pct").map(String::as_str), Some("87.5"));
    }

    #[test]
    fn extracts_multiple_named_groups() {
        let p = GrokPattern::compile("%{WORD:level}: %{INT:count} issues").unwrap();
        let values = apply(&[p], "warning: 3 issues");
        assert_eq!(values.get("level").map(String::as_str), Some("warning"));
        assert_eq!(values.get("count").map(String::as_str), Some("3"));
    }

    #[test]
    fn no_match_contributes_nothing() {
        let p = GrokPattern::compile("%{NUMBER:pct}%").unwrap();
        let values = apply(&[p], "no numbers here");
        assert!(values.is_empty());
    }

    #[test]
    fn later_pattern_overwrites_earlier_key() {
        let p1 = GrokPattern::compile("first %{NUMBER:n}").unwrap();
        let p2 = GrokPattern::compile("second %{NUMBER:n}").unwrap();
        let values = apply(&[p1, p2], "first 1 second 2");
        assert_eq!(values.get("n").map(String::as_str), Some("2"));
    }

    #[test]
    fn raw_named_capture_regex_is_accepted() {
        let p = GrokPattern::compile(r"(?P<name>\w+)=(?P<value>\d+)").unwrap();
        let values = apply(&[p], "threshold=42");
        assert_eq!(values.get("name").map(String::as_str), Some("threshold"));
        assert_eq!(values.get("value").map(String::as_str), Some("42"));
    }
}
