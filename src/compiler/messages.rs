//! Turning raw bundler output into deduplicated, readable diagnostics.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

// Compile regexes once using LazyLock
static ERROR_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\berror\b").unwrap());

static WARNING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bwarn(ing)?\b").unwrap());

static SYNTAX_ERROR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)syntax ?error").unwrap());

static BLANK_RUN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Error,
    Warning,
}

/// Errors and warnings from one compile cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Diagnostics {
    /// Group output lines into diagnostics.
    ///
    /// A line mentioning an error or warning opens a block; following non-blank
    /// lines belong to it until a blank line. Lines outside a block are progress
    /// noise and are dropped.
    pub fn from_output(lines: &[String]) -> Self {
        let mut diagnostics = Self::default();
        let mut current: Option<(Severity, Vec<String>)> = None;

        for raw in lines {
            let line = console::strip_ansi_codes(raw).trim_end().to_string();
            let opens = if ERROR_REGEX.is_match(&line) {
                Some(Severity::Error)
            } else if WARNING_REGEX.is_match(&line) {
                Some(Severity::Warning)
            } else {
                None
            };

            match (opens, current.as_mut()) {
                (Some(severity), _) => {
                    diagnostics.flush(current.take());
                    current = Some((severity, vec![line]));
                }
                (None, Some(_)) if line.trim().is_empty() => diagnostics.flush(current.take()),
                (None, Some((_, block))) => block.push(line),
                (None, None) => {}
            }
        }
        diagnostics.flush(current);
        diagnostics
    }

    fn flush(&mut self, block: Option<(Severity, Vec<String>)>) {
        if let Some((severity, lines)) = block {
            let message = lines.join("\n");
            match severity {
                Severity::Error => self.errors.push(message),
                Severity::Warning => self.warnings.push(message),
            }
        }
    }

    /// Deduplicated view for display. Syntax errors hide every other error.
    pub fn formatted(&self) -> Self {
        let mut errors = dedupe(&self.errors);
        if errors.iter().any(|e| SYNTAX_ERROR_REGEX.is_match(e)) {
            errors.retain(|e| SYNTAX_ERROR_REGEX.is_match(e));
        }
        Self {
            errors,
            warnings: dedupe(&self.warnings),
        }
    }
}

fn dedupe(messages: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    messages
        .iter()
        .map(|m| BLANK_RUN_REGEX.replace_all(m.trim(), "\n\n").to_string())
        .filter(|m| !m.is_empty() && seen.insert(m.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    #[test]
    fn test_clean_output_has_no_diagnostics() {
        let diagnostics = Diagnostics::from_output(&lines("building...\nbuilt in 40ms"));
        assert_eq!(diagnostics, Diagnostics::default());
    }

    #[test]
    fn test_error_block_collects_following_lines() {
        let diagnostics = Diagnostics::from_output(&lines(
            "✘ [ERROR] Could not resolve \"lodash\"\n    src/index.js:1:7:\n      1 │ import _ from \"lodash\";\n\nbuild finished",
        ));
        assert_eq!(diagnostics.errors.len(), 1);
        assert!(diagnostics.errors[0].starts_with("✘ [ERROR] Could not resolve"));
        assert!(diagnostics.errors[0].contains("src/index.js:1:7"));
        assert!(!diagnostics.errors[0].contains("build finished"));
    }

    #[test]
    fn test_warning_and_error_are_split() {
        let diagnostics = Diagnostics::from_output(&lines(
            "WARNING: unused variable x\nerror: missing semicolon",
        ));
        assert_eq!(diagnostics.warnings, vec!["WARNING: unused variable x"]);
        assert_eq!(diagnostics.errors, vec!["error: missing semicolon"]);
    }

    #[test]
    fn test_ansi_codes_are_stripped() {
        let diagnostics = Diagnostics::from_output(&["\u{1b}[31merror\u{1b}[0m: boom".to_string()]);
        assert_eq!(diagnostics.errors, vec!["error: boom"]);
    }

    #[test]
    fn test_formatted_dedupes() {
        let diagnostics = Diagnostics {
            errors: vec!["error: a".into(), "error: a".into(), "error: b".into()],
            warnings: vec!["warn: w".into(), "warn: w".into()],
        };
        let formatted = diagnostics.formatted();
        assert_eq!(formatted.errors, vec!["error: a", "error: b"]);
        assert_eq!(formatted.warnings, vec!["warn: w"]);
    }

    #[test]
    fn test_syntax_errors_take_priority() {
        let diagnostics = Diagnostics {
            errors: vec!["error: module not found".into(), "SyntaxError: Unexpected token".into()],
            warnings: vec![],
        };
        assert_eq!(
            diagnostics.formatted().errors,
            vec!["SyntaxError: Unexpected token"]
        );
    }
}
