//! The `scanCode` tool: a handful of regex rules for common review nits.

use std::fmt;

use regex::Regex;
use serde::Deserialize;

use crate::error::ToolError;

/// Arguments accepted by `scanCode`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanCodeInput {
    /// Source text to scan.
    pub code: String,
}

/// Rule table: (name, pattern, warning line).
const RULES: [(&str, &str, &str); 3] = [
    (
        "todo",
        r"(?m)\bTODO\b",
        "- Found TODO comment: TODOs indicate unfinished work and should be resolved or tracked.",
    ),
    (
        "print",
        r"(?m)\bprintln\s*\(",
        "- Found print statement: Use a proper logger instead of println for production code.",
    ),
    (
        "secret",
        r#"(?i)(api_key|secret|token)\s*[:=]\s*['"][A-Za-z0-9_-]{16,}['"]"#,
        "- Possible hardcoded secret: Avoid committing API keys or tokens. Use environment variables or a secure vault.",
    ),
];

#[derive(Debug, Clone)]
struct ScanRule {
    name: &'static str,
    pattern: Regex,
    warning: &'static str,
}

/// Compiled rule set.
#[derive(Debug, Clone)]
pub struct CodeScanner {
    rules: Vec<ScanRule>,
}

impl CodeScanner {
    /// Compiles the built-in rules.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidPattern`] if a rule fails to compile.
    pub fn new() -> Result<Self, ToolError> {
        let rules = RULES
            .iter()
            .map(|&(name, pattern, warning)| {
                Ok(ScanRule {
                    name,
                    pattern: Regex::new(pattern)?,
                    warning,
                })
            })
            .collect::<Result<Vec<_>, ToolError>>()?;

        Ok(Self { rules })
    }

    /// Runs every rule against `code`. Each rule reports at most once.
    #[must_use]
    pub fn scan(&self, code: &str) -> ScanReport {
        let warnings = self
            .rules
            .iter()
            .filter(|rule| rule.pattern.is_match(code))
            .inspect(|rule| tracing::trace!(rule = rule.name, "scan rule matched"))
            .map(|rule| rule.warning)
            .collect();

        ScanReport { warnings }
    }
}

/// Findings of one scan, in rule order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// One line per matched rule.
    pub warnings: Vec<&'static str>,
}

impl ScanReport {
    /// True when no rule matched.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            f.write_str("No issues found.")
        } else {
            f.write_str(&self.warnings.join("\n"))
        }
    }
}
