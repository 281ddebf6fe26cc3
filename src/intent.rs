//! Heuristic intent classification.
//!
//! Rules are data: an ordered list of pattern-set/label pairs evaluated
//! against the raw query text. A rule matches when every one of its patterns
//! matches somewhere in the text, in any order. The first match wins, so
//! specific rules sit above general ones.

use regex::Regex;
use std::sync::LazyLock;

/// Label used when no rule matches.
pub const DEFAULT_INTENT: &str = "generic filter/aggregation query";

/// Patterns that must all match, and the intent they signal.
#[derive(Debug)]
pub struct IntentRule {
    pub label: &'static str,
    patterns: Vec<Regex>,
}

impl IntentRule {
    fn new(patterns: &[&str], label: &'static str) -> Self {
        Self {
            label,
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("valid intent pattern"))
                .collect(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().all(|re| re.is_match(text))
    }
}

static RULES: LazyLock<Vec<IntentRule>> = LazyLock::new(|| {
    vec![
        IntentRule::new(
            &[r#"(?i)\bevent_?(id|code)\s*=\s*"?4688\b"#, r"(?i)powershell"],
            "PowerShell execution detection",
        ),
        IntentRule::new(
            &[r"(?i)\btransaction\b", r"\b4625\b", r"\b4624\b", r"\b4688\b"],
            "failed logon, then successful logon, then process execution chain",
        ),
        IntentRule::new(
            &[r"\b4625\b", r"(?i)\b(count|where)\b"],
            "brute-force logon attempt detection",
        ),
        IntentRule::new(
            &[r"(?i)sqli|information_schema|OR 1=1|sqlmap"],
            "SQL injection / authentication bypass attempt detection",
        ),
        IntentRule::new(
            &[r"(?i)7z\.exe|invoke-webrequest|exfil|net_dst"],
            "archive and outbound transfer (exfiltration) detection",
        ),
        IntentRule::new(
            &[r"(?i)\b(dc|distinct_count)\(\s*dest_port\s*\)"],
            "port scan detection",
        ),
    ]
});

/// The ordered rule list.
pub fn rules() -> &'static [IntentRule] {
    &RULES
}

/// Classify the intent of raw query text.
///
/// Depends only on the text; the structural model is not consulted because
/// some signals span several commands.
pub fn classify(text: &str) -> &'static str {
    rules()
        .iter()
        .find(|rule| rule.matches(text))
        .map(|rule| rule.label)
        .unwrap_or(DEFAULT_INTENT)
}
