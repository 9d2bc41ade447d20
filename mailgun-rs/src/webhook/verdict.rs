use serde::{Deserialize, Serialize};

/// Canonical result of a spam, DKIM or SPF check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
    #[default]
    NotAvailable,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::NotAvailable => "NOT_AVAILABLE",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a provider DKIM/SPF result (`pass`, `fail`, `softfail`, `neutral`, ...)
/// onto a [`Verdict`]. Case-insensitive; unknown values are `NotAvailable`.
pub fn normalize_verdict(result: &str) -> Verdict {
    match result.to_ascii_lowercase().as_str() {
        "pass" => Verdict::Pass,
        "fail" | "softfail" => Verdict::Fail,
        _ => Verdict::NotAvailable,
    }
}

/// Map the provider's stringified spam flag onto a [`Verdict`].
///
/// Two-valued: a flag that parses as true is `Fail`, anything else
/// (false, empty, unparsable) is `Pass`.
pub fn spam_verdict(flag: &str) -> Verdict {
    if parse_flag(flag).unwrap_or(false) {
        Verdict::Fail
    } else {
        Verdict::Pass
    }
}

/// Strict boolean spellings; anything else, padded values included, is unparsable
fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
