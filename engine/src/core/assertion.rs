//! Structural assertions over captured plan output.

use serde::Serialize;

/// Presence of one expected identifier in the plan text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifierCheck {
    pub identifier: String,
    pub present: bool,
}

/// Per-identifier results, in the order the identifiers were expected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssertionReport {
    pub checks: Vec<IdentifierCheck>,
}

impl AssertionReport {
    /// True iff every expected identifier was found.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.present)
    }

    pub fn missing(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|check| !check.present)
            .map(|check| check.identifier.clone())
            .collect()
    }
}

/// Check each identifier for exact, case-sensitive containment in `plan_text`.
pub fn assert_identifiers<S: AsRef<str>>(plan_text: &str, expected: &[S]) -> AssertionReport {
    let checks = expected
        .iter()
        .map(|identifier| {
            let identifier = identifier.as_ref();
            IdentifierCheck {
                identifier: identifier.to_string(),
                present: plan_text.contains(identifier),
            }
        })
        .collect();
    AssertionReport { checks }
}
