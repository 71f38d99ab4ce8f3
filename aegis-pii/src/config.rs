//! PII Transformer configuration: which pattern classes are active, loaded
//! the way the rest of the workspace loads subsystem config (plain struct +
//! `from_env`).

use crate::patterns::PatternKind;
use regex::Regex;

/// Active pattern set for a [`crate::PiiTransformer`].
#[derive(Debug, Clone)]
pub struct PiiConfig {
    enabled: Vec<PatternKind>,
}

impl Default for PiiConfig {
    fn default() -> Self {
        Self { enabled: Vec::new() }
    }
}

impl PiiConfig {
    /// All four pattern classes enabled — the common case.
    pub fn with_defaults() -> Self {
        Self {
            enabled: PatternKind::all().to_vec(),
        }
    }

    /// Load from `PII_PATTERNS_ENABLED` (comma-separated pattern names,
    /// e.g. `email,phone`); unset or empty enables none.
    pub fn from_env() -> Self {
        match std::env::var("PII_PATTERNS_ENABLED") {
            Ok(raw) => {
                let enabled = raw
                    .split(',')
                    .filter_map(|s| match s.trim() {
                        "email" => Some(PatternKind::Email),
                        "phone" => Some(PatternKind::Phone),
                        "national_id" => Some(PatternKind::NationalId),
                        "card_number" => Some(PatternKind::CardNumber),
                        "" => None,
                        other => {
                            tracing::warn!(pattern = other, "unknown PII pattern name in PII_PATTERNS_ENABLED; ignoring");
                            None
                        }
                    })
                    .collect();
                Self { enabled }
            }
            Err(_) => Self::default(),
        }
    }

    /// Compiled regexes for the enabled pattern set, in a stable order.
    pub fn compiled_patterns(&self) -> Vec<(PatternKind, Regex)> {
        self.enabled
            .iter()
            .map(|kind| {
                let regex = Regex::new(kind.default_regex())
                    .expect("built-in PII pattern regex must compile");
                (*kind, regex)
            })
            .collect()
    }
}
