//! Regex pattern set used for the scan phase of `pseudonymize` (§4.3).

use serde::{Deserialize, Serialize};

/// A recognized pattern class. The set is loaded from config, not hardcoded
/// into the engine, so an operator can disable a class without a redeploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Email,
    Phone,
    NationalId,
    CardNumber,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Email => "email",
            PatternKind::Phone => "phone",
            PatternKind::NationalId => "national_id",
            PatternKind::CardNumber => "card_number",
        }
    }

    /// The default regex source for this pattern class.
    pub fn default_regex(&self) -> &'static str {
        match self {
            PatternKind::Email => r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            PatternKind::Phone => r"\+?\d{1,3}?[\s.-]?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}",
            PatternKind::NationalId => r"\b\d{3}-\d{2}-\d{4}\b",
            PatternKind::CardNumber => r"\b(?:\d[ -]?){13,16}\b",
        }
    }

    pub fn all() -> [PatternKind; 4] {
        [
            PatternKind::Email,
            PatternKind::Phone,
            PatternKind::NationalId,
            PatternKind::CardNumber,
        ]
    }
}
