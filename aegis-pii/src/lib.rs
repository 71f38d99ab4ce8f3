//! PII Transformer (C3): pseudonymize-in / de-pseudonymize-out around LLM
//! calls, scoped by `(orgSlug, agentSlug)` (§4.3).

mod config;
mod patterns;

pub use config::PiiConfig;
pub use patterns::PatternKind;

use aegis_core::PiiDictionary;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;

/// Errors specific to the PII Transformer. `DictionaryLoadFailure` is
/// non-fatal for the call (§4.3): callers degrade to pattern-only and
/// record the degradation on the usage event instead of propagating it.
#[derive(Debug, Clone, Error)]
pub enum PiiError {
    #[error("failed to load PII dictionary for {org_slug}/{agent_slug}: {reason}")]
    DictionaryLoadFailure {
        org_slug: String,
        agent_slug: String,
        reason: String,
    },
}

/// Where a single mapping entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum MappingSource {
    Dictionary,
    Pattern,
}

/// One substitution made during `pseudonymize`, sufficient on its own to
/// invert that substitution during `reverse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PseudonymMapping {
    pub original: String,
    pub pseudonym: String,
    pub source: MappingSource,
    /// Present when `source == Pattern`; the pattern that matched.
    pub pattern: Option<PatternKind>,
}

/// Result of a single `pseudonymize` call (§4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PseudonymizeResult {
    pub text: String,
    pub mappings: Vec<PseudonymMapping>,
    pub pattern_hits: Vec<PatternKind>,
    /// Set when the dictionary lookup degraded to pattern-only this call.
    pub dictionary_degraded: bool,
}

/// Reserved pseudonym namespace prefix (§4.3): pseudonyms are drawn from a
/// disjoint namespace so a pseudonym can never collide with plaintext that
/// happens to look like one.
const PSEUDONYM_PREFIX: &str = "@";

/// Stateless pseudonymize/reverse transformer. Dictionaries and pattern
/// sets are supplied per call (they are org/agent-scoped and loaded by the
/// caller), not mutated in place by [`PiiDictionary`] itself.
#[derive(Debug, Clone, Default)]
pub struct PiiTransformer {
    config: PiiConfig,
}

impl PiiTransformer {
    pub fn new(config: PiiConfig) -> Self {
        Self { config }
    }

    /// Pseudonymize `text` using `dictionary` (may be `None` when the
    /// dictionary load degraded, per §4.3) and the configured regex
    /// pattern set.
    ///
    /// Order: dictionary substitution first, longest match first (ties
    /// broken left-most), then regex pattern scanning over what remains.
    pub fn pseudonymize(&self, text: &str, dictionary: Option<&PiiDictionary>) -> PseudonymizeResult {
        let mut mappings = Vec::new();
        let mut working = text.to_string();

        if let Some(dict) = dictionary {
            working = self.apply_dictionary(&working, dict, &mut mappings);
        }

        let mut pattern_hits = Vec::new();
        working = self.apply_patterns(&working, &mut mappings, &mut pattern_hits);

        PseudonymizeResult {
            text: working,
            mappings,
            pattern_hits,
            dictionary_degraded: dictionary.is_none(),
        }
    }

    fn apply_dictionary(
        &self,
        text: &str,
        dictionary: &PiiDictionary,
        mappings: &mut Vec<PseudonymMapping>,
    ) -> String {
        // Longest match first, ties broken left-most: sort candidates by
        // (descending length) and scan the text once, greedily.
        let mut entries: Vec<(&String, &String)> = dictionary.entries.iter().collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

        let mut result = String::with_capacity(text.len());
        let mut cursor = 0usize;
        'outer: while cursor < text.len() {
            for (original, pseudonym) in &entries {
                if text[cursor..].starts_with(original.as_str()) {
                    result.push_str(pseudonym);
                    mappings.push(PseudonymMapping {
                        original: (*original).clone(),
                        pseudonym: (*pseudonym).clone(),
                        source: MappingSource::Dictionary,
                        pattern: None,
                    });
                    cursor += original.len();
                    continue 'outer;
                }
            }
            let ch = text[cursor..].chars().next().unwrap();
            result.push(ch);
            cursor += ch.len_utf8();
        }
        result
    }

    fn apply_patterns(
        &self,
        text: &str,
        mappings: &mut Vec<PseudonymMapping>,
        pattern_hits: &mut Vec<PatternKind>,
    ) -> String {
        let mut working = text.to_string();
        for (kind, regex) in self.config.compiled_patterns() {
            let mut replaced = String::with_capacity(working.len());
            let mut last_end = 0;
            for m in regex.find_iter(&working) {
                replaced.push_str(&working[last_end..m.start()]);
                let original = m.as_str().to_string();
                let token = pseudonym_token(kind, &original);
                replaced.push_str(&token);
                mappings.push(PseudonymMapping {
                    original,
                    pseudonym: token,
                    source: MappingSource::Pattern,
                    pattern: Some(kind),
                });
                pattern_hits.push(kind);
                last_end = m.end();
            }
            replaced.push_str(&working[last_end..]);
            working = replaced;
        }
        working
    }

    /// Replace each pseudonym in `text` with its original value when the
    /// pseudonym appears on a word boundary (§4.3).
    pub fn reverse(&self, text: &str, mappings: &[PseudonymMapping]) -> String {
        // Longest pseudonym first so a shorter pseudonym that happens to be
        // a substring of a longer one never partially matches it first.
        let mut by_length: Vec<&PseudonymMapping> = mappings.iter().collect();
        by_length.sort_by(|a, b| b.pseudonym.len().cmp(&a.pseudonym.len()));

        let mut working = text.to_string();
        for mapping in by_length {
            working = replace_on_word_boundary(&working, &mapping.pseudonym, &mapping.original);
        }
        working
    }
}

/// Deterministic pseudonym token for a pattern hit: a reserved-namespace
/// prefix plus the first 12 hex characters of the SHA-256 of the original
/// value, so the same plaintext always maps to the same token within a call
/// (and across retries of that call).
fn pseudonym_token(kind: PatternKind, original: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(original.as_bytes());
    let digest = hasher.finalize();
    format!("{PSEUDONYM_PREFIX}{}", &hex::encode(digest)[..12])
}

fn replace_on_word_boundary(text: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return text.to_string();
    }
    let mut result = String::with_capacity(text.len());
    let mut cursor = 0usize;
    while let Some(offset) = text[cursor..].find(needle) {
        let start = cursor + offset;
        let end = start + needle.len();
        let left_ok = text[..start]
            .chars()
            .next_back()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        let right_ok = text[end..]
            .chars()
            .next()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        result.push_str(&text[cursor..start]);
        if left_ok && right_ok {
            result.push_str(replacement);
        } else {
            result.push_str(needle);
        }
        cursor = end;
    }
    result.push_str(&text[cursor..]);
    result
}

/// Build a [`PiiDictionary`] map keyed by `(orgSlug, agentSlug)`, mirroring
/// how a real loader (backed by the persistence interface) would be shaped.
pub type DictionaryStore = HashMap<(String, String), PiiDictionary>;
