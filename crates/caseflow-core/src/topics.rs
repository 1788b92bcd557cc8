//! Misconduct topic vocabulary.
//!
//! Guidance text returned by the extraction collaborator is tokenized
//! against a fixed vocabulary of misconduct-related keywords to derive the
//! topic tags stored on a cache entry. Matching is case-insensitive
//! substring containment; the stored tag is the canonical vocabulary form.

use lazy_static::lazy_static;
use std::collections::BTreeSet;

lazy_static! {
    /// Canonical misconduct vocabulary, lowercase.
    ///
    /// Multi-word phrases are matched as written (single internal space).
    static ref MISCONDUCT_VOCABULARY: Vec<&'static str> = vec![
        "absenteeism",
        "dishonesty",
        "discrimination",
        "falsification",
        "harassment",
        "insubordination",
        "intoxication",
        "negligence",
        "progressive discipline",
        "sabotage",
        "safety violation",
        "substance abuse",
        "suspension",
        "tardiness",
        "termination",
        "theft",
        "unauthorized absence",
        "violence",
        "workplace injury",
        "written warning",
    ];
}

/// Derive topic tags for a block of guidance text.
///
/// Returns the canonical vocabulary entries whose text appears (case
/// insensitively) anywhere in `text`. The result is a sorted set, so topic
/// lists are stable across runs.
pub fn extract_topics(text: &str) -> BTreeSet<String> {
    let haystack = text.to_lowercase();

    MISCONDUCT_VOCABULARY
        .iter()
        .filter(|keyword| haystack.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect()
}

/// The size of the fixed vocabulary. Exposed for diagnostics.
pub fn vocabulary_len() -> usize {
    MISCONDUCT_VOCABULARY.len()
}
