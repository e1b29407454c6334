//! Lexical relevance scoring and per-source thresholds.

use crate::types::SourceKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Fraction of distinct query terms that occur in the candidate text.
///
/// Both sides are lower-cased; query terms are whitespace-separated and matched
/// as substrings of the candidate. The result is in `[0, 1]` and is `0.0` for an
/// empty query or an empty candidate.
pub fn score(query: &str, candidate: &str) -> f32 {
    let query = query.to_lowercase();
    let terms: HashSet<&str> = query.split_whitespace().collect();

    if terms.is_empty() {
        return 0.0;
    }

    let candidate = candidate.to_lowercase();
    if candidate.trim().is_empty() {
        return 0.0;
    }

    let matches = terms
        .iter()
        .filter(|term| candidate.contains(**term))
        .count();

    matches as f32 / terms.len().max(1) as f32
}

/// Minimum score a chunk needs to enter the context, per source kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceThresholds {
    pub local: f32,
    pub cloud: f32,
    pub web: f32,
}

impl Default for RelevanceThresholds {
    fn default() -> Self {
        Self {
            local: 0.15,
            cloud: 0.10,
            web: 0.20,
        }
    }
}

impl RelevanceThresholds {
    pub fn for_kind(&self, kind: SourceKind) -> f32 {
        match kind {
            SourceKind::Local => self.local,
            SourceKind::Web => self.web,
            SourceKind::Cloud => self.cloud,
        }
    }

    pub fn passes(&self, kind: SourceKind, score: f32) -> bool {
        score >= self.for_kind(kind)
    }
}
