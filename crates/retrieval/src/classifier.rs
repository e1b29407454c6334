//! Keyword-lexicon query classification.
//!
//! The classification is advisory: it feeds the source selector but never
//! prevents a source from being queried on its own.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Keywords that indicate recent, live or general-world information.
const EXTERNAL_KEYWORDS: &[&str] = &[
    // weather
    "weather", "temperature", "climate", "rain", "snow", "sunny", "cloudy", "forecast",
    // news
    "news", "today", "current", "latest", "recent", "now", "happening",
    // markets
    "price", "stock", "market", "bitcoin", "cryptocurrency", "exchange", "trading", "usd", "eur",
    "dollar",
    // places
    "city", "country", "location", "map", "directions", "distance", "tokyo", "london", "paris",
    "new york",
    // time
    "time", "date", "schedule", "calendar", "when",
    // general knowledge
    "what is", "who is", "how to", "define", "meaning",
    // live data
    "live", "real-time", "updates", "status", "current status",
];

/// Keywords that point at the user's own documents.
const DOCUMENT_KEYWORDS: &[&str] = &[
    "document", "pdf", "file", "page", "section", "chapter", "report", "uploaded",
    "this document", "the document", "according to", "mentioned", "content", "text", "written",
    "shows", "describes", "analysis",
];

/// Which kind of knowledge a question is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryScope {
    /// Only personal-document keywords matched
    Document,
    /// Only recency/external keywords matched
    External,
    /// Both or neither matched
    Mixed,
}

impl fmt::Display for QueryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryScope::Document => "document",
            QueryScope::External => "external",
            QueryScope::Mixed => "mixed",
        })
    }
}

/// Lexicon a trigger keyword belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerTag {
    External,
    Document,
}

/// A keyword found in the query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Trigger {
    pub keyword: &'static str,
    pub tag: TriggerTag,
}

/// Result of classifying one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub scope: QueryScope,
    pub triggers: BTreeSet<Trigger>,
}

impl Classification {
    pub fn has_document_triggers(&self) -> bool {
        self.triggers.iter().any(|t| t.tag == TriggerTag::Document)
    }

    pub fn has_external_triggers(&self) -> bool {
        self.triggers.iter().any(|t| t.tag == TriggerTag::External)
    }

    /// Matched keywords with the given tag, in lexical order.
    pub fn keywords(&self, tag: TriggerTag) -> Vec<&'static str> {
        self.triggers
            .iter()
            .filter(|t| t.tag == tag)
            .map(|t| t.keyword)
            .collect()
    }
}

/// Classify a query by keyword lexicon.
///
/// Matching is case-insensitive and on whole words, so "now" does not fire
/// inside "know" while "new york" still matches as a phrase.
pub fn classify(query: &str) -> Classification {
    let normalized = normalize(query);

    let mut triggers = BTreeSet::new();
    for (lexicon, tag) in [
        (EXTERNAL_KEYWORDS, TriggerTag::External),
        (DOCUMENT_KEYWORDS, TriggerTag::Document),
    ] {
        for keyword in lexicon {
            if normalized.contains(&format!(" {} ", keyword)) {
                triggers.insert(Trigger { keyword, tag });
            }
        }
    }

    let external = triggers.iter().any(|t| t.tag == TriggerTag::External);
    let document = triggers.iter().any(|t| t.tag == TriggerTag::Document);

    let scope = match (external, document) {
        (true, false) => QueryScope::External,
        (false, true) => QueryScope::Document,
        _ => QueryScope::Mixed,
    };

    tracing::debug!(%scope, triggers = triggers.len(), "Classified query");

    Classification { scope, triggers }
}

/// Lower-case, turn punctuation into word breaks and pad with spaces.
///
/// Hyphens survive so hyphenated keywords like "real-time" keep matching.
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
        .collect();

    let words: Vec<&str> = cleaned.split_whitespace().collect();
    format!(" {} ", words.join(" "))
}
