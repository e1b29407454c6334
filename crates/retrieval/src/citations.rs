//! Citation extraction and validation.

use crate::types::{AnswerResult, Citation, ContextBundle, SourceUsage};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Bracketed numeric citation marker, e.g. `[3]`.
static MARKER_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[(\d+)\]").ok());

/// Distinct citation indices referenced in `text`, ascending.
pub fn extract_markers(text: &str) -> BTreeSet<usize> {
    let Some(re) = MARKER_RE.as_ref() else {
        return BTreeSet::new();
    };

    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<usize>().ok())
        .collect()
}

/// Markers in `text` that point at no entry of `bundle`.
pub fn orphaned_markers(text: &str, bundle: &ContextBundle) -> Vec<usize> {
    extract_markers(text)
        .into_iter()
        .filter(|index| bundle.get(*index).is_none())
        .collect()
}

/// Turn raw generator output into an [`AnswerResult`].
///
/// Only bundle entries the text actually cites become citations, ordered by
/// index, and usage counts are taken from those citations. Markers with no
/// matching entry stay in the text untouched and are logged. The text itself is
/// never rewritten, so validating the same text against the same bundle again
/// yields the same result.
pub fn validate(raw_answer: &str, bundle: &ContextBundle, snippet_chars: usize) -> AnswerResult {
    let mut citations = Vec::new();
    let mut usage = SourceUsage::default();

    for index in extract_markers(raw_answer) {
        match bundle.get(index) {
            Some(entry) => {
                let kind = entry.chunk.kind();
                usage.increment(kind);
                citations.push(Citation {
                    index,
                    source_kind: kind,
                    locator: entry.chunk.locator.clone(),
                    name: entry.chunk.name.clone(),
                    snippet: snippet(&entry.chunk.text, snippet_chars),
                    relevance: entry.score,
                });
            }
            None => {
                tracing::warn!(
                    marker = index,
                    bundle_len = bundle.len(),
                    "Malformed citation: answer cites a source that was not provided"
                );
            }
        }
    }

    tracing::debug!(
        cited = citations.len(),
        provided = bundle.len(),
        "Validated citations"
    );

    AnswerResult {
        response: raw_answer.to_string(),
        citations,
        sources_used: usage,
        transcription: None,
        diagnostics: None,
    }
}

/// Shorten evidence text for display, cutting at a word boundary.
fn snippet(text: &str, max_chars: usize) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || max_chars == 0 {
        return None;
    }

    if text.chars().count() <= max_chars {
        return Some(text.to_string());
    }

    let truncated: String = text.chars().take(max_chars).collect();
    let cut = match truncated.rfind(char::is_whitespace) {
        Some(last_space) if last_space > 0 => &truncated[..last_space],
        _ => truncated.as_str(),
    };

    Some(format!("{}...", cut.trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, SourceKind};

    fn bundle() -> ContextBundle {
        let mut bundle = ContextBundle::new();
        bundle.admit(Chunk::local("Section 3 describes a mixed-methods study.", 3, None), 0.8);
        bundle.admit(Chunk::web("BTC", "Bitcoin trades at 60k", "https://example.com/btc"), 0.6);
        bundle.admit(Chunk::cloud("notes.txt", "Meeting notes", "https://drive/notes"), 0.3);
        bundle
    }

    #[test]
    fn test_extract_markers() {
        let markers = extract_markers("See [2] and [1], again [2]. Not [x] or [ 3 ].");
        assert_eq!(markers.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_only_cited_entries_are_kept() {
        let result = validate("Bitcoin is at 60k [2].", &bundle(), 200);

        assert_eq!(result.citations.len(), 1);
        assert_eq!(result.citations[0].index, 2);
        assert_eq!(result.citations[0].source_kind, SourceKind::Web);
        assert_eq!(result.citations[0].name.as_deref(), Some("BTC"));
        assert_eq!(result.sources_used, SourceUsage { local: 0, cloud: 0, web: 1 });
    }

    #[test]
    fn test_citations_ordered_by_index() {
        let result = validate("Notes [3], study [1], price [2] [1].", &bundle(), 200);
        let indices: Vec<usize> = result.citations.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(result.sources_used.total(), result.citations.len());
    }

    #[test]
    fn test_unknown_markers_stay_in_text() {
        let text = "Claim [1] and invented [7] and [0].";
        let result = validate(text, &bundle(), 200);

        assert_eq!(result.response, text);
        assert_eq!(result.citations.len(), 1);
        assert_eq!(orphaned_markers(text, &bundle()), vec![0, 7]);
    }

    #[test]
    fn test_empty_bundle_never_fails() {
        let result = validate("Nothing found [1].", &ContextBundle::new(), 200);
        assert!(result.citations.is_empty());
        assert_eq!(result.sources_used, SourceUsage::default());
    }

    #[test]
    fn test_revalidation_is_idempotent() {
        let bundle = bundle();
        let first = validate("Study [1], notes [3], ghost [9].", &bundle, 200);
        let second = validate(&first.response, &bundle, 200);
        assert_eq!(first, second);
    }

    #[test]
    fn test_usage_matches_citations_per_kind() {
        let result = validate("[1] [2] [3]", &bundle(), 200);
        for kind in SourceKind::ALL {
            let cited = result.citations.iter().filter(|c| c.source_kind == kind).count();
            assert_eq!(result.sources_used.get(kind), cited);
        }
    }

    #[test]
    fn test_snippet_truncation() {
        assert_eq!(snippet("short text", 100).as_deref(), Some("short text"));
        assert_eq!(snippet("   ", 100), None);

        let long = "This is a very long text that needs to be truncated at some point";
        let cut = snippet(long, 30).unwrap();
        assert_eq!(cut, "This is a very long text that...");

        // multi-byte characters are never split
        let cut = snippet("héllo wörld ünïcode", 9).unwrap();
        assert_eq!(cut, "héllo...");
    }
}
