//! Retrieval and answer type definitions.
//!
//! Evidence flows through these types in one direction per request:
//! [`Query`] → [`Chunk`] → [`ScoredChunk`] → [`ContextBundle`] → [`AnswerResult`].

use crate::classifier::QueryScope;
use crate::selector::SelectionRule;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Where a piece of evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Embedded local document index
    Local,
    /// Live web search
    Web,
    /// Cloud document store
    Cloud,
}

impl SourceKind {
    /// Every source kind, in canonical order.
    pub const ALL: [SourceKind; 3] = [SourceKind::Local, SourceKind::Web, SourceKind::Cloud];

    /// Get the canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::Web => "web",
            SourceKind::Cloud => "cloud",
        }
    }

    /// Label shown to the generator next to each numbered source.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            SourceKind::Local => "local document",
            SourceKind::Web => "web search",
            SourceKind::Cloud => "cloud document",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user question, created per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    from_transcription: bool,
}

impl Query {
    /// A typed question.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from_transcription: false,
        }
    }

    /// A question produced by speech transcription.
    pub fn transcribed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from_transcription: true,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_transcribed(&self) -> bool {
        self.from_transcription
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Query::new(text)
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Query::new(text)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Kind-specific position of a chunk within its source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Locator {
    /// Page of an indexed local document, with the page image when one was extracted
    Local {
        page: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_path: Option<String>,
    },
    /// Web search result
    Web { url: String },
    /// Cloud document; `synthetic` marks placeholder results
    Cloud {
        url: String,
        #[serde(default, skip_serializing_if = "is_false")]
        synthetic: bool,
    },
}

impl Locator {
    pub fn kind(&self) -> SourceKind {
        match self {
            Locator::Local { .. } => SourceKind::Local,
            Locator::Web { .. } => SourceKind::Web,
            Locator::Cloud { .. } => SourceKind::Cloud,
        }
    }

    /// Human-readable location (e.g. "page 3", a URL).
    pub fn describe(&self) -> String {
        match self {
            Locator::Local { page, .. } => format!("page {}", page),
            Locator::Web { url } if url.is_empty() => "web result".to_string(),
            Locator::Web { url } => url.clone(),
            Locator::Cloud { url, synthetic: true } => format!("{} (placeholder)", url),
            Locator::Cloud { url, .. } => url.clone(),
        }
    }
}

/// One retrieved unit of evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Evidence text (page text, search snippet, document content)
    pub text: String,

    /// Optional human-readable name (document name, web result title, cloud file name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Kind-specific locator
    pub locator: Locator,
}

impl Chunk {
    /// A page from the local index.
    pub fn local(text: impl Into<String>, page: u32, image_path: Option<String>) -> Self {
        Self {
            text: text.into(),
            name: None,
            locator: Locator::Local { page, image_path },
        }
    }

    /// Name the chunk after its document or result title.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = (!name.trim().is_empty()).then_some(name);
        self
    }

    /// A web search result.
    pub fn web(title: impl Into<String>, snippet: impl Into<String>, url: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            text: snippet.into(),
            name: (!title.trim().is_empty()).then_some(title),
            locator: Locator::Web { url: url.into() },
        }
    }

    /// A cloud document.
    pub fn cloud(name: impl Into<String>, content: impl Into<String>, url: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            text: content.into(),
            name: (!name.trim().is_empty()).then_some(name),
            locator: Locator::Cloud {
                url: url.into(),
                synthetic: false,
            },
        }
    }

    /// A clearly-marked synthetic cloud result, used when cloud docs are not configured.
    pub fn cloud_placeholder(name: impl Into<String>, content: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: content.into(),
            name: Some(name.into()),
            locator: Locator::Cloud {
                url: url.into(),
                synthetic: true,
            },
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.locator.kind()
    }

    /// Text the relevance scorer sees.
    ///
    /// Web titles and cloud file names are part of the evidence, local pages are not named.
    pub fn scoring_text(&self) -> Cow<'_, str> {
        match (&self.locator, &self.name) {
            (Locator::Local { .. }, _) | (_, None) => Cow::Borrowed(self.text.as_str()),
            (_, Some(name)) => Cow::Owned(format!("{} {}", name, self.text)),
        }
    }

    /// Key under which near-identical chunks collapse: same source and same locator.
    ///
    /// Local pages are keyed by document as well, since page numbers repeat
    /// across documents. Web results without a URL fall back to their text so
    /// distinct snippets survive.
    pub fn dedup_key(&self) -> (SourceKind, String) {
        let key = match &self.locator {
            Locator::Local { page, image_path } => format!(
                "{}|{}|{}",
                self.name.as_deref().unwrap_or(""),
                page,
                image_path.as_deref().unwrap_or("")
            ),
            Locator::Web { url } if url.is_empty() => format!("text:{}", self.text),
            Locator::Web { url } | Locator::Cloud { url, .. } => url.clone(),
        };
        (self.kind(), key)
    }
}

/// A chunk with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
    /// Whether the score meets the threshold for the chunk's source kind
    pub passes: bool,
}

/// A chunk admitted into the generation context under a citation index.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    /// 1-based citation index, assigned on admission
    pub index: usize,
    pub chunk: Chunk,
    pub score: f32,
}

/// Per-source chunk counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUsage {
    pub local: usize,
    pub cloud: usize,
    pub web: usize,
}

impl SourceUsage {
    pub fn get(&self, kind: SourceKind) -> usize {
        match kind {
            SourceKind::Local => self.local,
            SourceKind::Web => self.web,
            SourceKind::Cloud => self.cloud,
        }
    }

    pub fn increment(&mut self, kind: SourceKind) {
        self.add(kind, 1);
    }

    pub fn add(&mut self, kind: SourceKind, count: usize) {
        match kind {
            SourceKind::Local => self.local += count,
            SourceKind::Web => self.web += count,
            SourceKind::Cloud => self.cloud += count,
        }
    }

    pub fn total(&self) -> usize {
        self.local + self.cloud + self.web
    }
}

/// The ordered evidence handed to the generator.
///
/// Citation indices are dense, start at 1, follow admission order and never
/// change once assigned. Entries can only be appended through [`ContextBundle::admit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBundle {
    entries: Vec<ContextEntry>,
    counts: SourceUsage,
}

impl ContextBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return its citation index.
    pub fn admit(&mut self, chunk: Chunk, score: f32) -> usize {
        let index = self.entries.len() + 1;
        self.counts.increment(chunk.kind());
        self.entries.push(ContextEntry { index, chunk, score });
        index
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    /// Look up an entry by its citation index.
    pub fn get(&self, index: usize) -> Option<&ContextEntry> {
        index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many admitted chunks came from each source.
    pub fn counts(&self) -> SourceUsage {
        self.counts
    }
}

/// A context entry that the answer actually cites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub index: usize,
    pub source_kind: SourceKind,
    pub locator: Locator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub relevance: f32,
}

/// How a run selected and filtered its evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalDiagnostics {
    pub scope: QueryScope,
    pub local_preview_score: f32,
    pub selection_rule: SelectionRule,
    /// Local was queried only to supplement external sources
    pub local_supplemental: bool,
    /// Sources that were queried
    pub queried: Vec<SourceKind>,
    /// Queried sources that failed or timed out
    pub failed: Vec<SourceKind>,
    pub all_sources_failed: bool,
    /// Raw chunks returned per source
    pub candidates: SourceUsage,
    /// Chunks admitted into the context bundle per source
    pub accepted: SourceUsage,
    /// Citation markers in the answer with no matching context entry
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub orphaned_markers: Vec<usize>,
}

/// Final answer with validated citations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResult {
    pub response: String,
    pub citations: Vec<Citation>,
    pub sources_used: SourceUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<RetrievalDiagnostics>,
}
