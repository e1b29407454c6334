//! Source selection policy.

use crate::classifier::{Classification, QueryScope};
use crate::types::SourceKind;
use serde::Serialize;
use std::fmt;

/// Local preview score at or above which a document question stays local.
pub const HIGH_LOCAL_RELEVANCE: f32 = 0.7;

/// Local preview score below which external sources take priority.
pub const LOW_LOCAL_RELEVANCE: f32 = 0.3;

/// Which row of the selection table fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    /// Strong local match on a document question
    DocumentFirst,
    /// Weak local match or an external question
    ExternalFirst,
    /// Document triggers present
    DocumentAndCloud,
    /// Everything else
    Balanced,
}

impl SelectionRule {
    /// Instruction appended to the generation prompt for this rule.
    pub fn priority_hint(&self) -> &'static str {
        match self {
            SelectionRule::DocumentFirst => {
                "Rely on the local document sources; they are highly relevant to this question."
            }
            SelectionRule::ExternalFirst => {
                "Prioritize the web and cloud sources; the local documents are unlikely to answer this question."
            }
            SelectionRule::DocumentAndCloud => {
                "Prioritize the local documents, then the cloud documents."
            }
            SelectionRule::Balanced => "Use all sources, weighing each by its relevance.",
        }
    }
}

impl fmt::Display for SelectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SelectionRule::DocumentFirst => "document_first",
            SelectionRule::ExternalFirst => "external_first",
            SelectionRule::DocumentAndCloud => "document_and_cloud",
            SelectionRule::Balanced => "balanced",
        })
    }
}

/// Which sources to query and in what priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSelection {
    pub use_local: bool,
    pub use_web: bool,
    pub use_cloud: bool,
    /// Local is queried only to supplement external sources
    pub local_supplemental: bool,
    /// Interleaving order for the context assembler; lists only selected sources
    pub priority: Vec<SourceKind>,
    pub rule: SelectionRule,
}

impl SourceSelection {
    pub fn uses(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Local => self.use_local,
            SourceKind::Web => self.use_web,
            SourceKind::Cloud => self.use_cloud,
        }
    }

    fn from_rule(rule: SelectionRule) -> Self {
        use SourceKind::{Cloud, Local, Web};

        let (use_web, use_cloud, local_supplemental, priority) = match rule {
            SelectionRule::DocumentFirst => (false, false, false, vec![Local]),
            SelectionRule::ExternalFirst => (true, true, true, vec![Web, Cloud, Local]),
            SelectionRule::DocumentAndCloud => (false, true, false, vec![Local, Cloud]),
            SelectionRule::Balanced => (true, true, false, vec![Local, Web, Cloud]),
        };

        Self {
            use_local: true,
            use_web,
            use_cloud,
            local_supplemental,
            priority,
            rule,
        }
    }
}

/// Decide which sources to query. The first matching rule wins.
pub fn select(local_preview_score: f32, classification: &Classification) -> SourceSelection {
    let rule = if local_preview_score >= HIGH_LOCAL_RELEVANCE
        && classification.scope == QueryScope::Document
    {
        SelectionRule::DocumentFirst
    } else if local_preview_score < LOW_LOCAL_RELEVANCE
        || classification.scope == QueryScope::External
    {
        SelectionRule::ExternalFirst
    } else if classification.has_document_triggers() {
        SelectionRule::DocumentAndCloud
    } else {
        SelectionRule::Balanced
    };

    let selection = SourceSelection::from_rule(rule);

    tracing::info!(
        rule = %selection.rule,
        local_preview_score,
        scope = %classification.scope,
        local = selection.use_local,
        web = selection.use_web,
        cloud = selection.use_cloud,
        "Selected sources"
    );

    selection
}
