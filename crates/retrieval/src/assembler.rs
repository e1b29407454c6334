//! Context assembly: filter, deduplicate, interleave and number retrieved chunks.

use crate::scorer::{score, RelevanceThresholds};
use crate::types::{Chunk, ContextBundle, ScoredChunk, SourceKind};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

/// Score every chunk against the query and flag it against its source threshold.
pub fn score_chunks(
    query: &str,
    chunks: impl IntoIterator<Item = Chunk>,
    thresholds: &RelevanceThresholds,
) -> Vec<ScoredChunk> {
    chunks
        .into_iter()
        .map(|chunk| {
            let score = score(query, &chunk.scoring_text());
            let passes = thresholds.passes(chunk.kind(), score);
            tracing::debug!(
                kind = %chunk.kind(),
                locator = %chunk.locator.describe(),
                score,
                passes,
                "Scored chunk"
            );
            ScoredChunk {
                chunk,
                score,
                passes,
            }
        })
        .collect()
}

/// Build the context bundle for one query.
///
/// Chunks below their source's threshold are dropped, duplicates (same source
/// and locator) keep their best score, each source is sorted by descending
/// score and the sources are interleaved round-robin in `priority` order until
/// `budget` chunks are admitted. Sources missing from `priority` go last.
pub fn assemble(
    query: &str,
    chunks: impl IntoIterator<Item = Chunk>,
    priority: &[SourceKind],
    thresholds: &RelevanceThresholds,
    budget: usize,
) -> ContextBundle {
    let passing = score_chunks(query, chunks, thresholds)
        .into_iter()
        .filter(|scored| scored.passes);

    let mut per_source = group_by_source(dedup(passing));

    let mut order: Vec<SourceKind> = Vec::with_capacity(SourceKind::ALL.len());
    for kind in priority.iter().chain(SourceKind::ALL.iter()) {
        if !order.contains(kind) {
            order.push(*kind);
        }
    }

    let mut bundle = ContextBundle::new();
    'fill: while bundle.len() < budget {
        let mut admitted_any = false;

        for kind in &order {
            if bundle.len() >= budget {
                break 'fill;
            }
            if let Some(next) = per_source.get_mut(kind).and_then(VecDeque::pop_front) {
                let index = bundle.admit(next.chunk, next.score);
                tracing::debug!(index, %kind, score = next.score, "Admitted chunk");
                admitted_any = true;
            }
        }

        if !admitted_any {
            break;
        }
    }

    let counts = bundle.counts();
    tracing::info!(
        total = bundle.len(),
        local = counts.local,
        web = counts.web,
        cloud = counts.cloud,
        budget,
        "Assembled context"
    );

    bundle
}

/// Collapse chunks sharing a dedup key, keeping the higher-scoring one.
///
/// The survivor takes the position of the first occurrence.
fn dedup(chunks: impl IntoIterator<Item = ScoredChunk>) -> Vec<ScoredChunk> {
    let mut seen: HashMap<(SourceKind, String), usize> = HashMap::new();
    let mut unique: Vec<ScoredChunk> = Vec::new();

    for scored in chunks {
        let key = scored.chunk.dedup_key();
        match seen.get(&key) {
            Some(&position) => {
                if scored.score > unique[position].score {
                    unique[position] = scored;
                }
            }
            None => {
                seen.insert(key, unique.len());
                unique.push(scored);
            }
        }
    }

    unique
}

/// Split by source and sort each source by descending score.
///
/// The sort is stable, so ties keep retrieval order.
fn group_by_source(chunks: Vec<ScoredChunk>) -> HashMap<SourceKind, VecDeque<ScoredChunk>> {
    let mut grouped: HashMap<SourceKind, Vec<ScoredChunk>> = HashMap::new();
    for scored in chunks {
        grouped.entry(scored.chunk.kind()).or_default().push(scored);
    }

    grouped
        .into_iter()
        .map(|(kind, mut list)| {
            list.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
            (kind, VecDeque::from(list))
        })
        .collect()
}
