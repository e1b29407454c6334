//! SQLite-backed page index for extracted document pages.
//!
//! Pages are imported from JSONL produced by an external extraction step and
//! searched by cosine similarity over [`TrigramEmbedder`] vectors. The
//! orchestrator only ever opens the index read-only.

use super::trigram::{cosine_similarity, TrigramEmbedder};
use crate::sources::{LocalIndex, PageHit};
use agentrag_core::{AppError, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// One extracted page, as read from an import file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Source document name (e.g. the PDF file name)
    pub document: String,
    pub page: u32,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub documents: u32,
    pub pages: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub imported: u32,
    pub skipped: u32,
}

/// Initialize the SQLite index database.
pub fn init_index(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Index(format!("Failed to create index directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Index(format!("Failed to open SQLite index: {}", e)))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS pages (
            id TEXT PRIMARY KEY,
            document TEXT NOT NULL,
            page INTEGER NOT NULL,
            text TEXT NOT NULL,
            image_path TEXT,
            embedding BLOB NOT NULL,
            imported_at TEXT NOT NULL,
            UNIQUE (document, page)
        );

        CREATE INDEX IF NOT EXISTS idx_pages_document ON pages(document);
        "#,
    )
    .map_err(|e| AppError::Index(format!("Failed to create tables: {}", e)))?;

    tracing::debug!("Initialized page index at {:?}", db_path);
    Ok(conn)
}

/// Open an existing index without write access.
pub fn open_read_only(db_path: &Path) -> AppResult<Connection> {
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| AppError::Index(format!("Failed to open page index {:?}: {}", db_path, e)))
}

/// Insert or replace a page, embedding its text.
pub fn insert_page(
    conn: &Connection,
    embedder: &TrigramEmbedder,
    record: &PageRecord,
) -> AppResult<()> {
    let embedding = embedding_to_bytes(&embedder.embed(&record.text));

    conn.execute(
        "INSERT OR REPLACE INTO pages (id, document, page, text, image_path, embedding, imported_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            uuid::Uuid::new_v4().to_string(),
            record.document,
            record.page as i64,
            record.text,
            record.image_path,
            embedding,
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| AppError::Index(format!("Failed to insert page: {}", e)))?;

    Ok(())
}

/// Import pages from JSONL, one [`PageRecord`] per line.
///
/// Blank lines and pages without text are skipped; a malformed line is an error
/// naming its line number. The whole import runs in one transaction.
pub fn import_jsonl(
    conn: &mut Connection,
    embedder: &TrigramEmbedder,
    reader: impl BufRead,
) -> AppResult<ImportStats> {
    let tx = conn
        .transaction()
        .map_err(|e| AppError::Index(format!("Failed to start import: {}", e)))?;

    let mut stats = ImportStats::default();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: PageRecord = serde_json::from_str(&line).map_err(|e| {
            AppError::Index(format!("Invalid page record on line {}: {}", number + 1, e))
        })?;

        if record.text.trim().is_empty() {
            stats.skipped += 1;
            continue;
        }

        insert_page(&tx, embedder, &record)?;
        stats.imported += 1;
    }

    tx.commit()
        .map_err(|e| AppError::Index(format!("Failed to commit import: {}", e)))?;

    tracing::info!(
        imported = stats.imported,
        skipped = stats.skipped,
        "Imported pages"
    );
    Ok(stats)
}

/// Query the index for the top-k pages most similar to the query embedding.
///
/// Pages with no similarity at all are left out.
pub fn query_pages(
    conn: &Connection,
    query_embedding: &[f32],
    top_k: usize,
) -> AppResult<Vec<(PageHit, f32)>> {
    let mut stmt = conn
        .prepare("SELECT document, text, page, image_path, embedding FROM pages")
        .map_err(|e| AppError::Index(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            let embedding: Vec<u8> = row.get(4)?;
            Ok((
                PageHit {
                    document: row.get(0)?,
                    text: row.get(1)?,
                    page: row.get::<_, i64>(2)? as u32,
                    image_path: row.get(3)?,
                },
                embedding,
            ))
        })
        .map_err(|e| AppError::Index(format!("Failed to query pages: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        let (hit, bytes) =
            row.map_err(|e| AppError::Index(format!("Failed to read page: {}", e)))?;
        let score = cosine_similarity(query_embedding, &bytes_to_embedding(&bytes)?);
        if score > 0.0 {
            results.push((hit, score));
        }
    }

    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(top_k);

    tracing::debug!(
        "Retrieved {} pages (requested top-{})",
        results.len(),
        top_k
    );

    Ok(results)
}

/// Get document and page counts.
pub fn get_stats(conn: &Connection) -> AppResult<IndexStats> {
    let (documents, pages) = conn
        .query_row(
            "SELECT COUNT(DISTINCT document), COUNT(*) FROM pages",
            [],
            |row| Ok((row.get::<_, i64>(0)? as u32, row.get::<_, i64>(1)? as u32)),
        )
        .map_err(|e| AppError::Index(format!("Failed to count pages: {}", e)))?;

    Ok(IndexStats { documents, pages })
}

/// Delete every page.
pub fn reset_index(conn: &Connection) -> AppResult<()> {
    conn.execute("DELETE FROM pages", [])
        .map_err(|e| AppError::Index(format!("Failed to delete pages: {}", e)))?;

    tracing::info!("Reset page index");
    Ok(())
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Index("Invalid embedding bytes length".to_string()));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// [`LocalIndex`] over a page index file.
///
/// Every search opens its own read-only connection on the blocking pool, so
/// concurrent queries never contend on a shared handle.
#[derive(Debug, Clone)]
pub struct SqlitePageIndex {
    path: PathBuf,
    embedder: TrigramEmbedder,
}

impl SqlitePageIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            embedder: TrigramEmbedder::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[async_trait]
impl LocalIndex for SqlitePageIndex {
    fn name(&self) -> &str {
        "sqlite"
    }

    #[instrument(skip(self, query), fields(path = %self.path.display()))]
    async fn similarity_search(&self, query: &str, k: usize) -> AppResult<Vec<PageHit>> {
        if !self.path.exists() {
            tracing::debug!("Page index not found, no local results");
            return Ok(Vec::new());
        }

        let path = self.path.clone();
        let query_embedding = self.embedder.embed(query);

        tokio::task::spawn_blocking(move || -> AppResult<Vec<PageHit>> {
            let conn = open_read_only(&path)?;
            let hits = query_pages(&conn, &query_embedding, k)?;
            Ok(hits.into_iter().map(|(hit, _)| hit).collect())
        })
        .await
        .map_err(|e| AppError::Index(format!("Page search task failed: {}", e)))?
    }
}
