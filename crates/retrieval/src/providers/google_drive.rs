//! Google Drive v3 document search.
//!
//! Uses a pre-issued OAuth access token; obtaining and refreshing tokens is
//! left to the caller.

use crate::sources::{CloudDocs, CloudDocument};
use agentrag_core::{AppError, AppResult};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::instrument;

const DEFAULT_DRIVE_URL: &str = "https://www.googleapis.com/drive/v3";

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Maximum characters of document content kept per file.
pub const MAX_CONTENT_CHARS: usize = 2000;

const GOOGLE_DOC: &str = "application/vnd.google-apps.document";
const GOOGLE_SHEET: &str = "application/vnd.google-apps.spreadsheet";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    web_view_link: String,
}

/// How a file's text is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fetch {
    Export(&'static str),
    Media,
}

impl DriveFile {
    fn fetch(&self) -> Option<Fetch> {
        match self.mime_type.as_str() {
            GOOGLE_DOC => Some(Fetch::Export("text/plain")),
            GOOGLE_SHEET => Some(Fetch::Export("text/csv")),
            m if m.starts_with("text/") || m == "application/json" => Some(Fetch::Media),
            _ => None,
        }
    }
}

/// Cloud documents from Google Drive.
pub struct GoogleDriveDocs {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl GoogleDriveDocs {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_DRIVE_URL, access_token)
    }

    pub fn with_base_url(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            client,
        }
    }

    async fn search_files(&self, query: &str, max_results: usize) -> AppResult<Vec<DriveFile>> {
        let url = format!("{}/files", self.base_url);
        let page_size = max_results.to_string();

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", drive_query(query).as_str()),
                ("pageSize", page_size.as_str()),
                ("fields", "files(id,name,mimeType,webViewLink)"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Other(format!("Failed to search Google Drive: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Other(format!(
                "Google Drive error ({}): {}",
                status, error_text
            )));
        }

        let list: FileList = response
            .json()
            .await
            .map_err(|e| AppError::Other(format!("Failed to parse Drive file list: {}", e)))?;

        Ok(list.files)
    }

    async fn file_content(&self, file: &DriveFile, fetch: Fetch) -> AppResult<String> {
        let request = match fetch {
            Fetch::Export(mime) => self
                .client
                .get(format!("{}/files/{}/export", self.base_url, file.id))
                .query(&[("mimeType", mime)]),
            Fetch::Media => self
                .client
                .get(format!("{}/files/{}", self.base_url, file.id))
                .query(&[("alt", "media")]),
        };

        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::Other(format!("Failed to fetch {}: {}", file.name, e)))?;

        if !response.status().is_success() {
            return Err(AppError::Other(format!(
                "Google Drive error fetching {} ({})",
                file.name,
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::Other(format!("Failed to read {}: {}", file.name, e)))
    }
}

#[async_trait]
impl CloudDocs for GoogleDriveDocs {
    fn name(&self) -> &str {
        "google_drive"
    }

    #[instrument(skip(self, query))]
    async fn search_and_retrieve(
        &self,
        query: &str,
        max_results: usize,
    ) -> AppResult<Vec<CloudDocument>> {
        let files = self.search_files(query, max_results).await?;
        tracing::debug!("Google Drive matched {} files", files.len());

        let files = files.into_iter().take(max_results).filter_map(|file| match file.fetch() {
            Some(fetch) => Some((file, fetch)),
            None => {
                tracing::debug!("Skipping {} ({}): no text export", file.name, file.mime_type);
                None
            }
        });

        Ok(fetch_documents(files, |file, fetch| async move {
            self.file_content(&file, fetch).await
        })
        .await)
    }
}

/// Fetch every file's content concurrently, keeping search order.
///
/// One unreadable file is skipped rather than sinking the whole search.
async fn fetch_documents<F, Fut>(
    files: impl IntoIterator<Item = (DriveFile, Fetch)>,
    fetch_content: F,
) -> Vec<CloudDocument>
where
    F: Fn(DriveFile, Fetch) -> Fut,
    Fut: Future<Output = AppResult<String>>,
{
    let fetches = files.into_iter().map(|(file, fetch)| {
        let name = file.name.clone();
        let url = file.web_view_link.clone();
        let content = fetch_content(file, fetch);
        async move { (name, url, content.await) }
    });

    join_all(fetches)
        .await
        .into_iter()
        .filter_map(|(name, url, content)| match content {
            Ok(content) => Some(CloudDocument {
                name,
                content: truncate_chars(&content, MAX_CONTENT_CHARS),
                url,
            }),
            Err(e) => {
                tracing::warn!("Skipping Drive file: {}", e);
                None
            }
        })
        .collect()
}

/// Drive search expression matching file names and full text.
fn drive_query(query: &str) -> String {
    let escaped = query.trim().replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "(name contains '{0}' or fullText contains '{0}') and trashed = false",
        escaped
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(mime: &str) -> DriveFile {
        DriveFile {
            id: "1".to_string(),
            name: "f".to_string(),
            mime_type: mime.to_string(),
            web_view_link: String::new(),
        }
    }

    #[test]
    fn test_query_escaping() {
        assert_eq!(
            drive_query("Bob's notes"),
            "(name contains 'Bob\\'s notes' or fullText contains 'Bob\\'s notes') and trashed = false"
        );
    }

    #[test]
    fn test_fetch_by_mime_type() {
        assert_eq!(file(GOOGLE_DOC).fetch(), Some(Fetch::Export("text/plain")));
        assert_eq!(file(GOOGLE_SHEET).fetch(), Some(Fetch::Export("text/csv")));
        assert_eq!(file("text/markdown").fetch(), Some(Fetch::Media));
        assert_eq!(file("application/json").fetch(), Some(Fetch::Media));
        assert_eq!(file("image/png").fetch(), None);
    }

    #[test]
    fn test_file_list_parsing() {
        let raw = r#"{"files": [{"id": "abc", "name": "Budget", "mimeType": "application/vnd.google-apps.spreadsheet", "webViewLink": "https://docs.google.com/spreadsheets/d/abc"}]}"#;
        let list: FileList = serde_json::from_str(raw).unwrap();
        assert_eq!(list.files.len(), 1);
        assert_eq!(list.files[0].web_view_link, "https://docs.google.com/spreadsheets/d/abc");
    }

    #[tokio::test]
    async fn test_file_contents_are_fetched_concurrently() {
        let files = ["slow", "broken", "fast"].map(|id| {
            let mut f = file("text/plain");
            f.id = id.to_string();
            f.name = format!("{}.txt", id);
            (f, Fetch::Media)
        });

        let started = std::time::Instant::now();
        let documents = fetch_documents(files, |file, _| async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            match file.id.as_str() {
                "broken" => Err(AppError::Other("403".to_string())),
                id => Ok(format!("{} content", id)),
            }
        })
        .await;

        // Three 200ms fetches run side by side, not back to back
        assert!(started.elapsed() < Duration::from_millis(500));
        let names: Vec<_> = documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["slow.txt", "fast.txt"]);
        assert_eq!(documents[0].content, "slow content");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
