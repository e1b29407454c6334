//! Concrete collaborators behind the source traits.

pub mod duckduckgo;
pub mod fallback;
pub mod google_drive;
pub mod page_index;
pub mod serpapi;
pub mod trigram;

pub use duckduckgo::DuckDuckGoSearch;
pub use fallback::FallbackWebSearch;
pub use google_drive::GoogleDriveDocs;
pub use page_index::{IndexStats, PageRecord, SqlitePageIndex};
pub use serpapi::SerpApiSearch;
pub use trigram::TrigramEmbedder;
