use std::sync::Arc;

use crate::domain::search::embedder::{GeminiEmbedder, SpladeEmbedder};
use crate::domain::search::query_log::ChromaQueryLogSink;
use crate::domain::search::source::GhostContentSource;
use crate::domain::search::store::ChromaVectorStore;
use crate::domain::search::{ContentIndexer, SearchService};

/// Concrete service types wired at the process entry point.
pub type AppSearchService =
    SearchService<GeminiEmbedder, SpladeEmbedder, ChromaVectorStore, ChromaQueryLogSink>;
pub type AppIndexer =
    ContentIndexer<GhostContentSource, GeminiEmbedder, SpladeEmbedder, ChromaVectorStore>;

/// Shared handles injected into the request handlers.
///
/// Constructed once in `main` and cloned per request; the indexing loop
/// holds its own clone of the indexer, so the two sides communicate only
/// through the store and embedding clients.
#[derive(Clone)]
pub struct AppState {
    pub search_service: Arc<AppSearchService>,
    pub indexer: Arc<AppIndexer>,
    pub admin_token: Option<String>,
    pub max_posts_per_page: usize,
}
