//! Trait definitions for the retrieval domain.
//!
//! These traits are the seams to the external collaborators (content source,
//! embedding providers, vector store) and enable testing through mocks.

use async_trait::async_trait;

use super::types::{
    ChunkUpsert, ContentItem, ContentType, MetadataFilter, QueryLogEntry, RankQuery, RankedHit,
    SparseVector, StoredRecord,
};

/// Error type for retrieval operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Embedding generation failed: {0}")]
    EmbeddingError(String),

    #[error("Vector store error: {0}")]
    StoreError(String),

    #[error("Content source error: {0}")]
    SourceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// Dense (semantic) embedding provider.
///
/// Document-time and query-time embedding are distinct entry points; the
/// provider may apply different preprocessing to each.
#[async_trait]
pub trait DenseEmbedder: Send + Sync {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding dimensionality of this provider.
    fn dimensions(&self) -> usize;
}

/// Sparse (lexical) embedding provider.
#[async_trait]
pub trait SparseEmbedder: Send + Sync {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<SparseVector>>;

    async fn embed_query(&self, text: &str) -> Result<SparseVector>;
}

/// Remote publication backend, fully paginated internally.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn list_all(&self, content_type: ContentType) -> Result<Vec<ContentItem>>;

    async fn get_by_slug(
        &self,
        slug: &str,
        content_type: Option<ContentType>,
    ) -> Result<Option<ContentItem>>;
}

/// Vector store capability consumed by the core.
///
/// `get` is paginated by the store (callers loop over the page cap);
/// `rank_search` executes a fused ranking expression and returns rows in
/// descending fused-score order.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, chunks: &[ChunkUpsert]) -> Result<()>;

    async fn get(
        &self,
        filter: &MetadataFilter,
        limit: usize,
        offset: Option<usize>,
    ) -> Result<Vec<StoredRecord>>;

    async fn delete(&self, ids: &[String]) -> Result<()>;

    async fn rank_search(&self, query: &RankQuery, limit: usize) -> Result<Vec<RankedHit>>;
}

/// Write-once sink for issued queries. The embedding makes the logged
/// query text itself searchable later.
#[async_trait]
pub trait QueryLogSink: Send + Sync {
    async fn record(&self, entry: QueryLogEntry, embedding: Vec<f32>) -> Result<()>;
}
