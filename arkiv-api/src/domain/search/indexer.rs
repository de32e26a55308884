//! Indexing pipeline: remote content → change detection → chunking →
//! vector-store upsert.

use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

use super::assembler::parse_datetime;
use super::chunker::{public_tag_names, Chunker};
use super::diff::IndexPlan;
use super::store::page_all;
use super::traits::{ContentSource, DenseEmbedder, Result, SparseEmbedder, VectorStore};
use super::types::{
    Chunk, ChunkMetadata, ChunkUpsert, ContentItem, ContentKey, ContentType, IndexSnapshot,
    MetadataFilter, PreparedItem, SnapshotEntry, SyncStats,
};

/// Configuration for the indexing pipeline.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Word budget per chunk.
    pub chunk_size: usize,
    /// Overlapping words between windows of an oversized paragraph.
    pub chunk_overlap: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Syncs the remote publication into the vector store.
///
/// Each document's migration is delete-then-insert, sequenced so stale
/// chunks never coexist with their replacements; items are otherwise
/// independent and a failed item never aborts the cycle.
pub struct ContentIndexer<C, D, S, V>
where
    C: ContentSource,
    D: DenseEmbedder,
    S: SparseEmbedder,
    V: VectorStore,
{
    source: C,
    dense_embedder: D,
    sparse_embedder: S,
    store: V,
    chunker: Chunker,
}

impl<C, D, S, V> ContentIndexer<C, D, S, V>
where
    C: ContentSource,
    D: DenseEmbedder,
    S: SparseEmbedder,
    V: VectorStore,
{
    pub fn new(source: C, dense_embedder: D, sparse_embedder: S, store: V, config: IndexerConfig) -> Self {
        Self {
            source,
            dense_embedder,
            sparse_embedder,
            store,
            chunker: Chunker::new(config.chunk_size, config.chunk_overlap),
        }
    }

    /// Run one full indexing cycle over posts and pages.
    ///
    /// Listing or snapshot failures abort the cycle (a partial remote pull
    /// would misclassify everything else as removed); per-item failures are
    /// logged and counted instead.
    pub async fn reindex_all(&self) -> Result<SyncStats> {
        info!("Starting content index sync");

        let mut items = self.source.list_all(ContentType::Post).await?;
        items.extend(self.source.list_all(ContentType::Page).await?);

        let snapshot = self.load_snapshot().await?;

        let prepared: Vec<PreparedItem> = items
            .into_iter()
            .map(|item| {
                let (chunks, content_hash) = self.chunker.chunk(&item);
                PreparedItem {
                    item,
                    chunks,
                    content_hash,
                }
            })
            .collect();

        let plan = IndexPlan::build(prepared, &snapshot);
        info!(
            new = plan.new.len(),
            updated = plan.updated.len(),
            removed = plan.removed.len(),
            unchanged = plan.unchanged.len(),
            "Index plan built"
        );

        let mut stats = SyncStats {
            unchanged: plan.unchanged.len(),
            ..Default::default()
        };

        for prepared in plan.new.iter().chain(plan.updated.iter()) {
            match self.apply_item(prepared).await {
                Ok(count) => {
                    info!(key = %prepared.item.key(), chunks = count, "Indexed document");
                    stats.indexed += 1;
                }
                Err(e) => {
                    warn!(key = %prepared.item.key(), error = %e, "Failed to index document");
                    stats.errors += 1;
                }
            }
        }

        for key in &plan.removed {
            match self.delete_by_key(key).await {
                Ok(count) => {
                    info!(key = %key, chunks = count, "Removed document from index");
                    stats.removed += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to remove document");
                    stats.errors += 1;
                }
            }
        }

        info!(
            indexed = stats.indexed,
            removed = stats.removed,
            unchanged = stats.unchanged,
            errors = stats.errors,
            "Content index sync completed"
        );

        Ok(stats)
    }

    /// Index one content item immediately (refresh path).
    ///
    /// Returns the number of chunks written; zero means the item had no
    /// indexable text and any previous chunks were removed.
    pub async fn index_item(&self, item: &ContentItem) -> Result<usize> {
        let (chunks, content_hash) = self.chunker.chunk(item);
        if chunks.is_empty() {
            let removed = self.delete_by_key(&item.key()).await?;
            if removed > 0 {
                info!(key = %item.key(), "De-indexed document with no content");
            }
            return Ok(0);
        }

        self.write_item(item, &chunks, content_hash.as_deref()).await
    }

    /// Re-fetch one document from the content source and reindex it.
    ///
    /// Returns `None` when the source does not know the slug.
    pub async fn refresh_from_source(
        &self,
        slug: &str,
        content_type: Option<ContentType>,
    ) -> Result<Option<usize>> {
        let Some(item) = self.source.get_by_slug(slug, content_type).await? else {
            return Ok(None);
        };
        let count = self.index_item(&item).await?;
        Ok(Some(count))
    }

    /// Remove every chunk of a document. Returns the number deleted.
    pub async fn delete_document(
        &self,
        slug: &str,
        content_type: Option<ContentType>,
    ) -> Result<usize> {
        let filter = MetadataFilter::by_slug(slug, content_type);
        let records = page_all(&self.store, &filter).await?;
        let ids: Vec<String> = records.into_iter().map(|record| record.id).collect();
        let count = ids.len();

        if !ids.is_empty() {
            self.store.delete(&ids).await?;
            info!(slug, count, "Deleted document chunks");
        }

        Ok(count)
    }

    /// Delete-then-insert for one prepared item.
    async fn apply_item(&self, prepared: &PreparedItem) -> Result<usize> {
        self.write_item(
            &prepared.item,
            &prepared.chunks,
            prepared.content_hash.as_deref(),
        )
        .await
    }

    async fn write_item(
        &self,
        item: &ContentItem,
        chunks: &[Chunk],
        content_hash: Option<&str>,
    ) -> Result<usize> {
        // Old chunks go first so the replacement never leaves a window with
        // both generations live (chunk counts may shrink).
        self.delete_by_key(&item.key()).await?;

        let embed_texts: Vec<&str> = chunks.iter().map(|chunk| chunk.embed_text.as_str()).collect();
        let dense = self.dense_embedder.embed_documents(&embed_texts).await?;
        let sparse = self.sparse_embedder.embed_documents(&embed_texts).await?;

        let tags = public_tag_names(&item.tags).join(",");
        let authors = item.authors.join(",");
        let published_at = item.published_at.and_then(|t| t.format(&Rfc3339).ok());
        let updated_at = item.updated_at.and_then(|t| t.format(&Rfc3339).ok());

        let upserts: Vec<ChunkUpsert> = chunks
            .iter()
            .zip(dense.into_iter().zip(sparse.into_iter()))
            .map(|(chunk, (dense, sparse))| ChunkUpsert {
                id: format!("{}_{}_{}", item.content_type, item.id, chunk.index),
                document: chunk.text.clone(),
                dense,
                sparse,
                metadata: ChunkMetadata {
                    post_id: item.id.clone(),
                    post_slug: item.slug.clone(),
                    post_title: item.title.clone(),
                    post_url: item.url.clone(),
                    chunk_index: chunk.index,
                    total_chunks: chunk.total,
                    content_type: item.content_type,
                    tags: tags.clone(),
                    authors: authors.clone(),
                    published_at: published_at.clone(),
                    updated_at: updated_at.clone(),
                    content_hash: content_hash.map(str::to_string),
                },
            })
            .collect();

        self.store.upsert(&upserts).await?;
        Ok(upserts.len())
    }

    async fn delete_by_key(&self, key: &ContentKey) -> Result<usize> {
        let filter = MetadataFilter::by_slug(key.slug.clone(), Some(key.content_type));
        let records = page_all(&self.store, &filter).await?;
        let ids: Vec<String> = records.into_iter().map(|record| record.id).collect();
        let count = ids.len();

        if !ids.is_empty() {
            self.store.delete(&ids).await?;
        }

        Ok(count)
    }

    /// Rebuild the per-document snapshot from stored chunk metadata. All
    /// chunks of one parent carry the same values, so the first seen wins.
    async fn load_snapshot(&self) -> Result<IndexSnapshot> {
        let records = page_all(&self.store, &MetadataFilter::all()).await?;

        let mut snapshot = IndexSnapshot::new();
        for record in records {
            let Some(metadata) = record.metadata else {
                continue;
            };
            if metadata.post_slug.is_empty() {
                continue;
            }

            snapshot.insert_first(
                metadata.key(),
                SnapshotEntry {
                    updated_at: parse_datetime(metadata.updated_at.as_deref()),
                    content_hash: metadata.content_hash.clone(),
                },
            );
        }

        Ok(snapshot)
    }
}
