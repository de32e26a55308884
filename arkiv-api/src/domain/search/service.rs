//! Read-side service: hybrid search, listings and document retrieval.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::assembler::{summary_from_metadata, SUMMARY_EXCERPT_CHARS};
use super::query_log::QueryLogger;
use super::ranker::{HybridRanker, RankerConfig};
use super::store::page_all;
use super::traits::{DenseEmbedder, QueryLogSink, Result, SparseEmbedder, VectorStore};
use super::types::{
    ChunkMetadata, ContentType, MetadataFilter, PostSummary, SearchResult, SortOrder, StoredRecord,
};

/// Limits for the read-side operations.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Result count when the caller does not ask for one.
    pub default_limit: usize,
    /// Hard cap on requested result counts.
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 50,
        }
    }
}

/// Query-serving facade over the vector store.
///
/// Shares the store and embedder handles with the indexing loop; both sides
/// are stateless request/response wrappers, so no locking is involved.
pub struct SearchService<D, S, V, Q>
where
    D: DenseEmbedder,
    S: SparseEmbedder,
    V: VectorStore + Clone,
    Q: QueryLogSink,
{
    ranker: HybridRanker<D, S, V>,
    store: V,
    query_logger: Arc<QueryLogger<D, Q>>,
    config: SearchConfig,
}

impl<D, S, V, Q> SearchService<D, S, V, Q>
where
    D: DenseEmbedder + 'static,
    S: SparseEmbedder,
    V: VectorStore + Clone,
    Q: QueryLogSink + 'static,
{
    pub fn new(
        dense_embedder: D,
        sparse_embedder: S,
        store: V,
        query_logger: Arc<QueryLogger<D, Q>>,
        ranker_config: RankerConfig,
        config: SearchConfig,
    ) -> Self {
        let ranker = HybridRanker::new(dense_embedder, sparse_embedder, store.clone(), ranker_config);
        Self {
            ranker,
            store,
            query_logger,
            config,
        }
    }

    /// Hybrid search; empty queries short-circuit to no results.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        distinct_by_url: bool,
    ) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }

        let limit = limit
            .unwrap_or(self.config.default_limit)
            .clamp(1, self.config.max_limit);

        let (results, top_match) = self.ranker.search(query, limit, distinct_by_url).await?;

        // Debug printout of the fused ranking; purely informational.
        debug!(query, count = results.len(), "Hybrid search results");
        for (position, result) in results.iter().enumerate() {
            debug!(
                rank = position + 1,
                title = %result.title,
                score = result.relevance_score,
                "search hit"
            );
        }

        Arc::clone(&self.query_logger).log(query.to_string(), top_match);

        Ok(results)
    }

    /// List indexed posts, newest or oldest first.
    pub async fn list_posts(
        &self,
        limit: usize,
        offset: usize,
        sort_by: SortOrder,
    ) -> Result<Vec<PostSummary>> {
        let records = page_all(
            &self.store,
            &MetadataFilter::by_content_type(ContentType::Post),
        )
        .await?;

        // One representative chunk per slug, preferring chunk zero.
        let mut per_slug: HashMap<String, &StoredRecord> = HashMap::new();
        for record in &records {
            let Some(metadata) = record.metadata.as_ref() else {
                continue;
            };
            let replace = per_slug
                .get(&metadata.post_slug)
                .map(|existing| existing.metadata.as_ref().unwrap().chunk_index > metadata.chunk_index)
                .unwrap_or(true);
            if replace {
                per_slug.insert(metadata.post_slug.clone(), record);
            }
        }

        let mut summaries: Vec<PostSummary> = per_slug
            .into_values()
            .map(|record| {
                summary_from_metadata(record.metadata.as_ref().unwrap(), record.document.as_deref())
            })
            .collect();

        match sort_by {
            SortOrder::Newest => summaries.sort_by(|a, b| b.published_at.cmp(&a.published_at)),
            SortOrder::Oldest => summaries.sort_by(|a, b| a.published_at.cmp(&b.published_at)),
        }

        Ok(summaries.into_iter().skip(offset).take(limit).collect())
    }

    /// Fetch one document as a summary plus its reassembled markdown.
    ///
    /// A canonical URL takes precedence over the slug when provided; both
    /// misses return `Ok(None)` rather than an error.
    pub async fn get_document(
        &self,
        slug: &str,
        content_type: Option<ContentType>,
        content_url: Option<&str>,
    ) -> Result<Option<(PostSummary, String)>> {
        let mut records = Vec::new();

        if let Some(url) = content_url {
            records = page_all(&self.store, &MetadataFilter::by_url(url, content_type)).await?;
        }
        if records.is_empty() {
            records = page_all(&self.store, &MetadataFilter::by_slug(slug, content_type)).await?;
        }

        let mut chunks: Vec<(u32, String, ChunkMetadata)> = records
            .into_iter()
            .filter_map(|record| {
                let metadata = record.metadata?;
                Some((metadata.chunk_index, record.document.unwrap_or_default(), metadata))
            })
            .collect();

        if chunks.is_empty() {
            return Ok(None);
        }

        chunks.sort_by_key(|(index, _, _)| *index);

        let markdown = chunks
            .iter()
            .map(|(_, text, _)| text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let primary = &chunks[0].2;
        let title = primary.post_title.trim();
        let excerpt_source = chunks
            .iter()
            .map(|(_, text, _)| text.trim())
            .find(|text| !text.is_empty() && *text != title)
            .unwrap_or(chunks[0].1.trim());

        let excerpt = excerpt_source
            .chars()
            .take(SUMMARY_EXCERPT_CHARS)
            .collect::<String>();
        let mut summary = summary_from_metadata(primary, None);
        summary.excerpt = (!excerpt.is_empty()).then_some(excerpt);

        Ok(Some((summary, markdown)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::search::embedder::{MockDenseEmbedder, MockSparseEmbedder};
    use crate::domain::search::query_log::MemoryQueryLogSink;
    use crate::domain::search::store::MemoryVectorStore;
    use crate::domain::search::types::{ChunkUpsert, SparseVector};

    fn chunk(
        slug: &str,
        content_type: ContentType,
        index: u32,
        total: u32,
        text: &str,
        published_at: Option<&str>,
        dense: Vec<f32>,
    ) -> ChunkUpsert {
        ChunkUpsert {
            id: format!("{}_{}_{}", content_type, slug, index),
            document: text.to_string(),
            dense,
            sparse: SparseVector::default(),
            metadata: ChunkMetadata {
                post_id: format!("id-{}", slug),
                post_slug: slug.to_string(),
                post_title: format!("Title {}", slug),
                post_url: format!("https://example.com/{}/", slug),
                chunk_index: index,
                total_chunks: total,
                content_type,
                tags: "essays,#internal".into(),
                authors: "Philip".into(),
                published_at: published_at.map(Into::into),
                updated_at: None,
                content_hash: Some("hash".into()),
            },
        }
    }

    async fn service_with(
        chunks: Vec<ChunkUpsert>,
    ) -> (
        SearchService<MockDenseEmbedder, MockSparseEmbedder, MemoryVectorStore, MemoryQueryLogSink>,
        MemoryQueryLogSink,
    ) {
        let store = MemoryVectorStore::new();
        store.seed(chunks).await;

        let sink = MemoryQueryLogSink::new();
        let logger = Arc::new(QueryLogger::new(MockDenseEmbedder::default(), sink.clone()));

        let service = SearchService::new(
            MockDenseEmbedder::returning(vec![1.0, 0.0]),
            MockSparseEmbedder::returning(SparseVector::default()),
            store,
            logger,
            RankerConfig::default(),
            SearchConfig::default(),
        );

        (service, sink)
    }

    fn post(slug: &str, published_at: &str, dense: Vec<f32>) -> ChunkUpsert {
        chunk(
            slug,
            ContentType::Post,
            0,
            1,
            &format!("Body of {}", slug),
            Some(published_at),
            dense,
        )
    }

    #[tokio::test]
    async fn empty_query_returns_empty() {
        let (service, _) = service_with(vec![]).await;

        assert!(service.search("", None, false).await.unwrap().is_empty());
        assert!(service.search("   ", None, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_returns_ranked_results_and_logs_the_query() {
        let (service, sink) = service_with(vec![
            post("first", "2024-01-01T00:00:00Z", vec![1.0, 0.0]),
            post("second", "2024-01-02T00:00:00Z", vec![0.5, 0.5]),
        ])
        .await;

        let results = service.search("anything", None, false).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].slug, "first");

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].query, "anything");
        assert_eq!(
            entries[0].top_match_url.as_deref(),
            Some("https://example.com/first/")
        );
    }

    #[tokio::test]
    async fn search_clamps_limit() {
        let (service, _) = service_with(vec![
            post("a", "2024-01-01T00:00:00Z", vec![1.0, 0.0]),
            post("b", "2024-01-02T00:00:00Z", vec![0.9, 0.1]),
            post("c", "2024-01-03T00:00:00Z", vec![0.8, 0.2]),
        ])
        .await;

        let results = service.search("q", Some(2), false).await.unwrap();
        assert_eq!(results.len(), 2);

        // Zero is bumped to one rather than rejected.
        let results = service.search("q", Some(0), false).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn search_results_never_leak_internal_tags() {
        let (service, _) = service_with(vec![post("a", "2024-01-01T00:00:00Z", vec![1.0, 0.0])]).await;

        let results = service.search("q", None, false).await.unwrap();
        assert_eq!(results[0].tags, vec!["essays".to_string()]);
    }

    #[tokio::test]
    async fn list_posts_sorts_and_paginates() {
        let (service, _) = service_with(vec![
            post("oldest", "2023-01-01T00:00:00Z", vec![0.0; 2]),
            post("middle", "2023-06-01T00:00:00Z", vec![0.0; 2]),
            post("newest", "2024-01-01T00:00:00Z", vec![0.0; 2]),
        ])
        .await;

        let newest_first = service.list_posts(10, 0, SortOrder::Newest).await.unwrap();
        let slugs: Vec<&str> = newest_first.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["newest", "middle", "oldest"]);

        let oldest_first = service.list_posts(10, 0, SortOrder::Oldest).await.unwrap();
        assert_eq!(oldest_first[0].slug, "oldest");

        let second_page = service.list_posts(1, 1, SortOrder::Newest).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].slug, "middle");
    }

    #[tokio::test]
    async fn list_posts_collapses_chunks_and_excludes_pages() {
        let (service, _) = service_with(vec![
            chunk("multi", ContentType::Post, 0, 2, "First chunk", Some("2024-01-01T00:00:00Z"), vec![0.0; 2]),
            chunk("multi", ContentType::Post, 1, 2, "Second chunk", Some("2024-01-01T00:00:00Z"), vec![0.0; 2]),
            chunk("about", ContentType::Page, 0, 1, "Page body", None, vec![0.0; 2]),
        ])
        .await;

        let posts = service.list_posts(10, 0, SortOrder::Newest).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].slug, "multi");
        assert_eq!(posts[0].excerpt.as_deref(), Some("First chunk"));
    }

    #[tokio::test]
    async fn get_document_joins_chunks_in_order() {
        let (service, _) = service_with(vec![
            chunk("essay", ContentType::Post, 1, 2, "Second part.", None, vec![0.0; 2]),
            chunk("essay", ContentType::Post, 0, 2, "First part.", None, vec![0.0; 2]),
        ])
        .await;

        let (summary, markdown) = service
            .get_document("essay", None, None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(markdown, "First part.\n\nSecond part.");
        assert_eq!(summary.slug, "essay");
        assert_eq!(summary.excerpt.as_deref(), Some("First part."));
        assert_eq!(summary.tags, vec!["essays".to_string()]);
    }

    #[tokio::test]
    async fn get_document_prefers_canonical_url() {
        let (service, _) = service_with(vec![
            post("by-url", "2024-01-01T00:00:00Z", vec![0.0; 2]),
        ])
        .await;

        let found = service
            .get_document("wrong-slug", None, Some("https://example.com/by-url/"))
            .await
            .unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().0.slug, "by-url");
    }

    #[tokio::test]
    async fn get_document_distinguishes_content_types() {
        let (service, _) = service_with(vec![chunk(
            "about",
            ContentType::Page,
            0,
            1,
            "Page body",
            None,
            vec![0.0; 2],
        )])
        .await;

        assert!(service
            .get_document("about", Some(ContentType::Post), None)
            .await
            .unwrap()
            .is_none());
        assert!(service
            .get_document("about", Some(ContentType::Page), None)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn get_document_miss_returns_none() {
        let (service, _) = service_with(vec![]).await;
        assert!(service.get_document("ghost", None, None).await.unwrap().is_none());
    }
}
