//! Hybrid ranking: weighted reciprocal-rank fusion of the dense and sparse
//! retrieval channels.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::assembler::search_result_from_hit;
use super::traits::{DenseEmbedder, Result, SearchError, SparseEmbedder, VectorStore};
use super::types::{QueryVector, RankChannel, RankQuery, SearchResult, TopMatch};

/// Fusion parameters.
#[derive(Debug, Clone)]
pub struct RankerConfig {
    pub dense_weight: f64,
    pub sparse_weight: f64,
    pub rrf_k: f64,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            dense_weight: 0.5,
            sparse_weight: 0.5,
            rrf_k: 42.0,
        }
    }
}

/// Executes hybrid searches against the vector store.
///
/// Each usable channel contributes `weight / (k + rank)` per candidate; the
/// store sums contributions and returns rows by descending fused score.
pub struct HybridRanker<D, S, V>
where
    D: DenseEmbedder,
    S: SparseEmbedder,
    V: VectorStore,
{
    dense_embedder: D,
    sparse_embedder: S,
    store: V,
    config: RankerConfig,
}

impl<D, S, V> HybridRanker<D, S, V>
where
    D: DenseEmbedder,
    S: SparseEmbedder,
    V: VectorStore,
{
    pub fn new(dense_embedder: D, sparse_embedder: S, store: V, config: RankerConfig) -> Self {
        Self {
            dense_embedder,
            sparse_embedder,
            store,
            config,
        }
    }

    /// Run a fused search.
    ///
    /// Either embedding channel may fail without aborting the search; its
    /// effective weight drops to zero. Only when no channel remains usable
    /// does the search fail, as a configuration/availability error.
    ///
    /// With `distinct_by_url`, hits sharing a canonical URL collapse to the
    /// minimum-rank (best-scoring) representative before truncation.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        distinct_by_url: bool,
    ) -> Result<(Vec<SearchResult>, Option<TopMatch>)> {
        let dense = match self.dense_embedder.embed_query(query).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(error = %e, "Dense query embedding failed; falling back to sparse-only");
                None
            }
        };
        let sparse = match self.sparse_embedder.embed_query(query).await {
            Ok(vector) if !vector.is_empty() => Some(vector),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Sparse query embedding failed");
                None
            }
        };

        let dense_weight = if dense.is_some() {
            self.config.dense_weight
        } else {
            0.0
        };
        let sparse_weight = if sparse.is_some() {
            self.config.sparse_weight
        } else {
            0.0
        };

        if dense_weight == 0.0 && sparse_weight == 0.0 {
            return Err(SearchError::ConfigError(
                "no embedding channel available for search".to_string(),
            ));
        }

        // Per-channel candidate pools are sized well past the final limit so
        // fusion has enough rows to work with.
        let candidate_limit = (limit * 5).max(limit).max(128);
        let mut channels = Vec::new();

        if let (Some(vector), true) = (dense, dense_weight > 0.0) {
            channels.push(RankChannel {
                vector: QueryVector::Dense(vector),
                weight: dense_weight,
                k: self.config.rrf_k,
                candidate_limit,
            });
        }
        if let (Some(vector), true) = (sparse, sparse_weight > 0.0) {
            channels.push(RankChannel {
                vector: QueryVector::Sparse(vector),
                weight: sparse_weight,
                k: self.config.rrf_k,
                candidate_limit,
            });
        }

        let rank_query = RankQuery { channels };
        let overall_limit = (limit * 3).max(limit);
        let hits = self.store.rank_search(&rank_query, overall_limit).await?;

        let top_match = hits.first().map(|hit| TopMatch {
            chunk_id: Some(hit.id.clone()),
            post_id: hit.metadata.as_ref().map(|m| m.post_id.clone()),
            post_slug: hit.metadata.as_ref().map(|m| m.post_slug.clone()),
            post_url: hit.metadata.as_ref().map(|m| m.post_url.clone()),
        });

        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut results = Vec::new();

        for hit in &hits {
            let Some(result) = search_result_from_hit(hit) else {
                debug!(id = %hit.id, "Skipping hit without usable metadata");
                continue;
            };

            if distinct_by_url && !result.url.is_empty() {
                // Hits arrive in rank order, so first-seen is minimum-rank.
                if !seen_urls.insert(result.url.clone()) {
                    continue;
                }
            }

            results.push(result);
            if results.len() >= limit {
                break;
            }
        }

        Ok((results, top_match))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::search::embedder::{MockDenseEmbedder, MockSparseEmbedder};
    use crate::domain::search::store::MemoryVectorStore;
    use crate::domain::search::types::{ChunkMetadata, ChunkUpsert, ContentType, SparseVector};

    fn chunk(id: &str, slug: &str, url: &str, dense: Vec<f32>, sparse: SparseVector) -> ChunkUpsert {
        ChunkUpsert {
            id: id.to_string(),
            document: format!("Body of {}", slug),
            dense,
            sparse,
            metadata: ChunkMetadata {
                post_id: slug.to_string(),
                post_slug: slug.to_string(),
                post_title: slug.to_string(),
                post_url: url.to_string(),
                chunk_index: 0,
                total_chunks: 1,
                content_type: ContentType::Post,
                tags: String::new(),
                authors: String::new(),
                published_at: None,
                updated_at: None,
                content_hash: None,
            },
        }
    }

    fn sparse(pairs: &[(u32, f32)]) -> SparseVector {
        SparseVector {
            indices: pairs.iter().map(|(i, _)| *i).collect(),
            values: pairs.iter().map(|(_, v)| *v).collect(),
        }
    }

    async fn seeded_store() -> MemoryVectorStore {
        let store = MemoryVectorStore::new();
        store
            .seed(vec![
                // Dense ranks: a=1, b=2; c has no dense signal.
                // Sparse ranks: b=1, c=2; a has no sparse signal.
                chunk("a_0", "a", "https://x/a/", vec![1.0, 0.0], sparse(&[])),
                chunk("b_0", "b", "https://x/b/", vec![0.6, 0.8], sparse(&[(0, 2.0)])),
                chunk("c_0", "c", "https://x/c/", vec![0.0, 0.0], sparse(&[(0, 1.0)])),
            ])
            .await;
        store
    }

    fn ranker(
        dense: MockDenseEmbedder,
        sparse_embedder: MockSparseEmbedder,
        store: MemoryVectorStore,
    ) -> HybridRanker<MockDenseEmbedder, MockSparseEmbedder, MemoryVectorStore> {
        HybridRanker::new(dense, sparse_embedder, store, RankerConfig::default())
    }

    #[tokio::test]
    async fn fuses_channels_with_weighted_reciprocal_ranks() {
        let store = seeded_store().await;
        let ranker = ranker(
            MockDenseEmbedder::returning(vec![1.0, 0.0]),
            MockSparseEmbedder::returning(sparse(&[(0, 1.0)])),
            store,
        );

        let (results, top) = ranker.search("query", 10, false).await.unwrap();

        let slugs: Vec<&str> = results.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["b", "a", "c"]);

        // b: 0.5/(42+1) + 0.5/(42+2); a: 0.5/(42+1); c: 0.5/(42+2)
        assert!((results[0].relevance_score - 0.022_99).abs() < 1e-4);
        assert!((results[1].relevance_score - 0.011_63).abs() < 1e-4);
        assert!((results[2].relevance_score - 0.011_36).abs() < 1e-4);

        assert_eq!(top.unwrap().post_slug.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn dense_failure_degrades_to_sparse_only() {
        let store = seeded_store().await;
        let ranker = ranker(
            MockDenseEmbedder::failing(),
            MockSparseEmbedder::returning(sparse(&[(0, 1.0)])),
            store,
        );

        let (results, _) = ranker.search("query", 10, false).await.unwrap();

        let slugs: Vec<&str> = results.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn no_usable_channel_is_a_config_error() {
        let store = seeded_store().await;
        let ranker = ranker(
            MockDenseEmbedder::failing(),
            MockSparseEmbedder::failing(),
            store,
        );

        let result = ranker.search("query", 10, false).await;
        assert!(matches!(result, Err(SearchError::ConfigError(_))));
    }

    #[tokio::test]
    async fn distinct_by_url_keeps_minimum_rank_representative() {
        let store = MemoryVectorStore::new();
        store
            .seed(vec![
                chunk("x_0", "x", "https://x/y", vec![1.0, 0.0], sparse(&[])),
                chunk("x_1", "x", "https://x/y", vec![0.9, 0.1], sparse(&[])),
                chunk("z_0", "z", "https://x/z", vec![0.5, 0.5], sparse(&[])),
            ])
            .await;

        let ranker = ranker(
            MockDenseEmbedder::returning(vec![1.0, 0.0]),
            MockSparseEmbedder::returning(sparse(&[])),
            store,
        );

        let (results, _) = ranker.search("query", 10, true).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://x/y");
        assert_eq!(results[1].url, "https://x/z");
        // The rank-1 chunk of the duplicated URL wins.
        assert!(results[0].relevance_score >= results[1].relevance_score);
    }

    #[tokio::test]
    async fn truncates_after_dedup() {
        let store = seeded_store().await;
        let ranker = ranker(
            MockDenseEmbedder::returning(vec![1.0, 0.0]),
            MockSparseEmbedder::returning(sparse(&[(0, 1.0)])),
            store,
        );

        let (results, _) = ranker.search("query", 2, false).await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
