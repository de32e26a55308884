//! Vector-store adapter over the Chroma Cloud client.
//!
//! Typed records cross into loose JSON here and nowhere else; metadata that
//! fails validation on the way back is dropped with a warning instead of
//! failing the read.

use async_trait::async_trait;
use chroma::{Collection, KnnQuery, Rank, Search, UpsertRequest};
use serde_json::{json, Value};
use tracing::warn;

use crate::domain::search::traits::{Result, SearchError, VectorStore};
use crate::domain::search::types::{
    ChunkMetadata, ChunkUpsert, MetadataFilter, QueryVector, RankChannel, RankQuery, RankedHit,
    SparseVector, StoredRecord,
};

/// Metadata key holding each chunk's sparse vector.
const SPARSE_VECTOR_KEY: &str = "sparse_vector";
/// The store's built-in dense embedding key.
const DENSE_EMBEDDING_KEY: &str = "#embedding";

#[derive(Clone)]
pub struct ChromaVectorStore {
    collection: Collection,
}

impl ChromaVectorStore {
    pub fn new(collection: Collection) -> Self {
        Self { collection }
    }
}

impl From<chroma::ChromaError> for SearchError {
    fn from(e: chroma::ChromaError) -> Self {
        SearchError::StoreError(e.to_string())
    }
}

/// Index schema for the chunk collection: cosine dense index, sparse index
/// on the sparse-vector key, inverted indexes on the filterable metadata.
pub fn chunk_collection_schema() -> Value {
    json!({
        "indexes": [
            { "type": "vector", "source_key": "#document", "space": "cosine" },
            { "type": "sparse_vector", "key": SPARSE_VECTOR_KEY },
            { "type": "string_inverted", "key": "post_id" },
            { "type": "string_inverted", "key": "post_slug" },
            { "type": "string_inverted", "key": "post_title" },
            { "type": "string_inverted", "key": "post_url" },
            { "type": "string_inverted", "key": "content_type" },
            { "type": "string_inverted", "key": "tags" },
            { "type": "string_inverted", "key": "authors" },
            { "type": "int_inverted", "key": "chunk_index" },
            { "type": "int_inverted", "key": "total_chunks" },
        ]
    })
}

fn to_wire_sparse(vector: &SparseVector) -> chroma::SparseVector {
    chroma::SparseVector {
        indices: vector.indices.clone(),
        values: vector.values.clone(),
    }
}

fn metadata_to_value(chunk: &ChunkUpsert) -> Result<Value> {
    let mut value = serde_json::to_value(&chunk.metadata)
        .map_err(|e| SearchError::StoreError(e.to_string()))?;
    value[SPARSE_VECTOR_KEY] = serde_json::to_value(to_wire_sparse(&chunk.sparse))
        .map_err(|e| SearchError::StoreError(e.to_string()))?;
    Ok(value)
}

/// Validate stored metadata back into the fixed record type.
fn parse_metadata(id: &str, value: Option<Value>) -> Option<ChunkMetadata> {
    let value = value?;
    match serde_json::from_value::<ChunkMetadata>(value) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            warn!(id, error = %e, "Stored chunk has malformed metadata; skipping");
            None
        }
    }
}

fn filter_to_where(filter: &MetadataFilter) -> Option<Value> {
    let mut clauses = Vec::new();
    if let Some(ref slug) = filter.slug {
        clauses.push(json!({ "post_slug": slug }));
    }
    if let Some(ref url) = filter.url {
        clauses.push(json!({ "post_url": url }));
    }
    if let Some(content_type) = filter.content_type {
        clauses.push(json!({ "content_type": content_type.as_str() }));
    }

    match clauses.len() {
        0 => None,
        1 => Some(clauses.into_iter().next().unwrap()),
        _ => Some(json!({ "$and": clauses })),
    }
}

fn channel_to_rank(channel: &RankChannel) -> Rank {
    let knn = match &channel.vector {
        QueryVector::Dense(vector) => Rank::knn(
            KnnQuery::Dense(vector.clone()),
            DENSE_EMBEDDING_KEY,
            channel.candidate_limit,
        ),
        QueryVector::Sparse(vector) => Rank::knn(
            KnnQuery::Sparse(to_wire_sparse(vector)),
            SPARSE_VECTOR_KEY,
            channel.candidate_limit,
        ),
    };

    // The store ranks ascending, so weighted RRF terms go in negated and
    // scores come back out negated.
    Rank::val(-channel.weight) / (Rank::val(channel.k) + knn)
}

#[async_trait]
impl VectorStore for ChromaVectorStore {
    async fn upsert(&self, chunks: &[ChunkUpsert]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut request = UpsertRequest::default();
        for chunk in chunks {
            request.ids.push(chunk.id.clone());
            request.embeddings.push(chunk.dense.clone());
            request.documents.push(chunk.document.clone());
            request.metadatas.push(metadata_to_value(chunk)?);
        }

        self.collection.upsert(&request).await?;
        Ok(())
    }

    async fn get(
        &self,
        filter: &MetadataFilter,
        limit: usize,
        offset: Option<usize>,
    ) -> Result<Vec<StoredRecord>> {
        let response = self
            .collection
            .get(filter_to_where(filter), limit, offset)
            .await?;

        let mut documents = response.documents.into_iter();
        let mut metadatas = response.metadatas.into_iter();

        let records = response
            .ids
            .into_iter()
            .map(|id| {
                let document = documents.next().flatten();
                let metadata = parse_metadata(&id, metadatas.next().flatten());
                StoredRecord {
                    id,
                    document,
                    metadata,
                }
            })
            .collect();

        Ok(records)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        self.collection.delete(ids).await?;
        Ok(())
    }

    async fn rank_search(&self, query: &RankQuery, limit: usize) -> Result<Vec<RankedHit>> {
        let mut expression: Option<Rank> = None;
        for channel in &query.channels {
            let term = channel_to_rank(channel);
            expression = Some(match expression {
                Some(existing) => existing + term,
                None => term,
            });
        }

        let Some(expression) = expression else {
            return Err(SearchError::ConfigError(
                "rank expression could not be constructed".to_string(),
            ));
        };

        let search = Search::new()
            .rank(expression)
            .limit(limit)
            .select(["#document", "#score", "#metadata"]);

        let response = self.collection.search(&search).await?;

        let ids = response.ids.into_iter().next().unwrap_or_default();
        let mut documents = response
            .documents
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter();
        let mut metadatas = response
            .metadatas
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter();
        let mut scores = response
            .scores
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter();

        let hits = ids
            .into_iter()
            .map(|id| {
                let document = documents.next().flatten();
                let metadata = parse_metadata(&id, metadatas.next().flatten());
                let score = scores.next().flatten().map(|s| -s).unwrap_or(0.0);
                RankedHit {
                    id,
                    document,
                    metadata,
                    score,
                }
            })
            .collect();

        Ok(hits)
    }
}
