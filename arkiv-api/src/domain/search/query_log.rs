//! Best-effort, fire-and-forget recording of issued queries.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chroma::{Collection, UpsertRequest};
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::error;
use uuid::Uuid;

use super::traits::{DenseEmbedder, QueryLogSink, Result, SearchError};
use super::types::{QueryLogEntry, TopMatch};

/// Records queries and their top match for later analysis.
///
/// Logging never delays or fails the search that triggered it: `log` spawns
/// a detached task and every failure inside it is caught and reported.
pub struct QueryLogger<D, Q>
where
    D: DenseEmbedder,
    Q: QueryLogSink,
{
    embedder: D,
    sink: Q,
}

impl<D, Q> QueryLogger<D, Q>
where
    D: DenseEmbedder + 'static,
    Q: QueryLogSink + 'static,
{
    pub fn new(embedder: D, sink: Q) -> Self {
        Self { embedder, sink }
    }

    /// Fire-and-forget: spawn the write and return immediately.
    pub fn log(self: Arc<Self>, query: String, top_match: Option<TopMatch>) {
        if query.is_empty() {
            return;
        }

        tokio::spawn(async move {
            if let Err(e) = self.record_now(&query, top_match).await {
                error!(error = %e, query = %truncate(&query, 50), "Failed to log query");
            }
        });
    }

    /// Write one log entry. Exposed for tests; production code goes through
    /// [`QueryLogger::log`].
    pub async fn record_now(&self, query: &str, top_match: Option<TopMatch>) -> Result<()> {
        let embedding = self.embedder.embed_query(query).await?;
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();

        // Query text repeats across entries, so the key is a fresh id plus
        // the issue timestamp.
        let id = format!("query_{}_{}", timestamp, Uuid::new_v4().simple());

        let top_match = top_match.unwrap_or_default();
        let entry = QueryLogEntry {
            id,
            query: query.to_string(),
            timestamp,
            top_match_id: top_match.post_id.or(top_match.chunk_id),
            top_match_url: top_match.post_url,
        };

        self.sink.record(entry, embedding).await
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Index schema for the query-log collection.
pub fn query_collection_schema() -> Value {
    json!({
        "indexes": [
            { "type": "vector", "source_key": "#document", "space": "cosine" },
            { "type": "string_inverted", "key": "top_match_id" },
            { "type": "string_inverted", "key": "top_match_url" },
            { "type": "int_inverted", "key": "query_ts" },
        ]
    })
}

/// Sink that appends entries to the query-log collection.
#[derive(Clone)]
pub struct ChromaQueryLogSink {
    collection: Collection,
}

impl ChromaQueryLogSink {
    pub fn new(collection: Collection) -> Self {
        Self { collection }
    }
}

#[async_trait]
impl QueryLogSink for ChromaQueryLogSink {
    async fn record(&self, entry: QueryLogEntry, embedding: Vec<f32>) -> Result<()> {
        let mut metadata = json!({ "query_ts": entry.timestamp });
        // Absent references are omitted, not stored as empty strings.
        if let Some(ref top_match_id) = entry.top_match_id {
            metadata["top_match_id"] = json!(top_match_id);
        }
        if let Some(ref top_match_url) = entry.top_match_url {
            metadata["top_match_url"] = json!(top_match_url);
        }

        let request = UpsertRequest {
            ids: vec![entry.id],
            embeddings: vec![embedding],
            documents: vec![entry.query],
            metadatas: vec![metadata],
        };

        self.collection
            .upsert(&request)
            .await
            .map_err(|e| SearchError::StoreError(e.to_string()))
    }
}

/// In-memory sink for tests.
#[derive(Clone, Default)]
pub struct MemoryQueryLogSink {
    entries: Arc<RwLock<Vec<QueryLogEntry>>>,
    fail: bool,
}

impl MemoryQueryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            entries: Arc::default(),
            fail: true,
        }
    }

    pub fn entries(&self) -> Vec<QueryLogEntry> {
        self.entries.read().unwrap().clone()
    }
}

#[async_trait]
impl QueryLogSink for MemoryQueryLogSink {
    async fn record(&self, entry: QueryLogEntry, _embedding: Vec<f32>) -> Result<()> {
        if self.fail {
            return Err(SearchError::StoreError("mock sink failure".into()));
        }
        self.entries.write().unwrap().push(entry);
        Ok(())
    }
}
