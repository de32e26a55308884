//! In-memory vector store used by tests and local development.
//!
//! Evaluates the same weighted reciprocal-rank fusion the remote store runs
//! server-side: per channel, candidates are ranked by similarity and each
//! contributes `weight / (k + rank)`; absent candidates contribute nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::domain::search::traits::{Result, VectorStore};
use crate::domain::search::types::{
    ChunkUpsert, MetadataFilter, QueryVector, RankQuery, RankedHit, SparseVector, StoredRecord,
};

#[derive(Clone, Default)]
pub struct MemoryVectorStore {
    records: Arc<RwLock<BTreeMap<String, ChunkUpsert>>>,
    upserted_total: Arc<AtomicUsize>,
    deleted_total: Arc<AtomicUsize>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert records without touching the operation counters.
    pub async fn seed(&self, chunks: Vec<ChunkUpsert>) {
        let mut records = self.records.write().unwrap();
        for chunk in chunks {
            records.insert(chunk.id.clone(), chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.read().unwrap().contains_key(id)
    }

    /// Total chunks written through `upsert` since construction.
    pub fn upserted_total(&self) -> usize {
        self.upserted_total.load(Ordering::SeqCst)
    }

    /// Total ids removed through `delete` since construction.
    pub fn deleted_total(&self) -> usize {
        self.deleted_total.load(Ordering::SeqCst)
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.read().unwrap().keys().cloned().collect()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn sparse_dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let weights: HashMap<u32, f32> = a
        .indices
        .iter()
        .copied()
        .zip(a.values.iter().copied())
        .collect();

    b.indices
        .iter()
        .zip(b.values.iter())
        .filter_map(|(index, value)| weights.get(index).map(|w| f64::from(*w) * f64::from(*value)))
        .sum()
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, chunks: &[ChunkUpsert]) -> Result<()> {
        let mut records = self.records.write().unwrap();
        for chunk in chunks {
            records.insert(chunk.id.clone(), chunk.clone());
        }
        self.upserted_total.fetch_add(chunks.len(), Ordering::SeqCst);
        Ok(())
    }

    async fn get(
        &self,
        filter: &MetadataFilter,
        limit: usize,
        offset: Option<usize>,
    ) -> Result<Vec<StoredRecord>> {
        let records = self.records.read().unwrap();
        let matching = records
            .values()
            .filter(|record| filter.matches(&record.metadata))
            .skip(offset.unwrap_or(0))
            .take(limit)
            .map(|record| StoredRecord {
                id: record.id.clone(),
                document: Some(record.document.clone()),
                metadata: Some(record.metadata.clone()),
            })
            .collect();
        Ok(matching)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut records = self.records.write().unwrap();
        let mut removed = 0;
        for id in ids {
            if records.remove(id).is_some() {
                removed += 1;
            }
        }
        self.deleted_total.fetch_add(removed, Ordering::SeqCst);
        Ok(())
    }

    async fn rank_search(&self, query: &RankQuery, limit: usize) -> Result<Vec<RankedHit>> {
        let records = self.records.read().unwrap();
        let mut fused: HashMap<String, f64> = HashMap::new();

        for channel in &query.channels {
            let mut candidates: Vec<(String, f64)> = records
                .values()
                .filter_map(|record| {
                    let similarity = match &channel.vector {
                        QueryVector::Dense(query_vec) => {
                            cosine_similarity(query_vec, &record.dense)
                        }
                        QueryVector::Sparse(query_vec) => sparse_dot(query_vec, &record.sparse),
                    };
                    (similarity > 0.0).then(|| (record.id.clone(), similarity))
                })
                .collect();

            candidates.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            candidates.truncate(channel.candidate_limit);

            for (rank, (id, _)) in candidates.into_iter().enumerate() {
                let contribution = channel.weight / (channel.k + (rank + 1) as f64);
                *fused.entry(id).or_insert(0.0) += contribution;
            }
        }

        let mut ranked: Vec<(String, f64)> = fused.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(limit);

        let hits = ranked
            .into_iter()
            .filter_map(|(id, score)| {
                records.get(&id).map(|record| RankedHit {
                    id,
                    document: Some(record.document.clone()),
                    metadata: Some(record.metadata.clone()),
                    score,
                })
            })
            .collect();

        Ok(hits)
    }
}
