//! Mock embedder implementations for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::search::traits::{DenseEmbedder, Result, SearchError, SparseEmbedder};
use crate::domain::search::types::SparseVector;

/// Mock dense embedder returning a fixed vector, or failing on demand.
#[derive(Clone)]
pub struct MockDenseEmbedder {
    response: Option<Vec<f32>>,
    call_count: Arc<AtomicUsize>,
}

impl MockDenseEmbedder {
    /// Always return the same vector.
    pub fn returning(vector: Vec<f32>) -> Self {
        Self {
            response: Some(vector),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every call, for exercising degraded search paths.
    pub fn failing() -> Self {
        Self {
            response: None,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of embedding calls made (batch items count individually).
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<Vec<f32>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .ok_or_else(|| SearchError::EmbeddingError("mock dense embedder failure".into()))
    }
}

impl Default for MockDenseEmbedder {
    fn default() -> Self {
        Self::returning(vec![0.0; 4])
    }
}

#[async_trait]
impl DenseEmbedder for MockDenseEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|_| self.next()).collect()
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        self.next()
    }

    fn dimensions(&self) -> usize {
        self.response.as_ref().map(Vec::len).unwrap_or(0)
    }
}

/// Mock sparse embedder returning a fixed vector, or failing on demand.
#[derive(Clone)]
pub struct MockSparseEmbedder {
    response: Option<SparseVector>,
    call_count: Arc<AtomicUsize>,
}

impl MockSparseEmbedder {
    pub fn returning(vector: SparseVector) -> Self {
        Self {
            response: Some(vector),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<SparseVector> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .ok_or_else(|| SearchError::EmbeddingError("mock sparse embedder failure".into()))
    }
}

impl Default for MockSparseEmbedder {
    fn default() -> Self {
        Self::returning(SparseVector {
            indices: vec![0],
            values: vec![1.0],
        })
    }
}

#[async_trait]
impl SparseEmbedder for MockSparseEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<SparseVector>> {
        texts.iter().map(|_| self.next()).collect()
    }

    async fn embed_query(&self, _text: &str) -> Result<SparseVector> {
        self.next()
    }
}
