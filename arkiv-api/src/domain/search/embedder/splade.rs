//! Sparse lexical embedder running SPLADE++ locally via fastembed.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{SparseInitOptions, SparseTextEmbedding};

use crate::domain::search::traits::{Result, SearchError, SparseEmbedder};
use crate::domain::search::types::SparseVector;

/// Sparse embedder over a locally downloaded SPLADE++ ONNX model.
///
/// Inference is CPU-bound, so every call runs under `spawn_blocking`; the
/// model sits behind a mutex because fastembed sessions embed through
/// `&mut self`.
#[derive(Clone)]
pub struct SpladeEmbedder {
    model: Arc<Mutex<SparseTextEmbedding>>,
}

impl SpladeEmbedder {
    /// Load the default SPLADE++ model, downloading it on first use.
    pub fn new() -> Result<Self> {
        let model = SparseTextEmbedding::try_new(SparseInitOptions::default())
            .map_err(|e| SearchError::EmbeddingError(format!("failed to load sparse model: {}", e)))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }

    async fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<SparseVector>> {
        let model = Arc::clone(&self.model);

        let embeddings = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| SearchError::EmbeddingError("sparse model lock poisoned".into()))?;
            model
                .embed(texts, None)
                .map_err(|e| SearchError::EmbeddingError(e.to_string()))
        })
        .await
        .map_err(|e| SearchError::EmbeddingError(e.to_string()))??;

        Ok(embeddings
            .into_iter()
            .map(|embedding| SparseVector {
                indices: embedding.indices.into_iter().map(|i| i as u32).collect(),
                values: embedding.values,
            })
            .collect())
    }
}

#[async_trait]
impl SparseEmbedder for SpladeEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<SparseVector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        self.embed_blocking(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<SparseVector> {
        let mut vectors = self.embed_blocking(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| SearchError::EmbeddingError("empty sparse embedding response".into()))
    }
}
