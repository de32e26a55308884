//! Gemini dense embedder implementation using the genai crate.

use async_trait::async_trait;
use genai::embed::EmbedOptions;

use crate::domain::search::traits::{DenseEmbedder, Result, SearchError};

/// Gemini embedding model configuration.
pub const GEMINI_MODEL: &str = "gemini-embedding-001";
pub const GEMINI_DIMENSIONS: usize = 1536;

/// Dense embedder backed by Google's Gemini API via the `genai` crate.
///
/// The genai client reads `GEMINI_API_KEY` from the environment. Documents
/// and queries use distinct task types, so the two entry points must not be
/// collapsed into one.
#[derive(Clone)]
pub struct GeminiEmbedder {
    client: genai::Client,
    model: String,
    document_options: EmbedOptions,
    query_options: EmbedOptions,
}

impl GeminiEmbedder {
    pub fn new() -> Result<Self> {
        Self::with_model(GEMINI_MODEL)
    }

    pub fn with_model(model: impl Into<String>) -> Result<Self> {
        let client = genai::Client::default();
        let document_options = EmbedOptions::new().with_embedding_type("RETRIEVAL_DOCUMENT");
        let query_options = EmbedOptions::new().with_embedding_type("RETRIEVAL_QUERY");

        Ok(Self {
            client,
            model: model.into(),
            document_options,
            query_options,
        })
    }
}

#[async_trait]
impl DenseEmbedder for GeminiEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        // Empty strings are not sent to the API; they map to zero vectors.
        let mut results = vec![vec![0.0f32; GEMINI_DIMENSIONS]; texts.len()];
        let non_empty: Vec<(usize, String)> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_empty())
            .map(|(i, t)| (i, t.to_string()))
            .collect();

        if non_empty.is_empty() {
            return Ok(results);
        }

        let batch_texts: Vec<String> = non_empty.iter().map(|(_, t)| t.clone()).collect();

        let response = self
            .client
            .embed_batch(&self.model, batch_texts, Some(&self.document_options))
            .await
            .map_err(|e| SearchError::EmbeddingError(e.to_string()))?;

        for (batch_idx, (original_idx, _)) in non_empty.iter().enumerate() {
            if let Some(embedding) = response.embeddings.get(batch_idx) {
                results[*original_idx] = embedding.vector().to_vec();
            }
        }

        Ok(results)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Ok(vec![0.0; GEMINI_DIMENSIONS]);
        }

        let response = self
            .client
            .embed(&self.model, text, Some(&self.query_options))
            .await
            .map_err(|e| SearchError::EmbeddingError(e.to_string()))?;

        let embedding = response
            .first_embedding()
            .ok_or_else(|| SearchError::EmbeddingError("No embedding in response".into()))?;

        Ok(embedding.vector().to_vec())
    }

    fn dimensions(&self) -> usize {
        GEMINI_DIMENSIONS
    }
}
