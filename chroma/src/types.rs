use serde::{Deserialize, Serialize};

/// Sparse lexical vector: parallel index/value arrays, mostly-zero elsewhere.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Upsert payload for a collection.
///
/// `metadatas` entries are arbitrary JSON objects; the caller owns their
/// schema. All four arrays must be index-aligned.
#[derive(Debug, Default, Serialize)]
pub struct UpsertRequest {
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub documents: Vec<String>,
    pub metadatas: Vec<serde_json::Value>,
}

/// Response of a filtered `get`.
#[derive(Debug, Default, Deserialize)]
pub struct GetResponse {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub documents: Vec<Option<String>>,
    #[serde(default)]
    pub metadatas: Vec<Option<serde_json::Value>>,
}

/// Response of a rank-expression `search`.
///
/// The outer vectors hold one entry per search payload; this client always
/// submits exactly one payload.
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub documents: Vec<Vec<Option<String>>>,
    #[serde(default)]
    pub metadatas: Vec<Vec<Option<serde_json::Value>>>,
    #[serde(default)]
    pub scores: Vec<Vec<Option<f64>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_vector_roundtrips_through_json() {
        let vector = SparseVector {
            indices: vec![3, 17, 101],
            values: vec![0.5, 1.25, 0.125],
        };

        let json = serde_json::to_string(&vector).unwrap();
        let back: SparseVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vector);
    }

    #[test]
    fn get_response_tolerates_missing_fields() {
        let parsed: GetResponse = serde_json::from_str(r#"{"ids": ["a"]}"#).unwrap();
        assert_eq!(parsed.ids, vec!["a"]);
        assert!(parsed.documents.is_empty());
    }
}
