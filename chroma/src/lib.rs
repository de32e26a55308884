mod client;
mod expression;
mod types;

pub use client::{ChromaClient, ChromaError, Collection};
pub use expression::{KnnQuery, Rank, Search};
pub use types::{GetResponse, SearchResponse, SparseVector, UpsertRequest};
