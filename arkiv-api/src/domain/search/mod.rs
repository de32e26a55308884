//! Hybrid retrieval over an indexed publication.
//!
//! This module pairs an incremental indexing pipeline with hybrid
//! dense + sparse search:
//!
//! - **Chunking** splits normalized documents into word-budgeted units
//! - **Change detection** diffs the remote pull against the indexed
//!   snapshot by content hash and update timestamp
//! - **Weighted Reciprocal Rank Fusion (RRF)** merges the per-channel
//!   similarity rankings into one result set
//!
//! # Architecture
//!
//! The components are built around trait abstractions for testability:
//!
//! - [`traits::DenseEmbedder`] / [`traits::SparseEmbedder`] — embedding
//!   providers (Gemini, SPLADE, mocks)
//! - [`traits::VectorStore`] — chunk persistence and rank search (Chroma,
//!   in-memory)
//! - [`traits::ContentSource`] — the remote publication (Ghost, mocks)
//! - [`traits::QueryLogSink`] — best-effort query logging
//!
//! # Indexing
//!
//! [`ContentIndexer`] runs the pipeline; [`run_index_worker`] repeats it on
//! a fixed interval until shutdown:
//!
//! ```ignore
//! let indexer = ContentIndexer::new(source, dense, sparse, store, IndexerConfig::default());
//! let stats = indexer.reindex_all().await?;
//! ```
//!
//! # Search
//!
//! [`SearchService`] serves queries, listings and document fetches:
//!
//! ```ignore
//! let results = service.search("local-first software", Some(10), false).await?;
//! ```

pub mod assembler;
pub mod chunker;
pub mod diff;
pub mod embedder;
pub mod index_worker;
pub mod indexer;
pub mod query_log;
pub mod ranker;
pub mod service;
pub mod source;
pub mod store;
pub mod traits;
pub mod types;

pub use index_worker::run_index_worker;
pub use indexer::{ContentIndexer, IndexerConfig};
pub use query_log::QueryLogger;
pub use ranker::RankerConfig;
pub use service::{SearchConfig, SearchService};
pub use traits::SearchError;
pub use types::{ContentType, PostSummary, SearchResult, SortOrder, SyncStats};
