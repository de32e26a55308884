//! Core types for the retrieval domain.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Kind of indexed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Post,
    Page,
}

impl ContentType {
    /// Normalize a stored string. Only a case-insensitive `page` maps to
    /// [`ContentType::Page`]; anything else is a post.
    pub fn normalize(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("page") {
            ContentType::Page
        } else {
            ContentType::Post
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Page => "page",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one indexed document: slugs are only unique per content type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub slug: String,
    pub content_type: ContentType,
}

impl ContentKey {
    pub fn new(slug: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            slug: slug.into(),
            content_type,
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.slug, self.content_type)
    }
}

/// A tag on a remote content item, with its source visibility marker.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentTag {
    pub name: String,
    pub visibility: Option<String>,
}

impl ContentTag {
    pub fn new(name: impl Into<String>, visibility: Option<String>) -> Self {
        Self {
            name: name.into(),
            visibility,
        }
    }

    /// A tag is public when it is explicitly `public`, or carries no marker
    /// and is not `#`-prefixed (the convention for internal tags).
    pub fn is_public(&self) -> bool {
        match self.visibility.as_deref() {
            Some(visibility) => visibility.eq_ignore_ascii_case("public"),
            None => !self.name.starts_with('#'),
        }
    }
}

/// A content item pulled from the remote publication. Read-only input.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub html: Option<String>,
    pub plaintext: Option<String>,
    pub url: String,
    pub published_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
    pub tags: Vec<ContentTag>,
    pub authors: Vec<String>,
    pub content_type: ContentType,
}

impl ContentItem {
    pub fn key(&self) -> ContentKey {
        ContentKey::new(self.slug.clone(), self.content_type)
    }
}

/// One retrieval unit of a parent document.
///
/// `text` is what gets stored and reassembled into markdown; `embed_text`
/// prefixes the parent title (and publish date when known) so a single chunk
/// carries document identity through the embedding space.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub embed_text: String,
    pub index: u32,
    pub total: u32,
}

/// Fixed metadata record attached to every stored chunk.
///
/// This is the wire schema of the vector store's metadata payload; unknown
/// stored keys are ignored on the way back in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub post_id: String,
    pub post_slug: String,
    pub post_title: String,
    pub post_url: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub content_type: ContentType,
    /// Comma-joined public tag names.
    #[serde(default)]
    pub tags: String,
    /// Comma-joined author names.
    #[serde(default)]
    pub authors: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl ChunkMetadata {
    pub fn key(&self) -> ContentKey {
        ContentKey::new(self.post_slug.clone(), self.content_type)
    }
}

/// Sparse lexical vector (index → weight pairs).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// A fully prepared chunk ready for the vector store.
#[derive(Debug, Clone)]
pub struct ChunkUpsert {
    pub id: String,
    pub document: String,
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
    pub metadata: ChunkMetadata,
}

/// A raw record read back from the vector store. Metadata that failed
/// validation at the store boundary comes back as `None`.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub document: Option<String>,
    pub metadata: Option<ChunkMetadata>,
}

/// A ranked row from a fused search.
#[derive(Debug, Clone)]
pub struct RankedHit {
    pub id: String,
    pub document: Option<String>,
    pub metadata: Option<ChunkMetadata>,
    pub score: f64,
}

/// Filter over stored chunk metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    pub slug: Option<String>,
    pub url: Option<String>,
    pub content_type: Option<ContentType>,
}

impl MetadataFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_slug(slug: impl Into<String>, content_type: Option<ContentType>) -> Self {
        Self {
            slug: Some(slug.into()),
            url: None,
            content_type,
        }
    }

    pub fn by_url(url: impl Into<String>, content_type: Option<ContentType>) -> Self {
        Self {
            slug: None,
            url: Some(url.into()),
            content_type,
        }
    }

    pub fn by_content_type(content_type: ContentType) -> Self {
        Self {
            slug: None,
            url: None,
            content_type: Some(content_type),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slug.is_none() && self.url.is_none() && self.content_type.is_none()
    }

    /// Whether a metadata record passes this filter.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        if let Some(ref slug) = self.slug {
            if &metadata.post_slug != slug {
                return false;
            }
        }
        if let Some(ref url) = self.url {
            if &metadata.post_url != url {
                return false;
            }
        }
        if let Some(content_type) = self.content_type {
            if metadata.content_type != content_type {
                return false;
            }
        }
        true
    }
}

/// Last-indexed state per document, derived from stored chunk metadata.
#[derive(Debug, Clone, Default)]
pub struct SnapshotEntry {
    pub updated_at: Option<OffsetDateTime>,
    pub content_hash: Option<String>,
}

/// Snapshot of everything currently in the index, keyed by document.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    entries: HashMap<ContentKey, SnapshotEntry>,
}

impl IndexSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry for a key unless one is already present (the first
    /// chunk seen wins; siblings carry identical values).
    pub fn insert_first(&mut self, key: ContentKey, entry: SnapshotEntry) {
        self.entries.entry(key).or_insert(entry);
    }

    pub fn get(&self, key: &ContentKey) -> Option<&SnapshotEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ContentKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ContentKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A content item together with its chunking output, ready for diffing.
#[derive(Debug, Clone)]
pub struct PreparedItem {
    pub item: ContentItem,
    pub chunks: Vec<Chunk>,
    pub content_hash: Option<String>,
}

/// Query vector for one retrieval channel.
#[derive(Debug, Clone)]
pub enum QueryVector {
    Dense(Vec<f32>),
    Sparse(SparseVector),
}

/// One channel of a fused ranking: its query vector, fusion weight,
/// smoothing constant and per-channel candidate pool size.
#[derive(Debug, Clone)]
pub struct RankChannel {
    pub vector: QueryVector,
    pub weight: f64,
    pub k: f64,
    pub candidate_limit: usize,
}

/// A weighted reciprocal-rank-fusion query over one or more channels.
#[derive(Debug, Clone)]
pub struct RankQuery {
    pub channels: Vec<RankChannel>,
}

/// Presentation projection of a document (first chunk's metadata).
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub url: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    pub content_type: ContentType,
    pub tags: Vec<String>,
    pub authors: Vec<String>,
}

/// Presentation projection of a search hit (whichever chunk matched).
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub slug: String,
    pub title: String,
    pub url: String,
    pub excerpt: String,
    pub relevance_score: f64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    pub content_type: ContentType,
    pub tags: Vec<String>,
}

/// Reference to the best-ranked hit of a search, for query logging.
#[derive(Debug, Clone, Default)]
pub struct TopMatch {
    pub chunk_id: Option<String>,
    pub post_id: Option<String>,
    pub post_slug: Option<String>,
    pub post_url: Option<String>,
}

/// Append-only record of one issued query.
#[derive(Debug, Clone)]
pub struct QueryLogEntry {
    pub id: String,
    pub query: String,
    pub timestamp: i64,
    pub top_match_id: Option<String>,
    pub top_match_url: Option<String>,
}

/// Counters from one indexing cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    pub indexed: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub errors: usize,
}

/// Sort order for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_normalization() {
        assert_eq!(ContentType::normalize("page"), ContentType::Page);
        assert_eq!(ContentType::normalize(" PAGE "), ContentType::Page);
        assert_eq!(ContentType::normalize("post"), ContentType::Post);
        assert_eq!(ContentType::normalize("garbage"), ContentType::Post);
        assert_eq!(ContentType::normalize(""), ContentType::Post);
    }

    #[test]
    fn keys_distinguish_content_types() {
        let post = ContentKey::new("about", ContentType::Post);
        let page = ContentKey::new("about", ContentType::Page);
        assert_ne!(post, page);
    }

    #[test]
    fn tag_visibility_rules() {
        assert!(ContentTag::new("essays", None).is_public());
        assert!(ContentTag::new("essays", Some("public".into())).is_public());
        assert!(!ContentTag::new("#internal", None).is_public());
        assert!(!ContentTag::new("essays", Some("internal".into())).is_public());
        // An explicit public marker wins over the name prefix.
        assert!(ContentTag::new("#odd", Some("public".into())).is_public());
    }

    #[test]
    fn snapshot_keeps_first_entry_per_key() {
        let mut snapshot = IndexSnapshot::new();
        let key = ContentKey::new("a", ContentType::Post);

        snapshot.insert_first(
            key.clone(),
            SnapshotEntry {
                updated_at: None,
                content_hash: Some("first".into()),
            },
        );
        snapshot.insert_first(
            key.clone(),
            SnapshotEntry {
                updated_at: None,
                content_hash: Some("second".into()),
            },
        );

        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.get(&key).unwrap().content_hash.as_deref(),
            Some("first")
        );
    }

    #[test]
    fn metadata_filter_matching() {
        let metadata = ChunkMetadata {
            post_id: "1".into(),
            post_slug: "hello".into(),
            post_title: "Hello".into(),
            post_url: "https://x/hello/".into(),
            chunk_index: 0,
            total_chunks: 1,
            content_type: ContentType::Post,
            tags: String::new(),
            authors: String::new(),
            published_at: None,
            updated_at: None,
            content_hash: None,
        };

        assert!(MetadataFilter::all().matches(&metadata));
        assert!(MetadataFilter::by_slug("hello", None).matches(&metadata));
        assert!(!MetadataFilter::by_slug("hello", Some(ContentType::Page)).matches(&metadata));
        assert!(MetadataFilter::by_url("https://x/hello/", None).matches(&metadata));
        assert!(!MetadataFilter::by_slug("other", None).matches(&metadata));
    }

    #[test]
    fn chunk_metadata_ignores_unknown_stored_keys() {
        let raw = serde_json::json!({
            "post_id": "1",
            "post_slug": "hello",
            "post_title": "Hello",
            "post_url": "https://x/hello/",
            "chunk_index": 0,
            "total_chunks": 2,
            "content_type": "post",
            "tags": "essays",
            "authors": "Philip",
            "sparse_vector": {"indices": [1], "values": [0.5]}
        });

        let metadata: ChunkMetadata = serde_json::from_value(raw).unwrap();
        assert_eq!(metadata.post_slug, "hello");
        assert_eq!(metadata.total_chunks, 2);
    }
}
