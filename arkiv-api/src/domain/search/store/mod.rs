mod chroma_store;
mod memory;

pub use chroma_store::{chunk_collection_schema, ChromaVectorStore};
pub use memory::MemoryVectorStore;

use super::traits::{Result, VectorStore};
use super::types::{MetadataFilter, StoredRecord};

/// Store-enforced page cap on `get`; [`page_all`] loops over it.
pub const STORE_PAGE_LIMIT: usize = 300;

/// Fetch every record matching the filter, walking the store's page cap.
///
/// A failed page aborts the whole read; partial results are never returned.
pub async fn page_all<V: VectorStore + ?Sized>(
    store: &V,
    filter: &MetadataFilter,
) -> Result<Vec<StoredRecord>> {
    let mut records = Vec::new();
    let mut offset = 0;

    loop {
        let page = store.get(filter, STORE_PAGE_LIMIT, Some(offset)).await?;
        let page_len = page.len();
        records.extend(page);

        if page_len < STORE_PAGE_LIMIT {
            break;
        }
        offset += STORE_PAGE_LIMIT;
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::search::types::{ChunkMetadata, ChunkUpsert, ContentType, SparseVector};

    fn chunk(id: &str, slug: &str) -> ChunkUpsert {
        ChunkUpsert {
            id: id.to_string(),
            document: "text".into(),
            dense: vec![0.0],
            sparse: SparseVector::default(),
            metadata: ChunkMetadata {
                post_id: slug.to_string(),
                post_slug: slug.to_string(),
                post_title: slug.to_string(),
                post_url: format!("https://x/{}/", slug),
                chunk_index: 0,
                total_chunks: 1,
                content_type: ContentType::Post,
                tags: String::new(),
                authors: String::new(),
                published_at: None,
                updated_at: None,
                content_hash: None,
            },
        }
    }

    #[tokio::test]
    async fn page_all_walks_past_the_page_cap() {
        let store = MemoryVectorStore::new();
        let chunks: Vec<ChunkUpsert> = (0..STORE_PAGE_LIMIT + 7)
            .map(|i| chunk(&format!("id_{:04}", i), &format!("slug-{:04}", i)))
            .collect();
        store.seed(chunks).await;

        let records = page_all(&store, &MetadataFilter::all()).await.unwrap();
        assert_eq!(records.len(), STORE_PAGE_LIMIT + 7);
    }
}
