//! Mock content source for testing.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::domain::search::traits::{ContentSource, Result, SearchError};
use crate::domain::search::types::{ContentItem, ContentType};

/// In-memory content source.
#[derive(Clone, Default)]
pub struct MockContentSource {
    items: Arc<RwLock<Vec<ContentItem>>>,
    fail: bool,
}

impl MockContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose every call fails, for exercising error paths.
    pub fn failing() -> Self {
        Self {
            items: Arc::default(),
            fail: true,
        }
    }

    pub fn with_posts(self, items: Vec<ContentItem>) -> Self {
        self.items.write().unwrap().extend(items);
        self
    }

    /// Replace the remote content set between syncs.
    pub fn set_items(&self, items: Vec<ContentItem>) {
        *self.items.write().unwrap() = items;
    }
}

#[async_trait]
impl ContentSource for MockContentSource {
    async fn list_all(&self, content_type: ContentType) -> Result<Vec<ContentItem>> {
        if self.fail {
            return Err(SearchError::SourceError("mock source failure".into()));
        }
        Ok(self
            .items
            .read()
            .unwrap()
            .iter()
            .filter(|item| item.content_type == content_type)
            .cloned()
            .collect())
    }

    async fn get_by_slug(
        &self,
        slug: &str,
        content_type: Option<ContentType>,
    ) -> Result<Option<ContentItem>> {
        if self.fail {
            return Err(SearchError::SourceError("mock source failure".into()));
        }
        Ok(self
            .items
            .read()
            .unwrap()
            .iter()
            .find(|item| {
                item.slug == slug
                    && content_type
                        .map(|content_type| item.content_type == content_type)
                        .unwrap_or(true)
            })
            .cloned())
    }
}
