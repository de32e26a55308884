//! Ghost-backed content source implementation.
//!
//! Wraps the ghost-admin crate and converts its wire models into domain
//! content items.

use async_trait::async_trait;
use ghost_admin::{ContentClient, ContentKind, Post};

use crate::domain::search::traits::{ContentSource, Result, SearchError};
use crate::domain::search::types::{ContentItem, ContentTag, ContentType};

pub struct GhostContentSource {
    client: ContentClient,
    base_url: String,
}

impl GhostContentSource {
    pub fn new(client: ContentClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn convert(&self, post: Post, content_type: ContentType) -> ContentItem {
        // Prefer the canonical URL; fall back to one derived from the slug.
        let url = post.url.clone().unwrap_or_else(|| {
            format!("{}/{}/", self.base_url.trim_end_matches('/'), post.slug)
        });

        ContentItem {
            id: post.id,
            slug: post.slug,
            title: post.title,
            html: post.html,
            plaintext: post.plaintext,
            url,
            published_at: post.published_at,
            updated_at: post.updated_at,
            tags: post
                .tags
                .into_iter()
                .map(|tag| ContentTag::new(tag.name, tag.visibility))
                .collect(),
            authors: post.authors.into_iter().map(|author| author.name).collect(),
            content_type,
        }
    }
}

fn kind_for(content_type: ContentType) -> ContentKind {
    match content_type {
        ContentType::Post => ContentKind::Post,
        ContentType::Page => ContentKind::Page,
    }
}

#[async_trait]
impl ContentSource for GhostContentSource {
    async fn list_all(&self, content_type: ContentType) -> Result<Vec<ContentItem>> {
        let posts = self
            .client
            .get_all(kind_for(content_type))
            .await
            .map_err(|e| SearchError::SourceError(e.to_string()))?;

        Ok(posts
            .into_iter()
            .map(|post| self.convert(post, content_type))
            .collect())
    }

    async fn get_by_slug(
        &self,
        slug: &str,
        content_type: Option<ContentType>,
    ) -> Result<Option<ContentItem>> {
        let candidates = match content_type {
            Some(content_type) => vec![content_type],
            None => vec![ContentType::Post, ContentType::Page],
        };

        for content_type in candidates {
            let found = self
                .client
                .get_by_slug(slug, kind_for(content_type))
                .await
                .map_err(|e| SearchError::SourceError(e.to_string()))?;

            if let Some(post) = found {
                return Ok(Some(self.convert(post, content_type)));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghost_admin::{Author, Tag};

    fn source() -> GhostContentSource {
        let client = ContentClient::new("https://example.com", "abc:00ff").unwrap();
        GhostContentSource::new(client, "https://example.com")
    }

    fn ghost_post(url: Option<&str>) -> Post {
        Post {
            id: "63f4".into(),
            slug: "hello".into(),
            title: "Hello".into(),
            html: Some("<p>Hi</p>".into()),
            plaintext: None,
            excerpt: None,
            custom_excerpt: None,
            feature_image: None,
            published_at: None,
            updated_at: None,
            tags: vec![Tag {
                name: "#internal".into(),
                visibility: Some("internal".into()),
            }],
            authors: vec![Author {
                name: "Philip".into(),
            }],
            url: url.map(Into::into),
        }
    }

    #[test]
    fn conversion_keeps_canonical_url() {
        let item = source().convert(ghost_post(Some("https://example.com/hello/")), ContentType::Post);
        assert_eq!(item.url, "https://example.com/hello/");
        assert_eq!(item.content_type, ContentType::Post);
        assert_eq!(item.authors, vec!["Philip".to_string()]);
    }

    #[test]
    fn conversion_derives_url_from_slug_when_missing() {
        let item = source().convert(ghost_post(None), ContentType::Page);
        assert_eq!(item.url, "https://example.com/hello/");
    }

    #[test]
    fn conversion_preserves_tag_visibility() {
        let item = source().convert(ghost_post(None), ContentType::Post);
        assert_eq!(item.tags.len(), 1);
        assert!(!item.tags[0].is_public());
    }
}
