use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Meta, Pagination, Post};
use crate::token::AdminApiKey;

const PAGE_SIZE: u32 = 50;
const MAX_ATTEMPTS: u32 = 3;

#[derive(Error, Debug)]
pub enum ContentClientError {
    #[error("Invalid Admin API key: {0}")]
    InvalidApiKey(String),
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Which Ghost resource a call targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentKind {
    Post,
    Page,
}

impl ContentKind {
    fn resource(&self) -> &'static str {
        match self {
            ContentKind::Post => "posts",
            ContentKind::Page => "pages",
        }
    }
}

/// Client for the Ghost Admin API.
///
/// Holds one `reqwest::Client` for the process lifetime; a fresh JWT is
/// minted per request from the parsed admin key.
#[derive(Clone)]
pub struct ContentClient {
    http: reqwest::Client,
    api_url: String,
    key: AdminApiKey,
}

#[derive(Deserialize)]
struct PostsResponse {
    posts: Vec<Post>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Deserialize)]
struct PagesResponse {
    pages: Vec<Post>,
    #[serde(default)]
    meta: Option<Meta>,
}

impl ContentClient {
    pub fn new(api_url: &str, admin_api_key: &str) -> Result<Self, ContentClientError> {
        let key = AdminApiKey::parse(admin_api_key)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ContentClientError::Request(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            key,
        })
    }

    /// Fetch one page of published items.
    pub async fn get_page_of(
        &self,
        kind: ContentKind,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Post>, Pagination), ContentClientError> {
        let url = format!(
            "{}/ghost/api/admin/{}/",
            self.api_url,
            kind.resource()
        );
        let params = [
            ("limit", limit.to_string()),
            ("page", page.to_string()),
            ("include", "tags,authors".to_string()),
            ("formats", "html,plaintext".to_string()),
            ("filter", "status:published".to_string()),
        ];

        let body = self.get_with_retry(&url, &params).await?;
        let (items, meta) = match kind {
            ContentKind::Post => {
                let parsed: PostsResponse = serde_json::from_str(&body)
                    .map_err(|e| ContentClientError::UnexpectedResponse(e.to_string()))?;
                (parsed.posts, parsed.meta)
            }
            ContentKind::Page => {
                let parsed: PagesResponse = serde_json::from_str(&body)
                    .map_err(|e| ContentClientError::UnexpectedResponse(e.to_string()))?;
                (parsed.pages, parsed.meta)
            }
        };

        let pagination = meta.and_then(|m| m.pagination).unwrap_or(Pagination {
            page,
            pages: page,
            total: items.len() as u32,
        });

        debug!(
            resource = kind.resource(),
            page,
            count = items.len(),
            "Fetched content page"
        );

        Ok((items, pagination))
    }

    /// Fetch every published item of the given kind, following pagination.
    pub async fn get_all(&self, kind: ContentKind) -> Result<Vec<Post>, ContentClientError> {
        let mut all = Vec::new();
        let mut page = 1;

        loop {
            let (items, pagination) = self.get_page_of(kind, page, PAGE_SIZE).await?;
            all.extend(items);

            if page >= pagination.pages {
                break;
            }
            page += 1;
        }

        debug!(resource = kind.resource(), total = all.len(), "Fetched all content");
        Ok(all)
    }

    /// Fetch a single item by slug. A 404 maps to `Ok(None)`.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        kind: ContentKind,
    ) -> Result<Option<Post>, ContentClientError> {
        let url = format!(
            "{}/ghost/api/admin/{}/slug/{}/",
            self.api_url,
            kind.resource(),
            slug
        );
        let params = [
            ("include", "tags,authors".to_string()),
            ("formats", "html,plaintext".to_string()),
        ];

        let token = self.key.generate_token()?;
        let response = self
            .http
            .get(&url)
            .query(&params)
            .header("Authorization", format!("Ghost {}", token))
            .send()
            .await
            .map_err(|e| ContentClientError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ContentClientError::Request(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ContentClientError::Request(e.to_string()))?;

        let items = match kind {
            ContentKind::Post => {
                serde_json::from_str::<PostsResponse>(&body)
                    .map_err(|e| ContentClientError::UnexpectedResponse(e.to_string()))?
                    .posts
            }
            ContentKind::Page => {
                serde_json::from_str::<PagesResponse>(&body)
                    .map_err(|e| ContentClientError::UnexpectedResponse(e.to_string()))?
                    .pages
            }
        };

        Ok(items.into_iter().next())
    }

    /// GET with bounded exponential backoff on transient failures.
    ///
    /// Retries network errors, 429 and 5xx; other status codes fail
    /// immediately. Backoff: 1s, 2s.
    async fn get_with_retry(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<String, ContentClientError> {
        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let backoff = Duration::from_secs(1 << (attempt - 1));
                warn!(url, attempt, backoff_secs = backoff.as_secs(), "Retrying content fetch");
                tokio::time::sleep(backoff).await;
            }

            let token = self.key.generate_token()?;
            let result = self
                .http
                .get(url)
                .query(params)
                .header("Authorization", format!("Ghost {}", token))
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .map_err(|e| ContentClientError::Request(e.to_string()));
                    }
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    let err = ContentClientError::Request(format!("{} returned {}", url, status));
                    if !retryable {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
                Err(e) => {
                    last_error = Some(ContentClientError::Request(e.to_string()));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ContentClientError::Request("retries exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_kind_resources() {
        assert_eq!(ContentKind::Post.resource(), "posts");
        assert_eq!(ContentKind::Page.resource(), "pages");
    }

    #[test]
    fn client_rejects_malformed_key() {
        let result = ContentClient::new("https://example.com", "not-a-key");
        assert!(result.is_err());
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = ContentClient::new("https://example.com/", "abc:00ff").unwrap();
        assert_eq!(client.api_url, "https://example.com");
    }
}
