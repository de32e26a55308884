use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::expression::Search;
use crate::types::{GetResponse, SearchResponse, UpsertRequest};

const DEFAULT_API_URL: &str = "https://api.trychroma.com";
const MAX_ATTEMPTS: u32 = 3;

/// Server-enforced page cap on `get`; callers paginate past it.
pub const GET_PAGE_LIMIT: usize = 300;

#[derive(Error, Debug)]
pub enum ChromaError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Client for the Chroma Cloud HTTP API, scoped to one tenant and database.
#[derive(Clone)]
pub struct ChromaClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    tenant: String,
    database: String,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
    name: String,
}

impl ChromaClient {
    pub fn new(tenant: &str, database: &str, api_key: &str) -> Result<Self, ChromaError> {
        Self::with_api_url(DEFAULT_API_URL, tenant, database, api_key)
    }

    pub fn with_api_url(
        api_url: &str,
        tenant: &str,
        database: &str,
        api_key: &str,
    ) -> Result<Self, ChromaError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ChromaError::Request(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            tenant: tenant.to_string(),
            database: database.to_string(),
        })
    }

    fn database_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}",
            self.api_url, self.tenant, self.database
        )
    }

    /// POST with bounded exponential backoff on transient failures.
    ///
    /// Retries network errors, 429 and 5xx; other status codes fail
    /// immediately. Backoff: 1s, 2s.
    async fn send_with_retry(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<reqwest::Response, ChromaError> {
        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let backoff = Duration::from_secs(1 << (attempt - 1));
                warn!(url, attempt, backoff_secs = backoff.as_secs(), "Retrying store call");
                tokio::time::sleep(backoff).await;
            }

            let result = self
                .http
                .post(url)
                .header("x-chroma-token", &self.api_key)
                .json(body)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    let body = response.text().await.unwrap_or_default();
                    let err = ChromaError::Status {
                        status: status.as_u16(),
                        body,
                    };
                    if !retryable {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
                Err(e) => {
                    last_error = Some(ChromaError::Request(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ChromaError::Request("retries exhausted".to_string())))
    }

    async fn post<T: DeserializeOwned>(&self, url: &str, body: &Value) -> Result<T, ChromaError> {
        let response = self.send_with_retry(url, body).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| ChromaError::UnexpectedResponse(e.to_string()))
    }

    /// POST where the response body is irrelevant (upsert/delete acks).
    async fn post_no_content(&self, url: &str, body: &Value) -> Result<(), ChromaError> {
        self.send_with_retry(url, body).await?;
        Ok(())
    }

    /// Fetch a collection handle, creating the collection when absent.
    ///
    /// The optional schema value configures the collection's indexes on
    /// first creation and is ignored for existing collections.
    pub async fn get_or_create_collection(
        &self,
        name: &str,
        schema: Option<Value>,
    ) -> Result<Collection, ChromaError> {
        let url = format!("{}/collections", self.database_url());
        let mut body = json!({ "name": name, "get_or_create": true });
        if let Some(schema) = schema {
            body["schema"] = schema;
        }

        let info: CollectionInfo = self.post(&url, &body).await?;
        debug!(collection = %info.name, id = %info.id, "Connected to collection");

        Ok(Collection {
            client: self.clone(),
            id: info.id,
            name: info.name,
        })
    }
}

/// Handle to one collection; cheap to clone, safe to share across tasks.
#[derive(Clone)]
pub struct Collection {
    client: ChromaClient,
    id: String,
    name: String,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn collection_url(&self, op: &str) -> String {
        format!("{}/collections/{}/{}", self.client.database_url(), self.id, op)
    }

    pub async fn upsert(&self, request: &UpsertRequest) -> Result<(), ChromaError> {
        let url = self.collection_url("upsert");
        let body = serde_json::to_value(request)
            .map_err(|e| ChromaError::UnexpectedResponse(e.to_string()))?;
        self.client.post_no_content(&url, &body).await
    }

    /// Filtered get. The server caps each call at [`GET_PAGE_LIMIT`] records;
    /// pass `offset` to walk past the cap.
    pub async fn get(
        &self,
        where_filter: Option<Value>,
        limit: usize,
        offset: Option<usize>,
    ) -> Result<GetResponse, ChromaError> {
        let url = self.collection_url("get");
        let mut body = json!({
            "limit": limit.min(GET_PAGE_LIMIT),
            "include": ["documents", "metadatas"],
        });
        if let Some(filter) = where_filter {
            body["where"] = filter;
        }
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        self.client.post(&url, &body).await
    }

    pub async fn delete(&self, ids: &[String]) -> Result<(), ChromaError> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = self.collection_url("delete");
        let body = json!({ "ids": ids });
        self.client.post_no_content(&url, &body).await
    }

    /// Execute a rank-expression search.
    pub async fn search(&self, search: &Search) -> Result<SearchResponse, ChromaError> {
        let url = self.collection_url("search");
        let body = json!({ "searches": [search.to_value()] });
        self.client.post(&url, &body).await
    }
}
