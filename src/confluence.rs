//! # Confluence document store
//!
//! [`DocumentStore`] is how the pipeline gets page text. Fetch failures are
//! reported per page as [`FetchError`] and callers skip the page instead of
//! aborting.
//!
//! [`ConfluenceClient`] implements it against the Confluence REST API using
//! HTTP basic auth (account email + API token):
//!
//! ```text
//! GET {base_url}/rest/api/content/{id}?expand=body.storage
//! GET {base_url}/rest/api/content/search?cql=...&limit=...
//! ```

use std::future::Future;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{ConfluenceSettings, require};
use crate::document::DocId;
use crate::error::{FetchError, RagError, Result};

/// CQL used when a search is requested with an empty query.
pub const DEFAULT_CQL: &str = "space=GP";

/// Source of page text.
pub trait DocumentStore {
    fn fetch_document(
        &self,
        id: &DocId,
    ) -> impl Future<Output = std::result::Result<String, FetchError>> + Send;
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    body: PageBody,
}

#[derive(Debug, Deserialize)]
struct PageBody {
    storage: StorageBody,
}

#[derive(Debug, Deserialize)]
struct StorageBody {
    value: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: DocId,
}

/// Confluence REST client. Construct it once from validated settings.
#[derive(Debug, Clone)]
pub struct ConfluenceClient {
    base_url: String,
    user_email: String,
    api_token: String,
    http: reqwest::Client,
}

impl ConfluenceClient {
    /// # Errors
    /// [`RagError::Configuration`] if the base url or either credential is missing.
    pub fn new(settings: &ConfluenceSettings) -> Result<Self> {
        let base_url = require(&settings.base_url, "confluence.base_url")?;
        let user_email = require(&settings.user_email, "confluence.user_email")?;
        let api_token = require(&settings.api_token, "confluence.api_token")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_email: user_email.to_string(),
            api_token: api_token.to_string(),
            http: reqwest::Client::new(),
        })
    }

    /// Storage-format (XHTML) body of a page.
    pub async fn get_page_content(&self, id: &DocId) -> std::result::Result<String, FetchError> {
        let url = format!("{}/rest/api/content/{}", self.base_url, id);
        debug!("Fetching page {id} from {url}");

        let response = self
            .http
            .get(&url)
            .query(&[("expand", "body.storage")])
            .basic_auth(&self.user_email, Some(&self.api_token))
            .send()
            .await
            .map_err(|e| FetchError::transient(id, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                warn!("Page ID {id} not found.");
                return Err(FetchError::NotFound(id.clone()));
            }
            status if !status.is_success() => {
                warn!("Error fetching content for page ID {id}: HTTP {status}");
                return Err(FetchError::transient(id, format!("HTTP {status}")));
            }
            _ => {}
        }

        let page: PageResponse = response.json().await.map_err(|e| {
            warn!("Unexpected response structure for page ID {id}.");
            FetchError::transient(id, e)
        })?;

        Ok(page.body.storage.value)
    }

    /// Ids of pages matching a CQL query. An empty query searches [`DEFAULT_CQL`].
    pub async fn search_pages(&self, cql: &str, limit: usize) -> Result<Vec<DocId>> {
        let cql = if cql.trim().is_empty() { DEFAULT_CQL } else { cql };
        let url = format!("{}/rest/api/content/search", self.base_url);
        let limit = limit.to_string();

        let response = self
            .http
            .get(&url)
            .query(&[("cql", cql), ("limit", limit.as_str())])
            .basic_auth(&self.user_email, Some(&self.api_token))
            .send()
            .await
            .map_err(store_error)?;

        debug!("Requesting: {} -> {}", response.url(), response.status());

        let response = response
            .error_for_status()
            .map_err(store_error)?;
        let found: SearchResponse = response
            .json()
            .await
            .map_err(store_error)?;

        Ok(found.results.into_iter().map(|r| r.id).collect())
    }
}

fn store_error(e: reqwest::Error) -> RagError {
    RagError::DocumentStore(e.to_string())
}

impl DocumentStore for ConfluenceClient {
    async fn fetch_document(&self, id: &DocId) -> std::result::Result<String, FetchError> {
        self.get_page_content(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> ConfluenceClient {
        ConfluenceClient::new(&ConfluenceSettings {
            base_url: Some(format!("{}/", server.base_url())),
            user_email: Some("me@example.com".into()),
            api_token: Some("token".into()),
        })
        .unwrap()
    }

    #[test]
    fn missing_credentials_are_a_configuration_error() {
        let settings = ConfluenceSettings {
            base_url: Some("https://wiki.example.com".into()),
            user_email: None,
            api_token: Some("token".into()),
        };
        assert!(matches!(
            ConfluenceClient::new(&settings),
            Err(RagError::Configuration(m)) if m.contains("user_email")
        ));
    }

    #[tokio::test]
    async fn fetches_storage_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/api/content/9535489")
                    .query_param("expand", "body.storage")
                    .header_exists("authorization");
                then.status(200).json_body(json!({
                    "id": "9535489",
                    "body": { "storage": { "value": "<p>The sky is blue</p>", "representation": "storage" } }
                }));
            })
            .await;

        let client = client_for(&server);
        let text = client
            .fetch_document(&DocId::from(9535489u64))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(text, "<p>The sky is blue</p>");
    }

    #[tokio::test]
    async fn not_found_is_reported_as_such() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/api/content/404404");
                then.status(404);
            })
            .await;

        let err = client_for(&server)
            .fetch_document(&DocId::from(404404u64))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::NotFound(DocId::from(404404u64)));
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/api/content/1");
                then.status(401);
            })
            .await;

        let err = client_for(&server)
            .fetch_document(&DocId::from(1u64))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transient { .. }));
    }

    #[tokio::test]
    async fn unexpected_shape_is_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/api/content/2");
                then.status(200).json_body(json!({ "id": "2", "title": "No body" }));
            })
            .await;

        let err = client_for(&server)
            .fetch_document(&DocId::from(2u64))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transient { .. }));
    }

    #[tokio::test]
    async fn search_defaults_to_space_query() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/api/content/search")
                    .query_param("cql", DEFAULT_CQL)
                    .query_param("limit", "5");
                then.status(200).json_body(json!({
                    "results": [ { "id": "9601025" }, { "id": "9404548" } ],
                    "size": 2
                }));
            })
            .await;

        let ids = client_for(&server).search_pages("  ", 5).await.unwrap();

        mock.assert_async().await;
        assert_eq!(ids, vec![DocId::from(9601025u64), DocId::from(9404548u64)]);
    }
}
