//! Web search capability and heading suggestions.
//!
//! The pipeline asks a search collaborator for candidate pages about the
//! topic once per run. [`HttpSearchClient`] talks to a SearXNG-compatible
//! JSON endpoint; tests and embedders can supply their own [`SearchClient`].

mod headings;

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};
use url::Url;

use articleforge_shared::{ArticleForgeError, Result, SearchConfig, SearchHit};

pub use headings::{parse_topic_input, suggest_headings};

/// Maximum number of redirects to follow for a search request.
const MAX_REDIRECTS: usize = 3;

/// Maximum response size we consider valid (2 MB).
const MAX_RESPONSE_SIZE: u64 = 2 * 1024 * 1024;

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("ArticleForge/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Returns up to `limit` candidate pages for a query.
///
/// Transport, auth, and response-shape failures are
/// [`ArticleForgeError::Retrieval`].
#[async_trait::async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    url: String,
}

/// Search client for a `GET {endpoint}?q=…&format=json` API.
pub struct HttpSearchClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpSearchClient {
    /// Build a client from the `[search]` config section.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            ArticleForgeError::config(format!("invalid search endpoint '{}': {e}", config.endpoint))
        })?;

        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty());

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ArticleForgeError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    fn request_url(&self, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("format", "json");
        url
    }
}

#[async_trait::async_trait]
impl SearchClient for HttpSearchClient {
    #[instrument(skip_all, fields(query = %query, limit = limit))]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let url = self.request_url(query);

        let mut request = self.client.get(url.as_str());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ArticleForgeError::Retrieval(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArticleForgeError::Retrieval(format!(
                "search endpoint returned HTTP {status}"
            )));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(ArticleForgeError::Retrieval(format!(
                    "search response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
                )));
            }
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            ArticleForgeError::Retrieval(format!("invalid search response: {e}"))
        })?;

        let hits: Vec<SearchHit> = body
            .results
            .into_iter()
            .filter(|r| r.url.starts_with("http://") || r.url.starts_with("https://"))
            .take(limit)
            .map(|r| SearchHit {
                title: r.title.trim().to_string(),
                url: r.url,
            })
            .collect();

        info!(hits = hits.len(), "search complete");

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> SearchConfig {
        SearchConfig {
            endpoint: format!("{}/search", server.uri()),
            api_key_env: None,
            timeout_secs: 5,
        }
    }

    #[test]
    fn request_url_encodes_query() {
        let config = SearchConfig {
            endpoint: "https://search.example.com/search".into(),
            ..Default::default()
        };
        let client = HttpSearchClient::from_config(&config).unwrap();
        let url = client.request_url("coffee & tea");
        assert_eq!(
            url.as_str(),
            "https://search.example.com/search?q=coffee+%26+tea&format=json"
        );
    }

    #[test]
    fn invalid_endpoint_is_config_error() {
        let config = SearchConfig {
            endpoint: "not a url".into(),
            ..Default::default()
        };
        let err = HttpSearchClient::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("invalid search endpoint"));
    }

    #[tokio::test]
    async fn search_returns_limited_hits() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "coffee brewing"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"title": " A history of coffee ", "url": "https://a.example/history"},
                    {"title": "Local file", "url": "file:///etc/passwd"},
                    {"title": "Brewing methods", "url": "https://b.example/methods"},
                    {"title": "Third", "url": "https://c.example/third"}
                ]
            })))
            .mount(&server)
            .await;

        let client = HttpSearchClient::from_config(&config_for(&server)).unwrap();
        let hits = client.search("coffee brewing", 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "A history of coffee");
        assert_eq!(hits[1].url, "https://b.example/methods");
    }

    #[tokio::test]
    async fn search_sends_bearer_key_when_configured() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(header("authorization", "Bearer search-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})),
            )
            .mount(&server)
            .await;

        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("AF_TEST_SEARCH_KEY_7731", "search-key") };
        let mut config = config_for(&server);
        config.api_key_env = Some("AF_TEST_SEARCH_KEY_7731".into());

        let client = HttpSearchClient::from_config(&config).unwrap();
        let hits = client.search("anything", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn search_http_error_is_retrieval_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = HttpSearchClient::from_config(&config_for(&server)).unwrap();
        let err = client.search("coffee", 5).await.unwrap_err();
        assert!(matches!(err, ArticleForgeError::Retrieval(_)));
    }

    #[tokio::test]
    async fn search_malformed_body_is_retrieval_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let client = HttpSearchClient::from_config(&config_for(&server)).unwrap();
        let err = client.search("coffee", 5).await.unwrap_err();
        assert!(err.to_string().contains("invalid search response"));
    }
}
