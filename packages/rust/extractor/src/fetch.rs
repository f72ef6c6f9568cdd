//! HTTP page fetcher.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, instrument, warn};
use url::Url;

use articleforge_shared::{ArticleForgeError, ExtractorConfig, Result};

use crate::ContentExtractor;
use crate::content::extract_article_text;

/// User-Agent string for page requests.
const USER_AGENT: &str = concat!("ArticleForge/", env!("CARGO_PKG_VERSION"));

const MAX_REDIRECTS: usize = 5;

/// Fetches pages and reduces them to readable text.
pub struct HttpExtractor {
    client: Client,
    max_response_bytes: u64,
    allow_private_hosts: bool,
}

impl HttpExtractor {
    /// Build an extractor from the `[extractor]` config section.
    pub fn from_config(config: &ExtractorConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let allow_private = config.allow_private_hosts;
        let redirect = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if !allow_private && is_ssrf_target(attempt.url()) {
                attempt.error("redirect to a private address")
            } else {
                attempt.follow()
            }
        });

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(redirect)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ArticleForgeError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes,
            allow_private_hosts: config.allow_private_hosts,
        })
    }

    async fn fetch_html(&self, url: &Url) -> Result<String> {
        let fail = |msg: String| ArticleForgeError::extraction(url.as_str(), msg);

        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }

        if let Some(ct) = response.headers().get(CONTENT_TYPE) {
            let ct = ct.to_str().unwrap_or_default().to_ascii_lowercase();
            if !ct.contains("html") {
                return Err(fail(format!("not an HTML page ({ct})")));
            }
        }

        if let Some(len) = response.content_length() {
            if len > self.max_response_bytes {
                return Err(fail(format!(
                    "page too large ({len} bytes, max {})",
                    self.max_response_bytes
                )));
            }
        }

        // Content-Length may be absent, so the cap is enforced while reading.
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fail(format!("body read failed: {e}")))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_response_bytes {
                return Err(fail(format!(
                    "page too large (over {} bytes)",
                    self.max_response_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Fetch and extract, reporting why a page could not be used.
    pub async fn try_extract(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url)
            .map_err(|e| ArticleForgeError::extraction(url, format!("invalid URL: {e}")))?;

        if !self.allow_private_hosts && is_ssrf_target(&parsed) {
            return Err(ArticleForgeError::extraction(
                url,
                "refusing to fetch a private or non-HTTP address",
            ));
        }

        let html = self.fetch_html(&parsed).await?;
        let text = extract_article_text(&html);
        debug!(html_bytes = html.len(), text_chars = text.len(), "page extracted");
        Ok(text)
    }
}

#[async_trait::async_trait]
impl ContentExtractor for HttpExtractor {
    /// Never fails: a page that cannot be fetched or parsed yields `""`.
    #[instrument(skip_all, fields(url = %url))]
    async fn extract(&self, url: &str) -> Result<String> {
        match self.try_extract(url).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(error = %e, "page unusable, returning empty text");
                Ok(String::new())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SSRF guard
// ---------------------------------------------------------------------------

/// Non-HTTP schemes, private IP literals, and local hostnames.
fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            let host = host.to_ascii_lowercase();
            host == "localhost"
                || host.ends_with(".localhost")
                || host.ends_with(".local")
                || host.ends_with(".internal")
        }
        None => true,
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_config() -> ExtractorConfig {
        ExtractorConfig {
            timeout_secs: 5,
            max_response_bytes: 1024,
            allow_private_hosts: true,
        }
    }

    fn html_page(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(
            format!("<html><body>{body}</body></html>"),
            "text/html; charset=utf-8",
        )
    }

    #[test]
    fn ssrf_guard_blocks_private_targets() {
        for url in [
            "http://localhost/",
            "http://127.0.0.1:8080/",
            "http://10.0.0.5/",
            "http://192.168.1.1/",
            "http://169.254.169.254/latest/meta-data",
            "http://100.64.1.1/",
            "http://[::1]/",
            "http://[fd00::1]/",
            "http://printer.local/",
            "http://db.internal/",
            "ftp://example.com/file",
            "file:///etc/passwd",
        ] {
            assert!(is_ssrf_target(&Url::parse(url).unwrap()), "{url}");
        }
    }

    #[test]
    fn ssrf_guard_allows_public_targets() {
        for url in [
            "https://example.com/article",
            "http://93.184.216.34/",
            "https://[2606:2800:220:1:248:1893:25c8:1946]/",
        ] {
            assert!(!is_ssrf_target(&Url::parse(url).unwrap()), "{url}");
        }
    }

    #[tokio::test]
    async fn extract_returns_page_text() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(html_page(
                "<nav><p>Menu</p></nav><p>Coffee was first cultivated in Yemen.</p>",
            ))
            .mount(&server)
            .await;

        let extractor = HttpExtractor::from_config(&local_config()).unwrap();
        let text = extractor
            .extract(&format!("{}/article", server.uri()))
            .await
            .unwrap();
        assert_eq!(text, "Coffee was first cultivated in Yemen.");
    }

    #[tokio::test]
    async fn extract_refuses_private_hosts_by_default() {
        let server = MockServer::start().await;

        let config = ExtractorConfig {
            allow_private_hosts: false,
            ..local_config()
        };
        let extractor = HttpExtractor::from_config(&config).unwrap();
        let err = extractor
            .try_extract(&format!("{}/article", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ArticleForgeError::Extraction { .. }));
    }

    #[tokio::test]
    async fn extract_http_error_is_extraction_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let extractor = HttpExtractor::from_config(&local_config()).unwrap();
        let err = extractor
            .try_extract(&format!("{}/gone", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ArticleForgeError::Extraction { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn extract_rejects_non_html_and_oversized_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data.pdf"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(vec![0u8; 16], "application/pdf"),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/huge"))
            .respond_with(html_page(&"<p>long paragraph</p>".repeat(200)))
            .mount(&server)
            .await;

        let extractor = HttpExtractor::from_config(&local_config()).unwrap();

        let err = extractor
            .try_extract(&format!("{}/data.pdf", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not an HTML page"));

        let err = extractor
            .try_extract(&format!("{}/huge", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn extract_body_cap_applies_without_content_length() {
        let server = MockServer::start().await;

        // A body well over the cap, sent without a Content-Length header.
        Mock::given(method("GET"))
            .and(path("/chunked"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("transfer-encoding", "chunked")
                    .set_body_raw(format!("<p>{}</p>", "x".repeat(8 * 1024)), "text/html"),
            )
            .mount(&server)
            .await;

        let extractor = HttpExtractor::from_config(&local_config()).unwrap();
        let err = extractor
            .try_extract(&format!("{}/chunked", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn extract_returns_empty_text_for_unusable_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let extractor = HttpExtractor::from_config(&local_config()).unwrap();
        for url in [format!("{}/gone", server.uri()), "not a url".to_string()] {
            assert_eq!(extractor.extract(&url).await.unwrap(), "", "{url}");
        }

        let guarded = HttpExtractor::from_config(&ExtractorConfig {
            allow_private_hosts: false,
            ..local_config()
        })
        .unwrap();
        let text = guarded
            .extract(&format!("{}/gone", server.uri()))
            .await
            .unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn extract_invalid_url_is_extraction_error() {
        let extractor = HttpExtractor::from_config(&local_config()).unwrap();
        let err = extractor.try_extract("not a url").await.unwrap_err();
        assert!(matches!(err, ArticleForgeError::Extraction { .. }));
    }
}
