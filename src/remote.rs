//! Remote content API client.
//!
//! Fetches the content-type listing and one sample entry per type from the
//! delivery (or preview) API.

use crate::error::{FauxError, Result};
use crate::transport::{self, InterceptedRequest};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default API host. The subdomain is picked by [`ApiEndpoint::base_url`].
pub const DEFAULT_API_HOST: &str = "contentful.com";

/// Reference resolution depth requested with each sample entry.
pub const SAMPLE_INCLUDE_DEPTH: u32 = 10;

/// Something that can GET a URL and decode the body as JSON.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Single attempt, no retries.
    async fn fetch_json(&self, url: &str) -> Result<Value>;
}

/// Strip the query string so access tokens stay out of logs and errors.
pub fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn decode_body(url: &str, body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| FauxError::decode(redact(url), e))
}

/// HTTPS source backed by reqwest.
///
/// Requests are offered to the process-wide hook first, so while stubbing
/// is active they never reach the network.
#[derive(Debug, Clone)]
pub struct HttpSource {
    http: HttpClient,
}

impl HttpSource {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FauxError::Network {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ContentSource for HttpSource {
    async fn fetch_json(&self, url: &str) -> Result<Value> {
        if let Some(response) = transport::dispatch(&InterceptedRequest::get(url)) {
            return decode_body(url, &response.body);
        }

        let network = |e: reqwest::Error| FauxError::Network {
            url: redact(url).to_string(),
            message: e.to_string(),
        };
        let response = self.http.get(url).send().await.map_err(network)?;
        debug!(url = %redact(url), status = response.status().as_u16(), "Fetched");
        let body = response.text().await.map_err(network)?;
        decode_body(url, &body)
    }
}

/// Where and as whom to talk to the content API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    pub host: String,
    pub space_id: String,
    pub access_token: String,
    pub preview: bool,
}

impl ApiEndpoint {
    pub fn new(space_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_API_HOST.to_string(),
            space_id: space_id.into(),
            access_token: access_token.into(),
            preview: false,
        }
    }

    #[must_use]
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// `https://cdn.<host>` or `https://preview.<host>`.
    pub fn base_url(&self) -> String {
        let sub = if self.preview { "preview" } else { "cdn" };
        format!("https://{}.{}", sub, self.host.trim_end_matches('/'))
    }

    fn space_url(&self) -> String {
        format!("{}/spaces/{}", self.base_url(), self.space_id)
    }

    pub fn content_types_url(&self) -> String {
        format!(
            "{}/content_types?access_token={}",
            self.space_url(),
            self.access_token
        )
    }

    pub fn sample_entries_url(&self, content_type: &str) -> String {
        format!(
            "{}/entries?access_token={}&include={}&content_type={}&limit=1",
            self.space_url(),
            self.access_token,
            SAMPLE_INCLUDE_DEPTH,
            content_type
        )
    }
}

/// Discovery and sampling on top of a [`ContentSource`].
#[derive(Clone)]
pub struct RemoteFetcher {
    source: Arc<dyn ContentSource>,
    endpoint: ApiEndpoint,
}

impl RemoteFetcher {
    pub fn new(source: Arc<dyn ContentSource>, endpoint: ApiEndpoint) -> Self {
        Self { source, endpoint }
    }

    pub fn endpoint(&self) -> &ApiEndpoint {
        &self.endpoint
    }

    pub async fn fetch_json(&self, url: &str) -> Result<Value> {
        self.source.fetch_json(url).await
    }

    /// Content type ids in listing order.
    ///
    /// Listing entries without a `sys.id` are skipped.
    pub async fn discover_content_types(&self) -> Result<Vec<String>> {
        let url = self.endpoint.content_types_url();
        let listing = self.fetch_json(&url).await?;
        let items = listing
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| FauxError::decode(redact(&url), "content type listing has no items array"))?;

        Ok(items
            .iter()
            .filter_map(|item| item.pointer("/sys/id").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// The raw entries response for one entry of `content_type`.
    pub async fn fetch_sample_entries(&self, content_type: &str) -> Result<Value> {
        self.fetch_json(&self.endpoint.sample_entries_url(content_type))
            .await
    }
}
