//! HTTP network backed by reqwest.
//!
//! ### Response tainting
//! - Same-origin responses are `basic`
//! - Cross-origin `no-cors` responses are reduced to an opaque shell
//!   (status 0, no headers, no body)
//! - Cross-origin `cors` responses need `Access-Control-Allow-Origin`
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//! - No timeout unless one is configured

pub mod classify;

use std::time::Duration;

use bytes::Bytes;
use docscan_core::origin::is_same_origin;
use docscan_core::{AgentConfig, Error, Headers, Method, Request, RequestMode, Response, ResponseType};
use reqwest::{Client, header};
use url::Url;

pub use classify::classify;

use crate::network::{FetchError, Network};

const NAVIGATE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// User agent string (default: "docscan-agent/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: none)
    pub timeout: Option<Duration>,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { user_agent: "docscan-agent/0.1".to_string(), max_bytes: 5 * 1024 * 1024, timeout: None, max_redirects: 5 }
    }
}

impl HttpConfig {
    pub fn from_agent_config(config: &AgentConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Self::default()
        }
    }
}

/// [`Network`] implementation over a reqwest client.
pub struct HttpNetwork {
    http: Client,
    config: HttpConfig,
    origin: Url,
}

impl HttpNetwork {
    /// Create a network for pages served from `origin`.
    pub fn new(origin: Url, config: HttpConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| FetchError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config, origin })
    }

    /// Build the network described by an agent configuration.
    pub fn from_config(config: &AgentConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        Ok(Self::new(origin, HttpConfig::from_agent_config(config))?)
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn build(&self, request: &Request) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(to_reqwest_method(request.method), request.url.as_str());

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if request.is_navigation() && !request.headers.contains_key("accept") {
            builder = builder.header(header::ACCEPT, NAVIGATE_ACCEPT);
        }

        if request.mode == RequestMode::Cors && !is_same_origin(&self.origin, &request.url) {
            builder = builder.header(header::ORIGIN, self.origin.origin().ascii_serialization());
        }

        builder
    }
}

#[async_trait::async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if request.mode == RequestMode::SameOrigin && !is_same_origin(&self.origin, &request.url) {
            return Err(FetchError::Cors(format!("same-origin request to {}", request.url)));
        }

        let response = self.build(request).send().await?;

        let status = response.status();
        let final_url = response.url().clone();

        let headers = collect_headers(response.headers());
        let allow_origin = headers.get("access-control-allow-origin").map(String::as_str);
        let kind = classify(&self.origin, request.mode, &final_url, allow_origin)?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchError::TooLarge { size: len as usize, limit: self.config.max_bytes });
        }

        let bytes: Bytes = response.bytes().await?;

        if bytes.len() > self.config.max_bytes {
            return Err(FetchError::TooLarge { size: bytes.len(), limit: self.config.max_bytes });
        }

        tracing::debug!(
            "fetched {} {} -> {} ({}, {} bytes, {})",
            request.method,
            request.url,
            final_url,
            status.as_u16(),
            bytes.len(),
            kind.as_str()
        );

        if kind == ResponseType::Opaque {
            return Ok(Response::opaque());
        }

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: bytes,
            kind,
        })
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

/// Lowercase header map; repeated headers are joined with ", ".
fn collect_headers(map: &header::HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        let Ok(value) = value.to_str() else {
            continue;
        };
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    headers
}
