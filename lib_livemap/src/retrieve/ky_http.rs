//! # HTTP Retrieval Utilities
//!
//! Asynchronous API client wrapper around `reqwest`, with middleware support
//! for exponential backoff retries and standardized JSON response handling.

use std::time::Duration;

use anyhow::Context;
use reqwest::{header::HeaderMap, Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;

/// A standardized container for API responses.
///
/// Wraps the deserialized data along with the status code and headers of the
/// HTTP transaction.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The deserialized response body. `None` for non-2xx responses and for
    /// 2xx responses without a body.
    pub data: Option<T>,
    /// The raw error body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`, it handles the base URL, a request
/// timeout and transient-failure retries.
#[derive(Clone)]
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined. Always ends in `/`.
    base_url: Url,
}

impl ApiClient {
    /// Creates a new `ApiClient`.
    ///
    /// # Arguments
    /// * `base_url` - Absolute base URL (e.g., "http://localhost:8000"). A
    ///   trailing `/` is added when missing so relative paths keep its path.
    /// * `max_retries` - Retries for transient failures. `0` disables the
    ///   retry middleware.
    /// * `timeout` - Per-request timeout.
    ///
    /// # Errors
    /// Fails if `base_url` is not a valid absolute URL or the TLS backend
    /// cannot be initialized.
    pub fn new(base_url: &str, max_retries: u32, timeout: Duration) -> anyhow::Result<Self> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let url = Url::parse(&normalized)
            .with_context(|| format!("Invalid base URL '{}' (must be absolute)", base_url))?;

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let mut builder = ClientBuilder::new(http);
        if max_retries > 0 {
            let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        Ok(Self {
            inner: builder.build(),
            base_url: url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the absolute URL for `segments` below the base URL. Each segment
    /// is percent-encoded, so ids containing `/`, `?` or `#` stay one segment.
    ///
    /// # Errors
    /// Fails if the base URL cannot carry path segments (e.g. `data:` URLs).
    pub fn endpoint(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("Base URL '{}' cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Performs a generic HTTP request and handles the response.
    ///
    /// # Arguments
    /// * `method` - The HTTP verb (GET, POST, etc.).
    /// * `url` - Absolute target, usually from [`ApiClient::endpoint`].
    ///
    /// # Errors
    /// Returns an `anyhow::Error` if network execution or decoding of a 2xx
    /// body fails. Non-2xx statuses are not errors here.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
    ) -> anyhow::Result<ApiResponse<T>> {
        // 1. Execute the request and capture response metadata
        log::debug!("{} {}", method, url);
        let response: reqwest::Response = self
            .inner
            .request(method, url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;
        let status = response.status();
        let resp_headers = response.headers().clone();

        // 2. Handle the result based on success status
        if status.is_success() {
            let bytes = response.bytes().await?;
            let data = if bytes.iter().all(u8::is_ascii_whitespace) {
                None
            } else {
                Some(
                    serde_json::from_slice::<T>(&bytes)
                        .with_context(|| format!("Invalid JSON body from {}", url))?,
                )
            };
            Ok(ApiResponse {
                data,
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers: resp_headers,
            })
        } else {
            // Capture the error body as a string for debugging
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
                headers: resp_headers,
            })
        }
    }

    /// `GET` of the endpoint made of `segments`.
    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> anyhow::Result<ApiResponse<T>> {
        let url = self.endpoint(segments)?;
        self.request(Method::GET, url).await
    }
}
