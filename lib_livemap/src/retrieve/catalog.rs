//! # Line Catalog and Bus Directory
//!
//! Typed access to the traffic server's REST endpoints:
//!
//! | Call                         | Endpoint                      |
//! |------------------------------|-------------------------------|
//! | [`LineCatalog::lines`]       | `GET /api/lines`              |
//! | [`LineCatalog::line`]        | `GET /api/lines/{id}`         |
//! | [`LineCatalog::line_polyline`] | `GET /api/lines/{id}/route` |
//! | [`BusDirectory::bus_info`]   | `GET /api/buses/{id}/info`    |
//! | [`BusDirectory::bus_route`]  | `GET /api/buses/{id}/route`   |
//!
//! The stores only depend on the two traits, so they can be driven by
//! in-memory fakes in tests.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::model::{BusInfo, Line, LineRoute, Position};
use crate::retrieve::ky_http::ApiClient;

/// Configuration for the [`HttpCatalog`].
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base address of the traffic server, e.g. `http://localhost:8000`.
    pub base_address: String,
    /// Transient-failure retries in the HTTP middleware. The stores never retry
    /// on their own.
    pub max_retries: u32,
    pub request_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_address: "http://localhost:8000".to_string(),
            max_retries: 0,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Request(#[from] anyhow::Error),

    #[error("GET {path} returned HTTP {status}: {body}")]
    Status { path: String, status: u16, body: String },

    #[error("GET {path} returned no body")]
    Empty { path: String },
}

/// Read access to transit lines.
pub trait LineCatalog: Send + Sync + 'static {
    fn lines(&self) -> impl Future<Output = Result<Vec<Line>, CatalogError>> + Send;

    fn line(&self, line_id: &str) -> impl Future<Output = Result<Line, CatalogError>> + Send;

    /// Route geometry of a line, without its color.
    fn line_polyline(
        &self,
        line_id: &str,
    ) -> impl Future<Output = Result<Vec<Position>, CatalogError>> + Send;

    /// Fetches geometry and line record concurrently and joins them.
    fn line_route(&self, line_id: &str) -> impl Future<Output = Result<LineRoute, CatalogError>> + Send {
        async move {
            let (line, polyline) = tokio::try_join!(self.line(line_id), self.line_polyline(line_id))?;
            Ok(LineRoute::join(&line, polyline))
        }
    }
}

/// Read access to per-vehicle details.
pub trait BusDirectory: Send + Sync + 'static {
    fn bus_info(&self, bus_id: &str) -> impl Future<Output = Result<BusInfo, CatalogError>> + Send;

    fn bus_route(
        &self,
        bus_id: &str,
    ) -> impl Future<Output = Result<Vec<Position>, CatalogError>> + Send;
}

/// # HTTP Catalog
///
/// [`LineCatalog`] and [`BusDirectory`] over the traffic server's REST API.
#[derive(Clone)]
pub struct HttpCatalog {
    client: ApiClient,
}

impl HttpCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = ApiClient::new(&config.base_address, config.max_retries, config.request_timeout)?;
        Ok(Self { client })
    }

    /// GETs the endpoint made of `segments` and requires a 2xx status with a
    /// JSON body. Ids are passed as single segments and get percent-encoded.
    async fn fetch<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, CatalogError> {
        let response = self.client.get::<T>(segments).await?;
        let path = segments.join("/");

        if !response.success {
            return Err(CatalogError::Status {
                path,
                status: response.status,
                body: response.error_body.unwrap_or_default(),
            });
        }

        response.data.ok_or(CatalogError::Empty { path })
    }
}

impl LineCatalog for HttpCatalog {
    async fn lines(&self) -> Result<Vec<Line>, CatalogError> {
        self.fetch(&["api", "lines"]).await
    }

    async fn line(&self, line_id: &str) -> Result<Line, CatalogError> {
        self.fetch(&["api", "lines", line_id]).await
    }

    async fn line_polyline(&self, line_id: &str) -> Result<Vec<Position>, CatalogError> {
        self.fetch(&["api", "lines", line_id, "route"]).await
    }
}

impl BusDirectory for HttpCatalog {
    async fn bus_info(&self, bus_id: &str) -> Result<BusInfo, CatalogError> {
        self.fetch(&["api", "buses", bus_id, "info"]).await
    }

    async fn bus_route(&self, bus_id: &str) -> Result<Vec<Position>, CatalogError> {
        self.fetch(&["api", "buses", bus_id, "route"]).await
    }
}
