//! # Data Retrieval Module
//!
//! HTTP access to the traffic server's catalog endpoints.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: a generic `ApiClient` built on `reqwest` and
//!   `reqwest-middleware`, with an optional exponential backoff retry policy.
//! - **`catalog`**: the `LineCatalog` and `BusDirectory` seams and the
//!   `HttpCatalog` that implements both on top of `ApiClient`.

/// Generic HTTP API client with retry middleware.
pub mod ky_http;
/// Line catalog and bus directory lookups.
pub mod catalog;

pub use catalog::{BusDirectory, CatalogConfig, CatalogError, HttpCatalog, LineCatalog};
pub use ky_http::{ApiClient, ApiResponse};
