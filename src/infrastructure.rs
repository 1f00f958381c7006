//! Infrastructure layer: configuration, logging and the HTTP transport
//!
//! Everything that touches the outside world lives here. The catalog engine
//! only sees the `CatalogApi` trait that `HttpClient` implements.

pub mod api_types; // Wire format of the catalog service
pub mod config; // Configuration constants and helpers
pub mod http_client; // Rate-limited CatalogApi implementation
pub mod logging; // Logging infrastructure

pub use config::{AppConfig, ConfigManager, pokeapi};
pub use http_client::HttpClient;
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
