//! Species Catalog - filterable catalog engine over a remote species API
//!
//! The engine builds a stub list with one of three acquisition strategies
//! (paginated, range scan, category scan), resolves detail records in
//! rate-limited background batches, and derives the visible set from the
//! current filters and the item cache.

// Module declarations
pub mod catalog;
pub mod domain;
pub mod infrastructure;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use catalog::{
    CatalogError, CatalogResult, CatalogView, OperationStatus, ProfileLoader, ToggleOutcome,
    ViewEvent, ViewSnapshot,
};
pub use domain::{FilterState, SpeciesDetail, SpeciesProfile, SpeciesStub};
pub use infrastructure::{AppConfig, ConfigManager, HttpClient};
