//! # Catalog Engine
//!
//! Incremental acquisition, lazy detail resolution, filter reconciliation and
//! comparison selection for a paginated remote species catalog.
//!
//! - Explicit module files (no mod.rs)
//! - Transport behind the `CatalogApi` trait
//! - All view-owned state is mutated through `CatalogView`

pub mod acquirer;
pub mod api;
pub mod comparison;
pub mod debounce;
pub mod detail_fetcher;
pub mod errors;
pub mod events;
pub mod item_cache;
pub mod profile_loader;
pub mod reconciler;
pub mod retry;
pub mod view;

pub use acquirer::{AcquiredStubs, CatalogAcquirer, Paginator};
pub use api::{CatalogApi, ListPage, PageRequest, SpeciesEntry};
pub use comparison::{COMPARISON_CAPACITY, ComparisonSelector, ToggleOutcome};
pub use debounce::{SearchDebouncer, SearchUpdate};
pub use detail_fetcher::{DetailFetcher, FetchOutcome};
pub use errors::{CatalogError, CatalogResult};
pub use events::ViewEvent;
pub use item_cache::{ItemCache, ItemStatus};
pub use profile_loader::ProfileLoader;
pub use reconciler::{ResolutionPlan, compute_visible, plan_resolution};
pub use retry::RetryPolicy;
pub use view::{CatalogView, OperationStatus, ViewSnapshot, VisibleEntry};
