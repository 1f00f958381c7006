//! # Catalog Acquirer
//!
//! Builds the ordered stub list for the active acquisition mode:
//! sequential pages, one bulk request per selected generation band, or one
//! category-index request per selected category. Sub-requests of a scan run
//! concurrently and a single failure aborts the whole scan.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::api::{CatalogApi, ListPage, PageRequest};
use super::errors::{CatalogError, CatalogResult};
use crate::domain::{AcquisitionKey, FilterState, SpeciesStub, generation};

/// Stub list produced by one acquisition pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredStubs {
    pub key: AcquisitionKey,
    pub stubs: Vec<SpeciesStub>,
    pub paginator: Paginator,
}

impl AcquiredStubs {
    #[must_use]
    pub const fn more_available(&self) -> bool {
        self.paginator.more_available()
    }
}

/// Cursor over the collection endpoint. Exhausted for scan modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    next: Option<PageRequest>,
}

impl Paginator {
    #[must_use]
    pub const fn start(page_size: u32) -> Self {
        Self {
            next: Some(PageRequest::new(0, page_size)),
        }
    }

    #[must_use]
    pub const fn exhausted() -> Self {
        Self { next: None }
    }

    #[must_use]
    pub const fn next_request(&self) -> Option<PageRequest> {
        self.next
    }

    #[must_use]
    pub const fn more_available(&self) -> bool {
        self.next.is_some()
    }

    /// Moves past `request` once its page has been merged. "More" is taken
    /// from the upstream `next` link, never inferred from the page size.
    pub fn advance(&mut self, request: PageRequest, page: &ListPage) {
        self.next = page.has_more().then(|| request.next());
    }
}

pub struct CatalogAcquirer {
    api: Arc<dyn CatalogApi>,
    page_size: u32,
}

impl CatalogAcquirer {
    pub fn new(api: Arc<dyn CatalogApi>, page_size: u32) -> Self {
        Self { api, page_size }
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Acquires the stub list from scratch for the mode implied by `filters`.
    pub async fn acquire(
        &self,
        filters: &FilterState,
        token: &CancellationToken,
    ) -> CatalogResult<AcquiredStubs> {
        let key = filters.acquisition_key();
        info!(mode = %key.mode(), "Acquiring catalog");

        let (stubs, paginator) = match &key {
            AcquisitionKey::Paginated => {
                let mut paginator = Paginator::start(self.page_size);
                let request = PageRequest::new(0, self.page_size);
                let page = self.fetch_page(request, token).await?;
                paginator.advance(request, &page);
                (dedup_by_identifier(page.results), paginator)
            }
            AcquisitionKey::Ranges(ranges) => {
                (self.range_scan(ranges, token).await?, Paginator::exhausted())
            }
            AcquisitionKey::Categories(categories) => (
                self.category_scan(categories, token).await?,
                Paginator::exhausted(),
            ),
        };

        info!(mode = %key.mode(), stubs = stubs.len(), "Catalog acquired");
        Ok(AcquiredStubs {
            key,
            stubs,
            paginator,
        })
    }

    /// Fetches one page of the collection endpoint.
    pub async fn fetch_page(
        &self,
        request: PageRequest,
        token: &CancellationToken,
    ) -> CatalogResult<ListPage> {
        debug!(offset = request.offset, limit = request.limit, "Fetching list page");
        tokio::select! {
            biased;
            () = token.cancelled() => Err(CatalogError::Cancelled),
            page = self.api.fetch_list_page(request) => page,
        }
    }

    /// One bulk request per generation band, all in flight together.
    pub async fn range_scan(
        &self,
        ranges: &BTreeSet<u32>,
        token: &CancellationToken,
    ) -> CatalogResult<Vec<SpeciesStub>> {
        let requests = ranges
            .iter()
            .map(|id| {
                generation(*id)
                    .map(|band| PageRequest::new(band.offset(), band.limit()))
                    .ok_or(CatalogError::UnknownRange(*id))
            })
            .collect::<CatalogResult<Vec<_>>>()?;

        let pages = tokio::select! {
            biased;
            () = token.cancelled() => return Err(CatalogError::Cancelled),
            pages = try_join_all(requests.into_iter().map(|r| self.api.fetch_list_page(r))) => pages?,
        };

        Ok(dedup_by_identifier(
            pages.into_iter().flat_map(|page| page.results),
        ))
    }

    /// One category-index request per category, all in flight together.
    pub async fn category_scan(
        &self,
        categories: &BTreeSet<String>,
        token: &CancellationToken,
    ) -> CatalogResult<Vec<SpeciesStub>> {
        let memberships = tokio::select! {
            biased;
            () = token.cancelled() => return Err(CatalogError::Cancelled),
            lists = try_join_all(categories.iter().map(|c| self.api.fetch_category(c))) => lists?,
        };

        Ok(dedup_by_identifier(memberships.into_iter().flatten()))
    }
}

/// Keeps the first occurrence of every identifier, preserving order.
pub fn dedup_by_identifier(stubs: impl IntoIterator<Item = SpeciesStub>) -> Vec<SpeciesStub> {
    let mut seen = HashSet::new();
    stubs
        .into_iter()
        .filter(|stub| seen.insert(stub.identifier.clone()))
        .collect()
}

/// Appends stubs whose identifier is not already present. Returns the
/// number appended.
pub fn merge_unique(
    existing: &mut Vec<SpeciesStub>,
    incoming: impl IntoIterator<Item = SpeciesStub>,
) -> usize {
    let mut seen: HashSet<String> = existing.iter().map(|s| s.identifier.clone()).collect();
    let before = existing.len();
    existing.extend(
        incoming
            .into_iter()
            .filter(|stub| seen.insert(stub.identifier.clone())),
    );
    existing.len() - before
}
