//! # Filter Reconciler
//!
//! Pure functions over (stub list, item cache, filter state): the visible set
//! and the plan of which unresolved stubs to resolve next.

use crate::domain::{FilterState, SpeciesStub};

use super::item_cache::{ItemCache, ItemStatus};

/// Computes the visible stubs, preserving acquisition order.
///
/// 1. Search: the identifier contains the (lower-cased) term; an empty term
///    matches every stub.
/// 2. Category: with a category filter active, only stubs whose cached
///    detail intersects the filter survive. Unresolved stubs are excluded.
///
/// Ranges are enforced by the acquisition mode and are not re-checked here.
#[must_use]
pub fn compute_visible(
    stubs: &[SpeciesStub],
    cache: &ItemCache,
    filters: &FilterState,
) -> Vec<SpeciesStub> {
    search_matches(stubs, &filters.search_term)
        .filter(|stub| passes_category_filter(stub, cache, filters))
        .cloned()
        .collect()
}

fn search_matches<'a>(
    stubs: &'a [SpeciesStub],
    term: &'a str,
) -> impl Iterator<Item = &'a SpeciesStub> + 'a {
    let term = term.trim().to_lowercase();
    stubs
        .iter()
        .filter(move |stub| term.is_empty() || stub.identifier.to_lowercase().contains(&term))
}

fn passes_category_filter(stub: &SpeciesStub, cache: &ItemCache, filters: &FilterState) -> bool {
    if !filters.has_category_filter() {
        return true;
    }
    cache
        .get(&stub.identifier)
        .is_some_and(|detail| detail.matches_any_category(&filters.categories))
}

/// Batched resolution work derived from the current state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionPlan {
    /// Pending stubs inside the resolution window, in batch order
    pub batches: Vec<Vec<SpeciesStub>>,
    /// Pending stubs past the window, waiting for "load more results"
    pub deferred: usize,
}

impl ResolutionPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    #[must_use]
    pub fn scheduled(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}

/// Plans background resolution for an active category filter.
///
/// Only the first `window` search-matching stubs are considered; of those,
/// the ones still pending (neither cached nor marked unavailable) are split
/// into batches of `batch_size`. Without a category filter nothing is
/// scheduled, since unfiltered views resolve on demand.
#[must_use]
pub fn plan_resolution(
    stubs: &[SpeciesStub],
    cache: &ItemCache,
    filters: &FilterState,
    window: usize,
    batch_size: usize,
) -> ResolutionPlan {
    if !filters.has_category_filter() || batch_size == 0 {
        return ResolutionPlan::default();
    }

    let (inside, outside): (Vec<_>, Vec<_>) = search_matches(stubs, &filters.search_term)
        .enumerate()
        .filter(|(_, stub)| cache.status(&stub.identifier) == ItemStatus::Pending)
        .partition(|(position, _)| *position < window);

    let pending: Vec<SpeciesStub> = inside.into_iter().map(|(_, stub)| stub.clone()).collect();
    ResolutionPlan {
        batches: pending.chunks(batch_size).map(<[SpeciesStub]>::to_vec).collect(),
        deferred: outside.len(),
    }
}
