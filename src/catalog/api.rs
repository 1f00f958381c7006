//! Transport seam between the engine and the remote catalog service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::CatalogResult;
use crate::domain::{EvolutionNode, FlavorTextEntry, SpeciesDetail, SpeciesStub};

/// Offset/limit window of the collection endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: u32,
    pub limit: u32,
}

impl PageRequest {
    #[must_use]
    pub const fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    #[must_use]
    pub const fn next(&self) -> Self {
        Self {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}

/// One page of the collection endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage {
    pub count: u32,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<SpeciesStub>,
}

impl ListPage {
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

/// Remote catalog operations the engine depends on.
///
/// Implementations map non-success responses to `CatalogError::Http` and
/// connection failures to `CatalogError::Network`; they never retry.
#[async_trait]
pub trait CatalogApi: Send + Sync + 'static {
    /// `GET /pokemon?offset=&limit=`
    async fn fetch_list_page(&self, request: PageRequest) -> CatalogResult<ListPage>;

    /// Detail record addressed by a stub locator.
    async fn fetch_detail(&self, locator: &str) -> CatalogResult<SpeciesDetail>;

    /// Membership of a category index (`GET /type/{name}`).
    async fn fetch_category(&self, category: &str) -> CatalogResult<Vec<SpeciesStub>>;

    /// Flavor text entries and evolution chain locator for a species.
    async fn fetch_species(&self, numeric_id: u32) -> CatalogResult<SpeciesEntry>;

    async fn fetch_evolution_chain(&self, locator: &str) -> CatalogResult<EvolutionNode>;
}

/// Species-level record (`GET /pokemon-species/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesEntry {
    pub flavor_texts: Vec<FlavorTextEntry>,
    pub evolution_chain: Option<String>,
}
