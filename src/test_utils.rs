//! Test utilities for species-catalog
//!
//! An in-memory `CatalogApi` that serves a generated species catalog, records
//! every request, and can be told to fail or stall specific requests. Tests
//! stay isolated and never touch the network.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::catalog::api::{CatalogApi, ListPage, PageRequest, SpeciesEntry};
use crate::catalog::errors::{CatalogError, CatalogResult};
use crate::domain::{
    EvolutionNode, FlavorTextEntry, ImageRefs, KNOWN_CATEGORIES, SpeciesDetail, SpeciesStub,
};

pub const FAKE_BASE: &str = "https://fake.test/api/v2";

/// Well-known species placed at their real ids in generated catalogs.
const NAMED_SPECIES: &[(u32, &str, &[&str])] = &[
    (1, "bulbasaur", &["grass", "poison"]),
    (4, "charmander", &["fire"]),
    (5, "charmeleon", &["fire"]),
    (6, "charizard", &["fire", "flying"]),
    (7, "squirtle", &["water"]),
    (25, "pikachu", &["electric"]),
    (37, "vulpix", &["fire"]),
    (58, "growlithe", &["fire"]),
    (113, "chansey", &["normal"]),
    (133, "eevee", &["normal"]),
    (152, "chikorita", &["grass"]),
    (155, "cyndaquil", &["fire"]),
    (252, "treecko", &["grass"]),
];

/// Request observed by the fake, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedRequest {
    ListPage(PageRequest),
    Detail(String),
    Category(String),
    Species(u32),
    EvolutionChain(String),
}

#[must_use]
pub fn locator_for(numeric_id: u32) -> String {
    format!("{FAKE_BASE}/pokemon/{numeric_id}/")
}

#[must_use]
pub fn stub(name: &str, numeric_id: u32) -> SpeciesStub {
    SpeciesStub::new(name, locator_for(numeric_id))
}

#[must_use]
pub fn detail(name: &str, numeric_id: u32, categories: &[&str]) -> SpeciesDetail {
    SpeciesDetail {
        numeric_id,
        identifier: name.to_string(),
        categories: categories.iter().map(|c| (*c).to_string()).collect(),
        images: ImageRefs {
            official_artwork: Some(format!("https://fake.test/artwork/{numeric_id}.png")),
            front_default: Some(format!("https://fake.test/sprites/{numeric_id}.png")),
            animated_front: None,
            animated_back: None,
        },
        stats: BTreeMap::from([
            ("hp".to_string(), 40 + numeric_id % 60),
            ("attack".to_string(), 50 + numeric_id % 40),
            ("speed".to_string(), 30 + numeric_id % 70),
        ]),
    }
}

#[derive(Default)]
struct FakeState {
    requests: Vec<RecordedRequest>,
    /// identifier -> remaining failures before success
    detail_failures: HashMap<String, u32>,
    failing_categories: HashSet<String>,
    fail_list_pages: bool,
}

/// In-memory catalog service
pub struct FakeCatalog {
    species: Vec<SpeciesDetail>,
    chains: HashMap<String, EvolutionNode>,
    detail_latency: Duration,
    page_overlap: u32,
    state: Mutex<FakeState>,
}

impl FakeCatalog {
    /// Catalog with ids `1..=total`; well-known ids carry their real names.
    #[must_use]
    pub fn generated(total: u32) -> Self {
        let species = (1..=total)
            .map(|id| {
                NAMED_SPECIES.iter().find(|(known, _, _)| *known == id).map_or_else(
                    || {
                        let category = KNOWN_CATEGORIES[(id as usize) % KNOWN_CATEGORIES.len()];
                        detail(&format!("species-{id:04}"), id, &[category])
                    },
                    |(_, name, categories)| detail(name, id, categories),
                )
            })
            .collect();
        Self::from_species(species)
    }

    #[must_use]
    pub fn from_species(species: Vec<SpeciesDetail>) -> Self {
        Self {
            species,
            chains: HashMap::new(),
            detail_latency: Duration::ZERO,
            page_overlap: 0,
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Every detail request takes `latency` of (virtual) time.
    #[must_use]
    pub const fn with_detail_latency(mut self, latency: Duration) -> Self {
        self.detail_latency = latency;
        self
    }

    /// Each page after the first starts `overlap` entries early, as when the
    /// upstream list shifts between requests.
    #[must_use]
    pub const fn with_page_overlap(mut self, overlap: u32) -> Self {
        self.page_overlap = overlap;
        self
    }

    #[must_use]
    pub fn with_chain(mut self, locator: &str, chain: EvolutionNode) -> Self {
        self.chains.insert(locator.to_string(), chain);
        self
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fails the next `times` detail requests for `identifier` with a 503.
    pub fn fail_detail(&self, identifier: &str, times: u32) {
        self.state()
            .detail_failures
            .insert(identifier.to_string(), times);
    }

    pub fn fail_category(&self, category: &str) {
        self.state().failing_categories.insert(category.to_string());
    }

    pub fn fail_list_pages(&self, fail: bool) {
        self.state().fail_list_pages = fail;
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    #[must_use]
    pub fn list_requests(&self) -> Vec<PageRequest> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                RecordedRequest::ListPage(page) => Some(page),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn category_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                RecordedRequest::Category(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn detail_requests(&self, locator: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| matches!(r, RecordedRequest::Detail(l) if l == locator))
            .count()
    }

    #[must_use]
    pub fn total_detail_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| matches!(r, RecordedRequest::Detail(_)))
            .count()
    }

    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }

    #[must_use]
    pub fn stubs(&self) -> Vec<SpeciesStub> {
        self.species
            .iter()
            .map(|d| stub(&d.identifier, d.numeric_id))
            .collect()
    }

    fn record(&self, request: RecordedRequest) {
        self.state().requests.push(request);
    }

    fn count(&self) -> u32 {
        u32::try_from(self.species.len()).unwrap_or(u32::MAX)
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn fetch_list_page(&self, request: PageRequest) -> CatalogResult<ListPage> {
        self.record(RecordedRequest::ListPage(request));
        if self.state().fail_list_pages {
            return Err(CatalogError::Http {
                status: 500,
                url: format!("{FAKE_BASE}/pokemon?offset={}", request.offset),
            });
        }

        let start = if request.offset == 0 {
            0
        } else {
            request.offset.saturating_sub(self.page_overlap)
        };
        let end = request.offset.saturating_add(request.limit).min(self.count());
        let results = self
            .species
            .iter()
            .skip(start as usize)
            .take(end.saturating_sub(start) as usize)
            .map(|d| stub(&d.identifier, d.numeric_id))
            .collect();
        let next = (end < self.count())
            .then(|| format!("{FAKE_BASE}/pokemon?offset={end}&limit={}", request.limit));
        let previous = (request.offset > 0)
            .then(|| format!("{FAKE_BASE}/pokemon?offset=0&limit={}", request.limit));

        Ok(ListPage {
            count: self.count(),
            next,
            previous,
            results,
        })
    }

    async fn fetch_detail(&self, locator: &str) -> CatalogResult<SpeciesDetail> {
        self.record(RecordedRequest::Detail(locator.to_string()));
        if !self.detail_latency.is_zero() {
            tokio::time::sleep(self.detail_latency).await;
        }

        let found = self
            .species
            .iter()
            .find(|d| {
                locator_for(d.numeric_id) == locator
                    || format!("{FAKE_BASE}/pokemon/{}/", d.identifier) == locator
            })
            .cloned()
            .ok_or_else(|| CatalogError::Http {
                status: 404,
                url: locator.to_string(),
            })?;

        let mut state = self.state();
        if let Some(remaining) = state.detail_failures.get_mut(&found.identifier) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CatalogError::Http {
                    status: 503,
                    url: locator.to_string(),
                });
            }
        }
        Ok(found)
    }

    async fn fetch_category(&self, category: &str) -> CatalogResult<Vec<SpeciesStub>> {
        self.record(RecordedRequest::Category(category.to_string()));
        if self.state().failing_categories.contains(category) {
            return Err(CatalogError::Network(format!("connection reset for {category}")));
        }
        Ok(self
            .species
            .iter()
            .filter(|d| d.categories.iter().any(|c| c == category))
            .map(|d| stub(&d.identifier, d.numeric_id))
            .collect())
    }

    async fn fetch_species(&self, numeric_id: u32) -> CatalogResult<SpeciesEntry> {
        self.record(RecordedRequest::Species(numeric_id));
        let found = self
            .species
            .iter()
            .find(|d| d.numeric_id == numeric_id)
            .ok_or_else(|| CatalogError::Http {
                status: 404,
                url: format!("{FAKE_BASE}/pokemon-species/{numeric_id}/"),
            })?;
        Ok(SpeciesEntry {
            flavor_texts: vec![
                FlavorTextEntry {
                    text: format!("{} is\nseen often.", found.identifier),
                    language: "en".into(),
                },
                FlavorTextEntry {
                    text: format!("{} se ve\u{c}a menudo.", found.identifier),
                    language: "es".into(),
                },
            ],
            evolution_chain: Some(format!("{FAKE_BASE}/evolution-chain/{numeric_id}/")),
        })
    }

    async fn fetch_evolution_chain(&self, locator: &str) -> CatalogResult<EvolutionNode> {
        self.record(RecordedRequest::EvolutionChain(locator.to_string()));
        if let Some(chain) = self.chains.get(locator) {
            return Ok(chain.clone());
        }
        let numeric_id = locator
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|s| s.parse::<u32>().ok());
        let identifier = numeric_id
            .and_then(|id| self.species.iter().find(|d| d.numeric_id == id))
            .map(|d| d.identifier.clone())
            .ok_or_else(|| CatalogError::Http {
                status: 404,
                url: locator.to_string(),
            })?;
        Ok(EvolutionNode {
            identifier,
            numeric_id,
            min_level: None,
            evolves_to: Vec::new(),
        })
    }
}

/// Shared handle to a fake, usable both as `Arc<dyn CatalogApi>` and for
/// assertions.
#[must_use]
pub fn shared(fake: FakeCatalog) -> (Arc<FakeCatalog>, Arc<dyn CatalogApi>) {
    let fake = Arc::new(fake);
    let api: Arc<dyn CatalogApi> = fake.clone();
    (fake, api)
}
