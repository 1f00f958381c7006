//! Loads the detail-page profile of one species: detail record, localized
//! description and flattened evolution chain.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::api::CatalogApi;
use super::errors::{CatalogError, CatalogResult};
use crate::domain::profile::{DEFAULT_LANGUAGES, flatten_chain, select_description};
use crate::domain::SpeciesProfile;
use crate::infrastructure::config::pokeapi;

pub struct ProfileLoader {
    api: Arc<dyn CatalogApi>,
    base_url: String,
    languages: Vec<String>,
}

impl ProfileLoader {
    pub fn new(api: Arc<dyn CatalogApi>, base_url: impl Into<String>) -> Self {
        Self {
            api,
            base_url: base_url.into(),
            languages: DEFAULT_LANGUAGES.iter().map(|l| (*l).to_string()).collect(),
        }
    }

    #[must_use]
    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.languages = languages;
        self
    }

    /// Fetches detail, then species entry, then evolution chain. Nothing is
    /// retried; a species without a chain yields an empty evolution list.
    pub async fn load(
        &self,
        identifier: &str,
        token: &CancellationToken,
    ) -> CatalogResult<SpeciesProfile> {
        let identifier = identifier.trim().to_lowercase();
        if identifier.is_empty() {
            return Err(CatalogError::InvalidInput("empty species identifier".into()));
        }

        let locator = pokeapi::detail_url(&self.base_url, &identifier);
        let detail = cancellable(token, self.api.fetch_detail(&locator)).await?;
        debug!(identifier = %detail.identifier, id = detail.numeric_id, "Profile detail loaded");

        let species = cancellable(token, self.api.fetch_species(detail.numeric_id)).await?;
        let description = select_description(&species.flavor_texts, &self.languages);

        let evolutions = match species.evolution_chain.as_deref() {
            Some(chain_url) => {
                let root = cancellable(token, self.api.fetch_evolution_chain(chain_url)).await?;
                flatten_chain(&root)
            }
            None => Vec::new(),
        };

        info!(
            identifier = %detail.identifier,
            evolutions = evolutions.len(),
            has_description = description.is_some(),
            "Profile loaded"
        );
        Ok(SpeciesProfile {
            detail,
            description,
            evolutions,
        })
    }
}

async fn cancellable<T>(
    token: &CancellationToken,
    operation: impl std::future::Future<Output = CatalogResult<T>>,
) -> CatalogResult<T> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(CatalogError::Cancelled),
        result = operation => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EvolutionNode;
    use crate::test_utils::{FAKE_BASE, FakeCatalog, RecordedRequest, shared};

    fn chain() -> EvolutionNode {
        let leaf = |name: &str, id: u32, level: u32| EvolutionNode {
            identifier: name.into(),
            numeric_id: Some(id),
            min_level: Some(level),
            evolves_to: Vec::new(),
        };
        EvolutionNode {
            identifier: "charmander".into(),
            numeric_id: Some(4),
            min_level: None,
            evolves_to: vec![EvolutionNode {
                evolves_to: vec![leaf("charizard", 6, 36)],
                ..leaf("charmeleon", 5, 16)
            }],
        }
    }

    #[tokio::test]
    async fn loads_detail_description_and_chain() {
        let chain_url = format!("{FAKE_BASE}/evolution-chain/4/");
        let (fake, api) = shared(FakeCatalog::generated(10).with_chain(&chain_url, chain()));
        let profile = ProfileLoader::new(api, FAKE_BASE)
            .load("Charmander", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(profile.detail.numeric_id, 4);
        assert_eq!(profile.description.as_deref(), Some("charmander se ve a menudo."));
        let names: Vec<_> = profile.evolutions.iter().map(|s| s.identifier.as_str()).collect();
        assert_eq!(names, ["charmander", "charmeleon", "charizard"]);
        assert_eq!(
            fake.requests(),
            vec![
                RecordedRequest::Detail(format!("{FAKE_BASE}/pokemon/charmander/")),
                RecordedRequest::Species(4),
                RecordedRequest::EvolutionChain(chain_url),
            ]
        );
    }

    #[tokio::test]
    async fn english_fallback() {
        let (_, api) = shared(FakeCatalog::generated(10));
        let profile = ProfileLoader::new(api, FAKE_BASE)
            .with_languages(vec!["fr".into(), "en".into()])
            .load("squirtle", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(profile.description.as_deref(), Some("squirtle is seen often."));
    }

    #[tokio::test]
    async fn unknown_species_surfaces_http_error() {
        let (_, api) = shared(FakeCatalog::generated(10));
        let result = ProfileLoader::new(api, FAKE_BASE)
            .load("missingno", &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(CatalogError::Http { status: 404, .. })));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let (fake, api) = shared(FakeCatalog::generated(10));
        let token = CancellationToken::new();
        token.cancel();
        let result = ProfileLoader::new(api, FAKE_BASE).load("pikachu", &token).await;
        assert_eq!(result, Err(CatalogError::Cancelled));
        assert!(fake.requests().is_empty());
    }
}
