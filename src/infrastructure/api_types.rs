//! Wire format of the catalog service and its mapping onto domain types.
//!
//! Only the fields the engine reads are modeled; everything else in the
//! upstream payloads is ignored by serde.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::catalog::api::{ListPage, SpeciesEntry};
use crate::domain::{EvolutionNode, FlavorTextEntry, ImageRefs, SpeciesDetail, SpeciesStub};

/// `{ name, url }` reference used all over the API
#[derive(Debug, Clone, Deserialize)]
pub struct NamedResource {
    pub name: String,
    pub url: String,
}

impl NamedResource {
    /// Numeric id from the trailing path segment of `url`
    pub fn numeric_id(&self) -> Option<u32> {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|segment| segment.parse().ok())
    }
}

impl From<NamedResource> for SpeciesStub {
    fn from(resource: NamedResource) -> Self {
        Self::new(resource.name, resource.url)
    }
}

#[derive(Debug, Deserialize)]
pub struct ListResponse {
    pub count: u32,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<NamedResource>,
}

impl From<ListResponse> for ListPage {
    fn from(response: ListResponse) -> Self {
        Self {
            count: response.count,
            next: response.next,
            previous: response.previous,
            results: response.results.into_iter().map(SpeciesStub::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DetailResponse {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeSlot>,
    #[serde(default)]
    pub sprites: Sprites,
    #[serde(default)]
    pub stats: Vec<StatEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TypeSlot {
    pub slot: u32,
    #[serde(rename = "type")]
    pub kind: NamedResource,
}

#[derive(Debug, Deserialize)]
pub struct StatEntry {
    pub base_stat: u32,
    pub stat: NamedResource,
}

#[derive(Debug, Default, Deserialize)]
pub struct Sprites {
    pub front_default: Option<String>,
    #[serde(default)]
    pub other: OtherSprites,
    #[serde(default)]
    pub versions: VersionSprites,
}

#[derive(Debug, Default, Deserialize)]
pub struct OtherSprites {
    #[serde(rename = "official-artwork", default)]
    pub official_artwork: FrontSprite,
}

#[derive(Debug, Default, Deserialize)]
pub struct FrontSprite {
    pub front_default: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VersionSprites {
    #[serde(rename = "generation-v", default)]
    pub generation_v: GenerationVSprites,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerationVSprites {
    #[serde(rename = "black-white", default)]
    pub black_white: BlackWhiteSprites,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlackWhiteSprites {
    #[serde(default)]
    pub animated: AnimatedSprites,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnimatedSprites {
    pub front_default: Option<String>,
    pub back_default: Option<String>,
}

impl From<DetailResponse> for SpeciesDetail {
    fn from(response: DetailResponse) -> Self {
        let mut types = response.types;
        types.sort_by_key(|t| t.slot);
        let animated = response.sprites.versions.generation_v.black_white.animated;

        Self {
            numeric_id: response.id,
            identifier: response.name,
            categories: types.into_iter().map(|t| t.kind.name).collect(),
            images: ImageRefs {
                official_artwork: response.sprites.other.official_artwork.front_default,
                front_default: response.sprites.front_default,
                animated_front: animated.front_default,
                animated_back: animated.back_default,
            },
            stats: response
                .stats
                .into_iter()
                .map(|s| (s.stat.name, s.base_stat))
                .collect::<BTreeMap<_, _>>(),
        }
    }
}

/// `GET /type/{name}`
#[derive(Debug, Deserialize)]
pub struct CategoryResponse {
    pub pokemon: Vec<CategoryMember>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryMember {
    pub pokemon: NamedResource,
}

impl CategoryResponse {
    pub fn into_stubs(self) -> Vec<SpeciesStub> {
        self.pokemon
            .into_iter()
            .map(|member| SpeciesStub::from(member.pokemon))
            .collect()
    }
}

/// `GET /pokemon-species/{id}`
#[derive(Debug, Deserialize)]
pub struct SpeciesResponse {
    #[serde(default)]
    pub flavor_text_entries: Vec<FlavorTextRecord>,
    pub evolution_chain: Option<UrlRef>,
}

#[derive(Debug, Deserialize)]
pub struct FlavorTextRecord {
    pub flavor_text: String,
    pub language: NamedResource,
}

#[derive(Debug, Deserialize)]
pub struct UrlRef {
    pub url: String,
}

impl From<SpeciesResponse> for SpeciesEntry {
    fn from(response: SpeciesResponse) -> Self {
        Self {
            flavor_texts: response
                .flavor_text_entries
                .into_iter()
                .map(|entry| FlavorTextEntry {
                    text: entry.flavor_text,
                    language: entry.language.name,
                })
                .collect(),
            evolution_chain: response.evolution_chain.map(|chain| chain.url),
        }
    }
}

/// `GET /evolution-chain/{id}`
#[derive(Debug, Deserialize)]
pub struct EvolutionChainResponse {
    pub chain: ChainLink,
}

#[derive(Debug, Deserialize)]
pub struct ChainLink {
    pub species: NamedResource,
    #[serde(default)]
    pub evolution_details: Vec<EvolutionDetail>,
    #[serde(default)]
    pub evolves_to: Vec<ChainLink>,
}

#[derive(Debug, Deserialize)]
pub struct EvolutionDetail {
    pub min_level: Option<u32>,
}

impl From<ChainLink> for EvolutionNode {
    fn from(link: ChainLink) -> Self {
        Self {
            numeric_id: link.species.numeric_id(),
            min_level: link.evolution_details.iter().find_map(|d| d.min_level),
            identifier: link.species.name,
            evolves_to: link.evolves_to.into_iter().map(Self::from).collect(),
        }
    }
}
