use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Minimal catalog entry as emitted by a list, range or category request.
///
/// `identifier` is the unique species name, `locator` the URL of its detail
/// record. Stubs are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpeciesStub {
    pub identifier: String,
    pub locator: String,
}

impl SpeciesStub {
    pub fn new(identifier: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            locator: locator.into(),
        }
    }

    /// Numeric id encoded as the last path segment of the locator
    /// (`.../pokemon/25/` -> `25`).
    #[must_use]
    pub fn numeric_id(&self) -> Option<u32> {
        self.locator
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|segment| segment.parse().ok())
    }
}

impl AsRef<str> for SpeciesStub {
    fn as_ref(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for SpeciesStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.identifier, self.locator)
    }
}

/// Image references carried by a detail record. Every entry is optional
/// upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRefs {
    pub official_artwork: Option<String>,
    pub front_default: Option<String>,
    pub animated_front: Option<String>,
    pub animated_back: Option<String>,
}

impl ImageRefs {
    /// Best still image: official artwork, then the default sprite.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.official_artwork
            .as_deref()
            .or(self.front_default.as_deref())
    }
}

/// Fully resolved species record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesDetail {
    pub numeric_id: u32,
    pub identifier: String,
    /// Category (type) names in upstream slot order.
    pub categories: Vec<String>,
    pub images: ImageRefs,
    /// Base stat per stat name.
    pub stats: BTreeMap<String, u32>,
}

impl SpeciesDetail {
    /// True when any of this record's categories is in `wanted`.
    #[must_use]
    pub fn matches_any_category(&self, wanted: &BTreeSet<String>) -> bool {
        self.categories.iter().any(|c| wanted.contains(c))
    }

    #[must_use]
    pub fn primary_category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }

    #[must_use]
    pub fn stat(&self, name: &str) -> Option<u32> {
        self.stats.get(name).copied()
    }

    #[must_use]
    pub fn stat_total(&self) -> u32 {
        self.stats.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(categories: &[&str]) -> SpeciesDetail {
        SpeciesDetail {
            numeric_id: 4,
            identifier: "charmander".into(),
            categories: categories.iter().map(|c| (*c).to_string()).collect(),
            images: ImageRefs::default(),
            stats: BTreeMap::from([("hp".to_string(), 39), ("speed".to_string(), 65)]),
        }
    }

    #[test]
    fn numeric_id_from_locator() {
        let stub = SpeciesStub::new("pikachu", "https://pokeapi.co/api/v2/pokemon/25/");
        assert_eq!(stub.numeric_id(), Some(25));

        let no_slash = SpeciesStub::new("pikachu", "https://pokeapi.co/api/v2/pokemon/25");
        assert_eq!(no_slash.numeric_id(), Some(25));

        let by_name = SpeciesStub::new("pikachu", "https://pokeapi.co/api/v2/pokemon/pikachu/");
        assert_eq!(by_name.numeric_id(), None);
    }

    #[test]
    fn category_intersection() {
        let record = detail(&["fire"]);
        let wanted: BTreeSet<String> = ["water".to_string(), "fire".to_string()].into();
        assert!(record.matches_any_category(&wanted));
        assert!(!record.matches_any_category(&BTreeSet::from(["grass".to_string()])));
        assert_eq!(record.primary_category(), Some("fire"));
    }

    #[test]
    fn stat_helpers() {
        let record = detail(&["fire"]);
        assert_eq!(record.stat("hp"), Some(39));
        assert_eq!(record.stat("attack"), None);
        assert_eq!(record.stat_total(), 104);
    }

    #[test]
    fn primary_image_prefers_artwork() {
        let images = ImageRefs {
            official_artwork: None,
            front_default: Some("front.png".into()),
            ..ImageRefs::default()
        };
        assert_eq!(images.primary(), Some("front.png"));
    }
}
