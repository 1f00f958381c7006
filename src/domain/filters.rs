//! # Filter vocabulary
//!
//! Filter state, the acquisition mode it implies, and the fixed generation
//! bands that range filters refer to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Contiguous numeric-id band selectable as a range filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Generation {
    pub id: u32,
    pub name: &'static str,
    pub lower: u32,
    pub upper: u32,
}

impl Generation {
    /// Zero-based list offset of the first id in the band.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.lower - 1
    }

    /// Number of ids in the band.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.upper - self.lower + 1
    }

    #[must_use]
    pub const fn contains(&self, numeric_id: u32) -> bool {
        numeric_id >= self.lower && numeric_id <= self.upper
    }
}

pub const GENERATIONS: [Generation; 9] = [
    Generation { id: 1, name: "Generation I", lower: 1, upper: 151 },
    Generation { id: 2, name: "Generation II", lower: 152, upper: 251 },
    Generation { id: 3, name: "Generation III", lower: 252, upper: 386 },
    Generation { id: 4, name: "Generation IV", lower: 387, upper: 493 },
    Generation { id: 5, name: "Generation V", lower: 494, upper: 649 },
    Generation { id: 6, name: "Generation VI", lower: 650, upper: 721 },
    Generation { id: 7, name: "Generation VII", lower: 722, upper: 809 },
    Generation { id: 8, name: "Generation VIII", lower: 810, upper: 905 },
    Generation { id: 9, name: "Generation IX", lower: 906, upper: 1025 },
];

/// Category names offered by the filter panel.
pub const KNOWN_CATEGORIES: [&str; 18] = [
    "normal", "fire", "water", "electric", "grass", "ice", "fighting", "poison", "ground",
    "flying", "psychic", "bug", "rock", "ghost", "dragon", "dark", "steel", "fairy",
];

#[must_use]
pub fn generation(id: u32) -> Option<&'static Generation> {
    GENERATIONS.iter().find(|g| g.id == id)
}

#[must_use]
pub fn generation_of(numeric_id: u32) -> Option<&'static Generation> {
    GENERATIONS.iter().find(|g| g.contains(numeric_id))
}

/// Strategy used to build the stub list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcquisitionMode {
    Paginated,
    RangeScan,
    CategoryScan,
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Paginated => "paginated",
            Self::RangeScan => "range-scan",
            Self::CategoryScan => "category-scan",
        };
        f.write_str(label)
    }
}

/// The part of the filter state that determines which requests build the
/// stub list. Two states with the same key share the same stub list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionKey {
    Paginated,
    Ranges(BTreeSet<u32>),
    Categories(BTreeSet<String>),
}

impl AcquisitionKey {
    #[must_use]
    pub const fn mode(&self) -> AcquisitionMode {
        match self {
            Self::Paginated => AcquisitionMode::Paginated,
            Self::Ranges(_) => AcquisitionMode::RangeScan,
            Self::Categories(_) => AcquisitionMode::CategoryScan,
        }
    }
}

/// Active search and filter predicates.
///
/// An empty `categories` or `ranges` set means no constraint of that kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub search_term: String,
    pub categories: BTreeSet<String>,
    pub ranges: BTreeSet<u32>,
}

impl FilterState {
    /// Builds a filter state with normalized (trimmed, lower-cased) inputs.
    pub fn new<C, S>(search_term: &str, categories: C, ranges: impl IntoIterator<Item = u32>) -> Self
    where
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            search_term: normalize(search_term),
            categories: normalize_categories(categories),
            ranges: ranges.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> AcquisitionMode {
        self.acquisition_key().mode()
    }

    #[must_use]
    pub fn acquisition_key(&self) -> AcquisitionKey {
        if !self.ranges.is_empty() {
            AcquisitionKey::Ranges(self.ranges.clone())
        } else if !self.categories.is_empty() {
            AcquisitionKey::Categories(self.categories.clone())
        } else {
            AcquisitionKey::Paginated
        }
    }

    #[must_use]
    pub fn has_category_filter(&self) -> bool {
        !self.categories.is_empty()
    }

    #[must_use]
    pub fn has_constraints(&self) -> bool {
        !self.categories.is_empty() || !self.ranges.is_empty()
    }
}

pub(crate) fn normalize(term: &str) -> String {
    term.trim().to_lowercase()
}

pub(crate) fn normalize_categories<C, S>(categories: C) -> BTreeSet<String>
where
    C: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    categories
        .into_iter()
        .map(|c| normalize(c.as_ref()))
        .filter(|c| !c.is_empty())
        .collect()
}
