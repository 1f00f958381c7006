//! Species profile: the detail-page view of a single species.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::species::SpeciesDetail;

/// Default language preference for flavor text.
pub const DEFAULT_LANGUAGES: [&str; 2] = ["es", "en"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlavorTextEntry {
    pub text: String,
    pub language: String,
}

/// Node of an evolution tree as returned upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionNode {
    pub identifier: String,
    pub numeric_id: Option<u32>,
    pub min_level: Option<u32>,
    pub evolves_to: Vec<EvolutionNode>,
}

/// One flattened entry of an evolution chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionStep {
    pub identifier: String,
    pub numeric_id: Option<u32>,
    pub min_level: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesProfile {
    pub detail: SpeciesDetail,
    pub description: Option<String>,
    pub evolutions: Vec<EvolutionStep>,
}

/// Picks the first flavor text in the first preferred language that has one.
///
/// Upstream text embeds form feeds and hard line breaks; both become spaces.
#[must_use]
pub fn select_description<S: AsRef<str>>(
    entries: &[FlavorTextEntry],
    languages: &[S],
) -> Option<String> {
    languages.iter().find_map(|lang| {
        entries
            .iter()
            .find(|entry| entry.language == lang.as_ref())
            .map(|entry| clean_flavor_text(&entry.text))
    })
}

fn clean_flavor_text(text: &str) -> String {
    text.split(['\n', '\u{c}', '\r'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flattens an evolution tree breadth-first, base form first.
#[must_use]
pub fn flatten_chain(root: &EvolutionNode) -> Vec<EvolutionStep> {
    let mut steps = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        steps.push(EvolutionStep {
            identifier: node.identifier.clone(),
            numeric_id: node.numeric_id,
            min_level: node.min_level,
        });
        queue.extend(node.evolves_to.iter());
    }
    steps
}
