//! Bounded two-item comparison selection.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::SpeciesDetail;

pub const COMPARISON_CAPACITY: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// Added after dropping the oldest entry
    Replaced { evicted: String },
}

/// Ordered selection, oldest first. Holds only resolved records.
#[derive(Debug, Default, Clone)]
pub struct ComparisonSelector {
    items: VecDeque<Arc<SpeciesDetail>>,
}

impl ComparisonSelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes `item` if it is selected, otherwise appends it, evicting the
    /// oldest entry when at capacity.
    pub fn toggle(&mut self, item: Arc<SpeciesDetail>) -> ToggleOutcome {
        if self.evict(&item.identifier) {
            return ToggleOutcome::Removed;
        }

        let evicted = if self.items.len() >= COMPARISON_CAPACITY {
            self.items.pop_front().map(|oldest| oldest.identifier.clone())
        } else {
            None
        };
        self.items.push_back(item);

        match evicted {
            Some(evicted) => ToggleOutcome::Replaced { evicted },
            None => ToggleOutcome::Added,
        }
    }

    /// Removes exactly the entry with `identifier`. Returns whether it was
    /// present.
    pub fn evict(&mut self, identifier: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.identifier != identifier);
        self.items.len() != before
    }

    #[must_use]
    pub fn current(&self) -> Vec<Arc<SpeciesDetail>> {
        self.items.iter().cloned().collect()
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.items.iter().any(|item| item.identifier == identifier)
    }

    /// Comparison is enabled only with a full selection.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.items.len() == COMPARISON_CAPACITY
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
