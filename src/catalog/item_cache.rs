//! # Item Cache
//!
//! Identifier -> resolved detail record. A stub whose identifier is not a key
//! here is unresolved; a stub whose fetch exhausted its retries is recorded as
//! unavailable for the rest of the session.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::SpeciesDetail;

/// Resolution status of a stub as seen by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Resolved,
    Pending,
    /// Retries exhausted; shown as "unknown"
    Unavailable,
}

#[derive(Debug, Default, Clone)]
pub struct ItemCache {
    entries: HashMap<String, Arc<SpeciesDetail>>,
    unavailable: HashSet<String>,
}

impl ItemCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a freshly resolved record. Idempotent per identifier: the
    /// first record wins and later equivalent fetches are dropped.
    ///
    /// Returns `true` when the identifier was not resolved before.
    pub fn insert(&mut self, detail: SpeciesDetail) -> bool {
        if self.entries.contains_key(&detail.identifier) {
            return false;
        }
        self.unavailable.remove(&detail.identifier);
        self.entries
            .insert(detail.identifier.clone(), Arc::new(detail));
        true
    }

    pub fn mark_unavailable(&mut self, identifier: &str) {
        if !self.entries.contains_key(identifier) {
            self.unavailable.insert(identifier.to_string());
        }
    }

    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&Arc<SpeciesDetail>> {
        self.entries.get(identifier)
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    #[must_use]
    pub fn is_unavailable(&self, identifier: &str) -> bool {
        self.unavailable.contains(identifier)
    }

    #[must_use]
    pub fn status(&self, identifier: &str) -> ItemStatus {
        if self.entries.contains_key(identifier) {
            ItemStatus::Resolved
        } else if self.unavailable.contains(identifier) {
            ItemStatus::Unavailable
        } else {
            ItemStatus::Pending
        }
    }

    /// Drops every entry, including unavailability marks.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.unavailable.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
