use crate::types::location::Location;
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of resolving a set of target localities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Every location accepted for a target, keyed by that target.
    pub matches: BTreeMap<String, Vec<Location>>,
    /// Targets that matched nothing in either pass.
    pub unresolved: Vec<String>,
}

impl Resolution {
    /// True when not a single target resolved.
    pub fn is_empty(&self) -> bool {
        self.matches.values().all(|locations| locations.is_empty())
    }

    /// All accepted locations, grouped by target in key order.
    pub fn locations(&self) -> Vec<Location> {
        self.matches.values().flatten().cloned().collect()
    }

    pub fn location_count(&self) -> usize {
        self.matches.values().map(Vec::len).sum()
    }

    /// The `(target, location id)` pairs, independent of the order they were found in.
    pub fn pairs(&self) -> BTreeSet<(String, i64)> {
        self.matches
            .iter()
            .flat_map(|(target, locations)| locations.iter().map(move |l| (target.clone(), l.id)))
            .collect()
    }
}
