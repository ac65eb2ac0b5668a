use crate::core::defaults::DefaultsRegistry;
use crate::models::{CompletionStatus, Criteria, SectionName, Weights};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Classify how far `live` has diverged from `defaults`
///
/// Only keys present in `defaults` are considered; a key missing from
/// `live` counts as changed. Values are compared with `PartialEq`, so
/// ordered collections are order- and length-sensitive.
///
/// - disabled: `Disabled`
/// - no key changed: `Default`
/// - every key changed: `Complete`
/// - otherwise: `Incomplete`
pub fn classify<K, V>(
    live: &BTreeMap<K, V>,
    defaults: &BTreeMap<K, V>,
    enabled: bool,
) -> CompletionStatus
where
    K: Ord,
    V: PartialEq,
{
    if !enabled {
        return CompletionStatus::Disabled;
    }

    let mut has_changes = false;
    let mut all_changed = true;

    for (key, default) in defaults {
        let changed = live.get(key).map_or(true, |value| value != default);
        has_changes |= changed;
        all_changed &= changed;
    }

    match (has_changes, all_changed) {
        (false, _) => CompletionStatus::Default,
        (true, true) => CompletionStatus::Complete,
        (true, false) => CompletionStatus::Incomplete,
    }
}

/// Status of one criteria section against the registry
pub fn classify_section(
    criteria: &Criteria,
    name: SectionName,
    registry: &DefaultsRegistry,
) -> CompletionStatus {
    let defaults = registry.section(name);
    match criteria.section(name) {
        Some(live) => classify(&live.filters, &defaults.filters, live.enabled),
        // A missing section is treated as untouched
        None => CompletionStatus::Default,
    }
}

/// Status of the weight vector. Weights cannot be disabled.
pub fn classify_weights(weights: &Weights, registry: &DefaultsRegistry) -> CompletionStatus {
    classify(weights.as_map(), registry.weights().as_map(), true)
}

/// Every section status plus the weights status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBoard {
    pub sections: BTreeMap<SectionName, CompletionStatus>,
    pub weights: CompletionStatus,
}

impl StatusBoard {
    pub fn compute(criteria: &Criteria, weights: &Weights, registry: &DefaultsRegistry) -> Self {
        let sections = SectionName::ALL
            .iter()
            .map(|name| (*name, classify_section(criteria, *name, registry)))
            .collect();

        Self {
            sections,
            weights: classify_weights(weights, registry),
        }
    }

    pub fn section(&self, name: SectionName) -> CompletionStatus {
        self.sections
            .get(&name)
            .copied()
            .unwrap_or(CompletionStatus::Default)
    }

    /// All statuses, sections first then weights
    pub fn all(&self) -> impl Iterator<Item = CompletionStatus> + '_ {
        self.sections.values().copied().chain(std::iter::once(self.weights))
    }
}
