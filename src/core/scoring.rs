use crate::core::defaults::DefaultsRegistry;
use crate::models::{
    AttributeValue, Criteria, Dimension, FieldValue, MatchCandidate, SectionName, Weights,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Candidate attribute compared against `Criteria::interests`
pub const INTERESTS_ATTRIBUTE: &str = "programs";

/// Criteria and weights captured together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaSnapshot {
    pub criteria: Criteria,
    pub weights: Weights,
}

/// Pluggable scenario scoring
///
/// The oracle's real formula is not observable from the client, so the
/// scenario engine only depends on this trait. `basis` is the snapshot the
/// candidate set was ranked under; `scenario` the hypothetical one.
pub trait ScoringStrategy: Send + Sync {
    fn score(
        &self,
        candidate: &MatchCandidate,
        basis: &CriteriaSnapshot,
        scenario: &CriteriaSnapshot,
    ) -> u8;
}

/// Per-section fit of one candidate, each value within `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitBreakdown {
    pub sections: BTreeMap<SectionName, f64>,
    pub interests: Option<f64>,
    pub total: f64,
}

/// Approximate scorer anchored to the oracle's score
///
/// Fit is computed for both snapshots and the difference, scaled to
/// points, is applied to `score_original`. Identical snapshots always
/// give a zero delta.
///
/// Fit formula:
/// total = sum(section_fit * weight[section] + interest_fit * weight[interests])
///         / sum(weights of the terms that have a fit)
///
/// Only filters that differ from their default act as constraints; a
/// snapshot with no active constraint fits every candidate at 1.0.
#[derive(Debug, Clone)]
pub struct AnchoredFitStrategy {
    registry: &'static DefaultsRegistry,
}

impl AnchoredFitStrategy {
    pub fn new(registry: &'static DefaultsRegistry) -> Self {
        Self { registry }
    }
}

impl Default for AnchoredFitStrategy {
    fn default() -> Self {
        Self::new(DefaultsRegistry::global())
    }
}

impl ScoringStrategy for AnchoredFitStrategy {
    fn score(
        &self,
        candidate: &MatchCandidate,
        basis: &CriteriaSnapshot,
        scenario: &CriteriaSnapshot,
    ) -> u8 {
        if basis == scenario {
            return candidate.score_original.min(100);
        }

        let before = calculate_fit(candidate, basis, self.registry).total;
        let after = calculate_fit(candidate, scenario, self.registry).total;
        let shifted = candidate.score_original as f64 + (after - before) * 100.0;

        shifted.round().clamp(0.0, 100.0) as u8
    }
}

/// Fit of a candidate against a criteria snapshot
pub fn calculate_fit(
    candidate: &MatchCandidate,
    snapshot: &CriteriaSnapshot,
    registry: &DefaultsRegistry,
) -> FitBreakdown {
    let mut sections = BTreeMap::new();
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;

    for (name, section) in &snapshot.criteria.sections {
        if !section.enabled {
            continue;
        }
        let defaults = &registry.section(*name).filters;
        if let Some(fit) = section_fit(&section.filters, defaults, &candidate.attributes) {
            let w = snapshot.weights.get(name.dimension());
            weighted += fit * w;
            weight_sum += w;
            sections.insert(*name, fit);
        }
    }

    let interests = interest_fit(&snapshot.criteria.interests, &candidate.attributes);
    if let Some(fit) = interests {
        let w = snapshot.weights.get(Dimension::Interests);
        weighted += fit * w;
        weight_sum += w;
    }

    let total = if weight_sum > 0.0 {
        (weighted / weight_sum).clamp(0.0, 1.0)
    } else {
        1.0
    };

    FitBreakdown {
        sections,
        interests,
        total,
    }
}

/// Mean fit over the section's active constraints, if it has any
fn section_fit(
    filters: &BTreeMap<String, FieldValue>,
    defaults: &BTreeMap<String, FieldValue>,
    attributes: &BTreeMap<String, AttributeValue>,
) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;

    for (field, filter) in filters {
        if defaults.get(field) == Some(filter) {
            continue;
        }
        if let Some(fit) = attributes.get(field).and_then(|attr| field_fit(filter, attr)) {
            sum += fit;
            count += 1;
        }
    }

    (count > 0).then(|| sum / count as f64)
}

/// Fit (0-1) of one attribute against one filter
///
/// Returns `None` when the filter is unconstrained or the attribute has
/// an incompatible shape.
#[inline]
pub fn field_fit(filter: &FieldValue, attr: &AttributeValue) -> Option<f64> {
    match (filter, attr) {
        (FieldValue::Flag(required), AttributeValue::Flag(actual)) => {
            Some(if required == actual { 1.0 } else { 0.0 })
        }
        (FieldValue::Number(threshold), AttributeValue::Number(actual)) => {
            Some(minimum_fit(*actual, *threshold))
        }
        (FieldValue::Range { min, max }, AttributeValue::Number(actual)) => {
            Some(range_fit(*actual, *min, *max))
        }
        (FieldValue::Choice(wanted), AttributeValue::Text(actual)) => {
            if wanted.eq_ignore_ascii_case("any") {
                None
            } else {
                Some(if wanted.eq_ignore_ascii_case(actual) { 1.0 } else { 0.0 })
            }
        }
        (FieldValue::Tags(wanted), AttributeValue::Tags(actual)) => overlap_fit(wanted, actual),
        (FieldValue::Tags(wanted), AttributeValue::Text(actual)) => {
            overlap_fit(wanted, std::slice::from_ref(actual))
        }
        _ => None,
    }
}

/// Numbers act as minimums; shortfall scales linearly
#[inline]
fn minimum_fit(actual: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 || actual >= threshold {
        return 1.0;
    }
    (actual / threshold).clamp(0.0, 1.0)
}

/// Full fit inside the range, decaying with distance outside it
#[inline]
fn range_fit(actual: f64, min: f64, max: f64) -> f64 {
    if actual >= min && actual <= max {
        return 1.0;
    }

    let width = (max - min).max(1.0);
    let deviation = if actual < min { min - actual } else { actual - max };

    1.0 - (deviation / width).min(1.0)
}

/// Share of wanted tags present on the candidate
fn overlap_fit(wanted: &[String], actual: &[String]) -> Option<f64> {
    if wanted.is_empty() {
        return None;
    }
    let shared = wanted
        .iter()
        .filter(|w| actual.iter().any(|a| a.eq_ignore_ascii_case(w)))
        .count();
    Some(shared as f64 / wanted.len() as f64)
}

fn interest_fit(
    interests: &[String],
    attributes: &BTreeMap<String, AttributeValue>,
) -> Option<f64> {
    match attributes.get(INTERESTS_ATTRIBUTE) {
        Some(AttributeValue::Tags(programs)) => overlap_fit(interests, programs),
        Some(AttributeValue::Text(program)) => overlap_fit(interests, std::slice::from_ref(program)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(score: u8, attrs: Vec<(&str, AttributeValue)>) -> MatchCandidate {
        MatchCandidate {
            id: "u1".into(),
            name: "Test University".into(),
            score_original: score,
            location: None,
            attributes: attrs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    fn baseline() -> CriteriaSnapshot {
        let registry = DefaultsRegistry::global();
        CriteriaSnapshot {
            criteria: registry.criteria().clone(),
            weights: registry.weights().clone(),
        }
    }

    #[test]
    fn test_range_fit() {
        assert_eq!(range_fit(50.0, 40.0, 60.0), 1.0);
        assert!(range_fit(30.0, 40.0, 60.0) < 1.0);
        assert_eq!(range_fit(500.0, 40.0, 60.0), 0.0);
    }

    #[test]
    fn test_minimum_fit() {
        assert_eq!(minimum_fit(90.0, 80.0), 1.0);
        assert_eq!(minimum_fit(40.0, 80.0), 0.5);
        assert_eq!(minimum_fit(10.0, 0.0), 1.0);
    }

    #[test]
    fn test_choice_any_is_unconstrained() {
        let attr = AttributeValue::Text("urban".into());
        assert_eq!(field_fit(&FieldValue::Choice("any".into()), &attr), None);
        assert_eq!(field_fit(&FieldValue::Choice("Urban".into()), &attr), Some(1.0));
        assert_eq!(field_fit(&FieldValue::Choice("rural".into()), &attr), Some(0.0));
    }

    #[test]
    fn test_unconstrained_snapshot_fits_fully() {
        let c = candidate(70, vec![("meritAid", AttributeValue::Flag(false))]);
        let fit = calculate_fit(&c, &baseline(), DefaultsRegistry::global());
        assert_eq!(fit.total, 1.0);
        assert!(fit.sections.is_empty());
    }

    #[test]
    fn test_identical_snapshots_keep_original_score() {
        let strategy = AnchoredFitStrategy::default();
        let c = candidate(64, vec![]);
        assert_eq!(strategy.score(&c, &baseline(), &baseline()), 64);
    }

    #[test]
    fn test_unmet_constraint_lowers_score() {
        let strategy = AnchoredFitStrategy::default();
        let c = candidate(80, vec![("meritAid", AttributeValue::Flag(false))]);

        let mut scenario = baseline();
        scenario
            .criteria
            .sections
            .get_mut(&SectionName::Financials)
            .unwrap()
            .filters
            .insert("meritAid".into(), FieldValue::Flag(true));

        assert!(strategy.score(&c, &baseline(), &scenario) < 80);
    }

    #[test]
    fn test_disabled_section_is_ignored() {
        let c = candidate(80, vec![("meritAid", AttributeValue::Flag(false))]);
        let mut snapshot = baseline();
        let fin = snapshot.criteria.sections.get_mut(&SectionName::Financials).unwrap();
        fin.filters.insert("meritAid".into(), FieldValue::Flag(true));
        fin.enabled = false;

        let fit = calculate_fit(&c, &snapshot, DefaultsRegistry::global());
        assert_eq!(fit.total, 1.0);
    }

    #[test]
    fn test_interest_overlap() {
        let c = candidate(
            50,
            vec![(
                INTERESTS_ATTRIBUTE,
                AttributeValue::Tags(vec!["Biology".into(), "Chemistry".into()]),
            )],
        );
        let mut snapshot = baseline();
        snapshot.criteria.interests = vec!["biology".into(), "music".into()];

        let fit = calculate_fit(&c, &snapshot, DefaultsRegistry::global());
        assert_eq!(fit.interests, Some(0.5));
        assert_eq!(fit.total, 0.5);
    }
}
