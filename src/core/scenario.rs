use crate::core::scoring::{CriteriaSnapshot, ScoringStrategy};
use crate::models::{MatchCandidate, ScenarioCandidate, Trend};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Counts of candidates per trend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub improved: usize,
    pub worsened: usize,
    pub unchanged: usize,
}

/// Current scenario: the hypothetical snapshot and re-scored candidates
#[derive(Debug, Clone)]
pub struct ScenarioView {
    pub snapshot: CriteriaSnapshot,
    pub candidates: Vec<ScenarioCandidate>,
    pub summary: ScenarioSummary,
}

/// Re-scores an already fetched candidate set under hypothetical criteria
///
/// Never talks to the network and never touches the total match count;
/// it only derives a view over the candidates it is handed.
pub struct ScenarioEngine {
    strategy: Arc<dyn ScoringStrategy>,
    view: Option<ScenarioView>,
}

impl ScenarioEngine {
    pub fn new(strategy: Arc<dyn ScoringStrategy>) -> Self {
        Self {
            strategy,
            view: None,
        }
    }

    /// Re-score `original` (ranked under `basis`) under `scenario`
    ///
    /// Results are ordered by scenario score, highest first; ties keep
    /// the oracle's order.
    pub fn apply_scenario(
        &mut self,
        original: &[MatchCandidate],
        basis: &CriteriaSnapshot,
        scenario: CriteriaSnapshot,
    ) -> &ScenarioView {
        let mut candidates: Vec<ScenarioCandidate> = original
            .iter()
            .map(|candidate| {
                let score = self.strategy.score(candidate, basis, &scenario);
                ScenarioCandidate::new(candidate.clone(), score)
            })
            .collect();

        candidates.sort_by(|a, b| b.score_scenario.cmp(&a.score_scenario));

        let summary = candidates
            .iter()
            .fold(ScenarioSummary::default(), |mut acc, c| {
                match c.trend {
                    Trend::Improved => acc.improved += 1,
                    Trend::Worsened => acc.worsened += 1,
                    Trend::Unchanged => acc.unchanged += 1,
                }
                acc
            });

        tracing::debug!(
            "Scenario applied to {} candidates ({} improved, {} worsened)",
            candidates.len(),
            summary.improved,
            summary.worsened
        );

        self.view.insert(ScenarioView {
            snapshot: scenario,
            candidates,
            summary,
        })
    }

    /// Drop all scenario state and go back to the oracle's ranking
    pub fn reset_to_original(&mut self) {
        self.view = None;
    }

    pub fn is_active(&self) -> bool {
        self.view.is_some()
    }

    pub fn view(&self) -> Option<&ScenarioView> {
        self.view.as_ref()
    }

    /// Scenario candidates, empty when no scenario is active
    pub fn candidates(&self) -> &[ScenarioCandidate] {
        self.view
            .as_ref()
            .map(|v| v.candidates.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::defaults::DefaultsRegistry;

    /// Adds a fixed offset per candidate index parity
    struct OffsetStrategy;

    impl ScoringStrategy for OffsetStrategy {
        fn score(&self, c: &MatchCandidate, _: &CriteriaSnapshot, _: &CriteriaSnapshot) -> u8 {
            if c.id.ends_with('0') {
                c.score_original.saturating_add(10).min(100)
            } else if c.id.ends_with('1') {
                c.score_original.saturating_sub(10)
            } else {
                c.score_original
            }
        }
    }

    fn candidates() -> Vec<MatchCandidate> {
        (0..3)
            .map(|i| MatchCandidate {
                id: format!("u{}", i),
                name: format!("University {}", i),
                score_original: 70 - i as u8,
                location: None,
                attributes: Default::default(),
            })
            .collect()
    }

    fn snapshot() -> CriteriaSnapshot {
        let registry = DefaultsRegistry::global();
        CriteriaSnapshot {
            criteria: registry.criteria().clone(),
            weights: registry.weights().clone(),
        }
    }

    #[test]
    fn test_delta_sign_law() {
        let mut engine = ScenarioEngine::new(Arc::new(OffsetStrategy));
        let view = engine.apply_scenario(&candidates(), &snapshot(), snapshot());

        for c in &view.candidates {
            let diff = c.score_scenario as i16 - c.candidate.score_original as i16;
            assert_eq!(c.delta, diff);
            assert_eq!(c.delta.signum(), diff.signum());
            assert_eq!(c.trend, Trend::from_delta(diff));
        }
        assert_eq!(
            view.summary,
            ScenarioSummary { improved: 1, worsened: 1, unchanged: 1 }
        );
    }

    #[test]
    fn test_sorted_by_scenario_score() {
        let mut engine = ScenarioEngine::new(Arc::new(OffsetStrategy));
        let view = engine.apply_scenario(&candidates(), &snapshot(), snapshot());
        let ids: Vec<&str> = view.candidates.iter().map(|c| c.candidate.id.as_str()).collect();
        assert_eq!(ids, vec!["u0", "u2", "u1"]);
    }

    #[test]
    fn test_reset_to_original() {
        let mut engine = ScenarioEngine::new(Arc::new(OffsetStrategy));
        engine.apply_scenario(&candidates(), &snapshot(), snapshot());
        assert!(engine.is_active());

        engine.reset_to_original();
        assert!(!engine.is_active());
        assert!(engine.candidates().is_empty());
    }
}
