use crate::models::{Criteria, CriteriaSection, Dimension, FieldValue, SectionName, Weights};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Default weight for every dimension
pub const DEFAULT_WEIGHT: f64 = 0.5;

/// Baseline values for every filter field and every weight dimension
///
/// The registry is built once and never mutated. Sections present here
/// define the full, fixed shape of a [`Criteria`].
#[derive(Debug, Clone)]
pub struct DefaultsRegistry {
    criteria: Criteria,
    weights: Weights,
}

impl DefaultsRegistry {
    /// Shared process-wide registry
    pub fn global() -> &'static DefaultsRegistry {
        static REGISTRY: OnceLock<DefaultsRegistry> = OnceLock::new();
        REGISTRY.get_or_init(DefaultsRegistry::build)
    }

    fn build() -> Self {
        let sections = SectionName::ALL
            .iter()
            .map(|name| {
                (
                    *name,
                    CriteriaSection {
                        enabled: true,
                        filters: section_filters(*name),
                    },
                )
            })
            .collect();

        let weights = Weights::new(
            Dimension::ALL
                .iter()
                .map(|d| (*d, DEFAULT_WEIGHT))
                .collect(),
        );

        Self {
            criteria: Criteria {
                sections,
                interests: Vec::new(),
            },
            weights,
        }
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn section(&self, name: SectionName) -> &CriteriaSection {
        // Every SectionName is inserted by `build`
        &self.criteria.sections[&name]
    }

    pub fn field(&self, section: SectionName, field: &str) -> Option<&FieldValue> {
        self.section(section).filters.get(field)
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }
}

fn section_filters(name: SectionName) -> BTreeMap<String, FieldValue> {
    let fields: Vec<(&str, FieldValue)> = match name {
        SectionName::Academics => vec![
            ("majors", FieldValue::Tags(vec![])),
            ("graduationRate", FieldValue::Range { min: 0.0, max: 100.0 }),
            ("classSize", FieldValue::Choice("any".into())),
            ("researchOpportunities", FieldValue::Flag(false)),
        ],
        SectionName::Financials => vec![
            ("netPrice", FieldValue::Range { min: 0.0, max: 90_000.0 }),
            ("needMetMin", FieldValue::Number(0.0)),
            ("meritAid", FieldValue::Flag(false)),
        ],
        SectionName::Lifestyle => vec![
            ("setting", FieldValue::Choice("any".into())),
            ("campusSize", FieldValue::Choice("any".into())),
            ("regions", FieldValue::Tags(vec![])),
            ("greekLife", FieldValue::Flag(false)),
        ],
        SectionName::Admissions => vec![
            ("acceptanceRate", FieldValue::Range { min: 0.0, max: 100.0 }),
            ("testPolicy", FieldValue::Choice("any".into())),
            ("earlyDecision", FieldValue::Flag(false)),
        ],
        SectionName::Outcomes => vec![
            ("medianEarningsMin", FieldValue::Number(0.0)),
            ("employmentRate", FieldValue::Range { min: 0.0, max: 100.0 }),
        ],
    };

    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_section_is_registered() {
        let registry = DefaultsRegistry::global();
        for name in SectionName::ALL {
            let section = registry.section(name);
            assert!(section.enabled);
            assert!(!section.filters.is_empty(), "{} has no fields", name);
        }
    }

    #[test]
    fn test_default_weights() {
        let weights = DefaultsRegistry::global().weights();
        for d in Dimension::ALL {
            assert_eq!(weights.get(d), DEFAULT_WEIGHT);
        }
    }

    #[test]
    fn test_field_lookup() {
        let registry = DefaultsRegistry::global();
        assert_eq!(
            registry.field(SectionName::Financials, "meritAid"),
            Some(&FieldValue::Flag(false))
        );
        assert!(registry.field(SectionName::Financials, "majors").is_none());
    }
}
