use crate::core::defaults::DefaultsRegistry;
use crate::models::{Criteria, FieldValue, SectionName};
use thiserror::Error;

/// Errors raised by invalid criteria edits
#[derive(Debug, Error, PartialEq)]
pub enum CriteriaError {
    #[error("Unknown field {field} in section {section}")]
    UnknownField { section: SectionName, field: String },

    #[error("Field {section}.{field} expects a {expected} value, got {actual}")]
    KindMismatch {
        section: SectionName,
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid range for {section}.{field}: min {min} is above max {max}")]
    InvertedRange {
        section: SectionName,
        field: String,
        min: f64,
        max: f64,
    },
}

/// Live edit buffer for the filter configuration
///
/// The store always holds every registered section, and each section
/// holds exactly the fields the registry defines for it.
#[derive(Debug, Clone)]
pub struct CriteriaStore {
    criteria: Criteria,
    registry: &'static DefaultsRegistry,
}

impl CriteriaStore {
    pub fn new(registry: &'static DefaultsRegistry) -> Self {
        Self {
            criteria: registry.criteria().clone(),
            registry,
        }
    }

    /// Restore from persisted criteria
    ///
    /// Unknown sections and fields are dropped and missing ones are filled
    /// from defaults, so the fixed-shape invariant holds afterwards.
    pub fn from_persisted(registry: &'static DefaultsRegistry, persisted: Criteria) -> Self {
        let mut store = Self::new(registry);

        for (name, section) in persisted.sections {
            let Some(target) = store.criteria.sections.get_mut(&name) else {
                continue;
            };
            target.enabled = section.enabled;
            for (field, value) in section.filters {
                match target.filters.get_mut(&field) {
                    Some(slot) if slot.same_kind(&value) => *slot = value,
                    _ => tracing::debug!("Dropping persisted field {}.{}", name, field),
                }
            }
        }

        store.criteria.interests = dedup_ordered(persisted.interests);
        store
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn set_enabled(&mut self, section: SectionName, enabled: bool) {
        if let Some(s) = self.criteria.sections.get_mut(&section) {
            s.enabled = enabled;
        }
    }

    pub fn set_field(
        &mut self,
        section: SectionName,
        field: &str,
        value: FieldValue,
    ) -> Result<(), CriteriaError> {
        let default = self
            .registry
            .field(section, field)
            .ok_or_else(|| CriteriaError::UnknownField {
                section,
                field: field.to_string(),
            })?;

        if !default.same_kind(&value) {
            return Err(CriteriaError::KindMismatch {
                section,
                field: field.to_string(),
                expected: default.kind(),
                actual: value.kind(),
            });
        }

        if let FieldValue::Range { min, max } = value {
            if min > max {
                return Err(CriteriaError::InvertedRange {
                    section,
                    field: field.to_string(),
                    min,
                    max,
                });
            }
        }

        if let Some(s) = self.criteria.sections.get_mut(&section) {
            s.filters.insert(field.to_string(), value);
        }
        Ok(())
    }

    /// Restore one section's filters to defaults, keeping its enabled flag
    pub fn reset_section(&mut self, section: SectionName) {
        let defaults = self.registry.section(section).filters.clone();
        if let Some(s) = self.criteria.sections.get_mut(&section) {
            s.filters = defaults;
        }
    }

    pub fn reset_all(&mut self) {
        self.criteria = self.registry.criteria().clone();
    }

    /// Add an interest; duplicates are ignored. Returns whether it was added.
    pub fn add_interest(&mut self, interest: &str) -> bool {
        let interest = interest.trim();
        if interest.is_empty() || self.criteria.interests.iter().any(|i| i == interest) {
            return false;
        }
        self.criteria.interests.push(interest.to_string());
        true
    }

    pub fn remove_interest(&mut self, interest: &str) -> bool {
        let before = self.criteria.interests.len();
        self.criteria.interests.retain(|i| i != interest);
        before != self.criteria.interests.len()
    }
}

fn dedup_ordered(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CriteriaSection;
    use std::collections::BTreeMap;

    fn store() -> CriteriaStore {
        CriteriaStore::new(DefaultsRegistry::global())
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut s = store();
        let err = s
            .set_field(SectionName::Academics, "mascot", FieldValue::Flag(true))
            .unwrap_err();
        assert!(matches!(err, CriteriaError::UnknownField { .. }));
        assert!(!s.criteria().sections[&SectionName::Academics]
            .filters
            .contains_key("mascot"));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let mut s = store();
        let err = s
            .set_field(SectionName::Financials, "meritAid", FieldValue::Number(1.0))
            .unwrap_err();
        assert_eq!(
            err,
            CriteriaError::KindMismatch {
                section: SectionName::Financials,
                field: "meritAid".into(),
                expected: "flag",
                actual: "number",
            }
        );
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut s = store();
        let result = s.set_field(
            SectionName::Admissions,
            "acceptanceRate",
            FieldValue::Range { min: 60.0, max: 10.0 },
        );
        assert!(matches!(result, Err(CriteriaError::InvertedRange { .. })));
    }

    #[test]
    fn test_reset_section_keeps_enabled_flag() {
        let mut s = store();
        s.set_field(SectionName::Lifestyle, "greekLife", FieldValue::Flag(true)).unwrap();
        s.set_enabled(SectionName::Lifestyle, false);
        s.reset_section(SectionName::Lifestyle);

        let section = &s.criteria().sections[&SectionName::Lifestyle];
        assert!(!section.enabled);
        assert_eq!(section.filters, DefaultsRegistry::global().section(SectionName::Lifestyle).filters);
    }

    #[test]
    fn test_interests_are_a_set() {
        let mut s = store();
        assert!(s.add_interest("robotics"));
        assert!(!s.add_interest("robotics"));
        assert!(!s.add_interest("  "));
        assert!(s.remove_interest("robotics"));
        assert!(s.criteria().interests.is_empty());
    }

    #[test]
    fn test_from_persisted_fills_and_drops() {
        let mut filters = BTreeMap::new();
        filters.insert("meritAid".to_string(), FieldValue::Flag(true));
        filters.insert("bogus".to_string(), FieldValue::Flag(true));
        filters.insert("needMetMin".to_string(), FieldValue::Choice("lots".into()));

        let mut sections = BTreeMap::new();
        sections.insert(SectionName::Financials, CriteriaSection { enabled: false, filters });

        let s = CriteriaStore::from_persisted(
            DefaultsRegistry::global(),
            Criteria {
                sections,
                interests: vec!["art".into(), "art".into()],
            },
        );

        let fin = &s.criteria().sections[&SectionName::Financials];
        assert!(!fin.enabled);
        assert_eq!(fin.filters["meritAid"], FieldValue::Flag(true));
        assert_eq!(fin.filters["needMetMin"], FieldValue::Number(0.0));
        assert!(!fin.filters.contains_key("bogus"));
        assert_eq!(s.criteria().sections.len(), SectionName::ALL.len());
        assert_eq!(s.criteria().interests, vec!["art".to_string()]);
    }
}
