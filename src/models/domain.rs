use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named group of filter fields that can be switched on and off as a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionName {
    Academics,
    Financials,
    Lifestyle,
    Admissions,
    Outcomes,
}

impl SectionName {
    pub const ALL: [SectionName; 5] = [
        SectionName::Academics,
        SectionName::Financials,
        SectionName::Lifestyle,
        SectionName::Admissions,
        SectionName::Outcomes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionName::Academics => "academics",
            SectionName::Financials => "financials",
            SectionName::Lifestyle => "lifestyle",
            SectionName::Admissions => "admissions",
            SectionName::Outcomes => "outcomes",
        }
    }

    /// Weight dimension that scales this section during scoring
    pub fn dimension(&self) -> Dimension {
        match self {
            SectionName::Academics => Dimension::Academics,
            SectionName::Financials => Dimension::Financials,
            SectionName::Lifestyle => Dimension::Lifestyle,
            SectionName::Admissions => Dimension::Admissions,
            SectionName::Outcomes => Dimension::Outcomes,
        }
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single filter value
///
/// `Tags` is an ordered collection: two tag lists holding the same
/// entries in a different order are not equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Range { min: f64, max: f64 },
    Choice(String),
    Tags(Vec<String>),
}

impl FieldValue {
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Flag(_) => "flag",
            FieldValue::Number(_) => "number",
            FieldValue::Range { .. } => "range",
            FieldValue::Choice(_) => "choice",
            FieldValue::Tags(_) => "tags",
        }
    }

    pub fn same_kind(&self, other: &FieldValue) -> bool {
        self.kind() == other.kind()
    }
}

/// One section of the filter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaSection {
    pub enabled: bool,
    pub filters: BTreeMap<String, FieldValue>,
}

/// Full filter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    pub sections: BTreeMap<SectionName, CriteriaSection>,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl Criteria {
    pub fn section(&self, name: SectionName) -> Option<&CriteriaSection> {
        self.sections.get(&name)
    }
}

/// Axis of the weight vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Academics,
    Financials,
    Lifestyle,
    Admissions,
    Outcomes,
    Interests,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Academics,
        Dimension::Financials,
        Dimension::Lifestyle,
        Dimension::Admissions,
        Dimension::Outcomes,
        Dimension::Interests,
    ];
}

/// Weight vector, every value kept within `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weights(BTreeMap<Dimension, f64>);

impl Weights {
    pub fn new(values: BTreeMap<Dimension, f64>) -> Self {
        Self(values.into_iter().map(|(d, v)| (d, clamp_weight(v))).collect())
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        self.0.get(&dimension).copied().unwrap_or(0.0)
    }

    /// Set a weight, clamping to `[0, 1]`. Returns the stored value.
    pub fn set(&mut self, dimension: Dimension, value: f64) -> f64 {
        let clamped = clamp_weight(value);
        self.0.insert(dimension, clamped);
        clamped
    }

    pub fn as_map(&self) -> &BTreeMap<Dimension, f64> {
        &self.0
    }

    /// Re-apply the clamp after deserializing untrusted input
    pub fn normalized(self) -> Self {
        Self::new(self.0)
    }
}

#[inline]
fn clamp_weight(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// How far a section (or the weights) diverged from defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Disabled,
    Default,
    Complete,
    Incomplete,
}

/// Attribute of a ranked university, keyed by the filter field it answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Number(f64),
    Text(String),
    Tags(Vec<String>),
}

/// Ranked university as returned by the oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "matchScore")]
    pub score_original: u8,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// Direction of a scenario score change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improved,
    Worsened,
    Unchanged,
}

impl Trend {
    pub fn from_delta(delta: i16) -> Self {
        match delta.signum() {
            1 => Trend::Improved,
            -1 => Trend::Worsened,
            _ => Trend::Unchanged,
        }
    }
}

/// Candidate re-scored under hypothetical criteria
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioCandidate {
    #[serde(flatten)]
    pub candidate: MatchCandidate,
    #[serde(rename = "scenarioScore")]
    pub score_scenario: u8,
    pub delta: i16,
    pub trend: Trend,
}

impl ScenarioCandidate {
    pub fn new(candidate: MatchCandidate, score_scenario: u8) -> Self {
        let score_scenario = score_scenario.min(100);
        let delta = score_scenario as i16 - candidate.score_original as i16;
        Self {
            candidate,
            score_scenario,
            delta,
            trend: Trend::from_delta(delta),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Count,
    Unlimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageSource {
    Plan,
    Override,
}

/// Quota state for the ranking feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub access_level: Option<AccessLevel>,
    #[serde(default)]
    pub limit_value: Option<i64>,
    #[serde(default)]
    pub remaining: Option<i64>,
    #[serde(default)]
    pub used: i64,
    #[serde(default)]
    pub source: Option<UsageSource>,
    #[serde(default)]
    pub plan_key: Option<String>,
}

impl UsageSummary {
    pub fn is_unlimited(&self) -> bool {
        self.access_level == Some(AccessLevel::Unlimited)
    }

    /// Remaining attempts, `None` meaning unbounded
    ///
    /// For count-based access this is derived from `limit_value - used`
    /// and never negative, whatever the server reported.
    pub fn effective_remaining(&self) -> Option<i64> {
        match self.access_level {
            Some(AccessLevel::Unlimited) => None,
            Some(AccessLevel::Count) => match self.limit_value {
                Some(limit) => Some((limit - self.used).max(0)),
                None => Some(self.remaining.unwrap_or(0).max(0)),
            },
            None => self.remaining.map(|r| r.max(0)),
        }
    }
}
