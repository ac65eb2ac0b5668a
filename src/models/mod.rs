// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AccessLevel, AttributeValue, CompletionStatus, Criteria, CriteriaSection, Dimension, FieldValue,
    MatchCandidate, ScenarioCandidate, SectionName, Trend, UsageSource, UsageSummary, Weights,
};
pub use requests::{MatchRequest, SavePreferencesRequest};
pub use responses::{ErrorResponse, MatchResponse, PreferencesResponse};
