// Core engine exports
pub mod completion;
pub mod criteria;
pub mod defaults;
pub mod scenario;
pub mod scoring;

pub use completion::{classify, classify_section, classify_weights, StatusBoard};
pub use criteria::{CriteriaError, CriteriaStore};
pub use defaults::{DefaultsRegistry, DEFAULT_WEIGHT};
pub use scenario::{ScenarioEngine, ScenarioSummary, ScenarioView};
pub use scoring::{calculate_fit, AnchoredFitStrategy, CriteriaSnapshot, FitBreakdown, ScoringStrategy};
