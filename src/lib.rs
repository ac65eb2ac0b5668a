//! Unimatch Engine - criteria configuration and ranking state engine
//!
//! This library backs the university-matching features: it keeps the
//! multi-section filter configuration and weight vector, classifies how
//! complete each section is, persists weights without flooding the
//! backend, requests ranked matches under a usage quota and re-scores an
//! already ranked set under hypothetical criteria.

pub mod config;
pub mod core;
pub mod models;
pub mod services;
pub mod session;

// Re-export commonly used types
pub use crate::core::{classify, CriteriaStore, DefaultsRegistry, ScenarioEngine, ScoringStrategy, StatusBoard};
pub use crate::models::{CompletionStatus, Criteria, Dimension, FieldValue, MatchCandidate, SectionName, UsageSummary, Weights};
pub use crate::services::{ApiError, GenerateOutcome, HttpBackend, MatchBackend, SessionContext};
pub use crate::session::{MatchSession, SessionEvent, SessionOptions};
