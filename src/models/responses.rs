use serde::{Deserialize, Serialize};

use crate::models::domain::{MatchCandidate, Weights};

/// Response for `POST /match`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub matches: Vec<MatchCandidate>,
    pub total_count: usize,
}

/// Response for `GET /preferences`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesResponse {
    #[serde(default)]
    pub weights: Option<Weights>,
}

/// Error body returned by the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorResponse {
    /// Human readable detail, preferring `message` over `error`
    pub fn detail(self) -> Option<String> {
        self.message.or(self.error)
    }
}
