use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

use crate::models::domain::{CriteriaSection, SectionName, Weights};

/// Request body for `POST /match`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub sections: BTreeMap<SectionName, CriteriaSection>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[validate(custom(function = "validate_weights"))]
    pub weights: Weights,
    #[validate(range(max = 100))]
    pub min_match_percentage: u8,
}

fn validate_weights(weights: &Weights) -> Result<(), ValidationError> {
    if weights
        .as_map()
        .values()
        .all(|w| w.is_finite() && (0.0..=1.0).contains(w))
    {
        Ok(())
    } else {
        Err(ValidationError::new("weight_out_of_range"))
    }
}

/// Body for `PUT /preferences`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavePreferencesRequest {
    pub weights: Weights,
}
