use crate::models::UsageSummary;
use crate::services::backend::{ApiError, ErrorCode, MatchBackend};
use crate::services::liveness::Liveness;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};

pub const LOGIN_REQUIRED_MESSAGE: &str = "Please sign in to generate your university matches.";
pub const UPGRADE_REQUIRED_MESSAGE: &str =
    "You've used all of your university matches. Upgrade your plan to generate more.";

/// A blocking auth or quota condition, returned instead of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub code: ErrorCode,
    pub message: String,
}

impl GateDecision {
    pub fn new(code: ErrorCode, message: Option<&str>) -> Self {
        let message = message.map(str::to_string).unwrap_or_else(|| {
            match code {
                ErrorCode::LoginRequired => LOGIN_REQUIRED_MESSAGE,
                ErrorCode::UpgradeRequired => UPGRADE_REQUIRED_MESSAGE,
            }
            .to_string()
        });
        Self { code, message }
    }
}

/// How the remaining quota should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemainingDisplay {
    Unlimited,
    Count { remaining: i64, limit: Option<i64> },
    Unknown,
}

impl RemainingDisplay {
    pub fn for_usage(usage: &UsageSummary) -> Self {
        if usage.is_unlimited() {
            return RemainingDisplay::Unlimited;
        }
        match usage.effective_remaining() {
            Some(remaining) => RemainingDisplay::Count {
                remaining,
                limit: usage.limit_value,
            },
            None => RemainingDisplay::Unknown,
        }
    }
}

impl fmt::Display for RemainingDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemainingDisplay::Unlimited => f.write_str("Unlimited"),
            RemainingDisplay::Count {
                remaining,
                limit: Some(limit),
            } => write!(f, "{} of {} remaining", remaining, limit),
            RemainingDisplay::Count {
                remaining,
                limit: None,
            } => write!(f, "{} remaining", remaining),
            RemainingDisplay::Unknown => f.write_str("-"),
        }
    }
}

/// Tracks usage of the ranking feature and turns gate failures into decisions
pub struct QuotaGate {
    backend: Arc<dyn MatchBackend>,
    feature: String,
    latest: RwLock<Option<UsageSummary>>,
    liveness: Liveness,
}

impl QuotaGate {
    pub fn new(backend: Arc<dyn MatchBackend>, feature: impl Into<String>, liveness: Liveness) -> Self {
        Self {
            backend,
            feature: feature.into(),
            latest: RwLock::new(None),
            liveness,
        }
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Fetch the usage summary and keep it as the latest snapshot
    ///
    /// A failed fetch leaves the previous snapshot in place. Results that
    /// arrive after teardown are not stored.
    pub async fn fetch_usage(&self) -> Result<UsageSummary, ApiError> {
        match self.backend.usage(&self.feature).await {
            Ok(usage) => {
                if self.liveness.is_alive() {
                    tracing::debug!(
                        "Usage for {}: used={}, remaining={}",
                        self.feature,
                        usage.used,
                        RemainingDisplay::for_usage(&usage)
                    );
                    *self.latest.write().unwrap_or_else(|e| e.into_inner()) = Some(usage.clone());
                }
                Ok(usage)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch usage for {}: {}", self.feature, e);
                Err(e)
            }
        }
    }

    /// Map a ranking failure to a gate decision
    ///
    /// Returns `None` for anything that is not an auth or quota gate; the
    /// caller treats those as generic ranking failures.
    pub fn evaluate(&self, error: &ApiError) -> Option<GateDecision> {
        error
            .code()
            .map(|code| GateDecision::new(code, error.server_message()))
    }

    pub fn latest(&self) -> Option<UsageSummary> {
        self.latest.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn remaining_display(&self) -> RemainingDisplay {
        self.latest()
            .as_ref()
            .map(RemainingDisplay::for_usage)
            .unwrap_or(RemainingDisplay::Unknown)
    }

    /// True when the last known usage shows a spent count-based quota
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self.remaining_display(),
            RemainingDisplay::Count { remaining: 0, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccessLevel;

    fn usage(level: Option<AccessLevel>, limit: Option<i64>, used: i64, remaining: Option<i64>) -> UsageSummary {
        UsageSummary {
            configured: true,
            access_level: level,
            limit_value: limit,
            remaining,
            used,
            source: None,
            plan_key: None,
        }
    }

    #[test]
    fn test_remaining_never_negative() {
        let u = usage(Some(AccessLevel::Count), Some(5), 7, Some(-2));
        assert_eq!(u.effective_remaining(), Some(0));
        assert_eq!(
            RemainingDisplay::for_usage(&u),
            RemainingDisplay::Count { remaining: 0, limit: Some(5) }
        );
    }

    #[test]
    fn test_unlimited_ignores_literal_remaining() {
        let u = usage(Some(AccessLevel::Unlimited), Some(5), 50, Some(0));
        assert_eq!(u.effective_remaining(), None);
        assert_eq!(RemainingDisplay::for_usage(&u), RemainingDisplay::Unlimited);
        assert_eq!(RemainingDisplay::for_usage(&u).to_string(), "Unlimited");
    }

    #[test]
    fn test_count_display() {
        let u = usage(Some(AccessLevel::Count), Some(5), 2, None);
        assert_eq!(RemainingDisplay::for_usage(&u).to_string(), "3 of 5 remaining");
    }

    #[test]
    fn test_unconfigured_usage() {
        let u = usage(None, None, 0, None);
        assert_eq!(RemainingDisplay::for_usage(&u), RemainingDisplay::Unknown);
    }

    #[test]
    fn test_fallback_messages() {
        let login = GateDecision::new(ErrorCode::LoginRequired, None);
        assert_eq!(login.message, LOGIN_REQUIRED_MESSAGE);

        let upgrade = GateDecision::new(ErrorCode::UpgradeRequired, Some("Plan limit hit"));
        assert_eq!(upgrade.message, "Plan limit hit");
    }
}
