use crate::core::CriteriaSnapshot;
use crate::models::{Criteria, MatchCandidate, MatchRequest, Weights};
use crate::services::backend::{ApiError, ErrorCode, MatchBackend};
use crate::services::liveness::Liveness;
use crate::services::quota::{GateDecision, QuotaGate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;
use validator::Validate;

pub const TRANSIENT_FAILURE_MESSAGE: &str =
    "We couldn't generate your matches right now. Please try again.";

/// Result set of one successful ranking call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSet {
    pub results: Vec<MatchCandidate>,
    /// Everything the oracle matched, including candidates it did not reveal
    pub total_count: usize,
    /// Criteria and weights the set was ranked under
    pub basis: CriteriaSnapshot,
    pub min_match_percentage: u8,
    pub fetched_at: DateTime<Utc>,
}

impl RankedSet {
    /// Matches the oracle counted but did not return in full
    pub fn locked_count(&self) -> usize {
        self.total_count.saturating_sub(self.results.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "code", rename_all = "lowercase")]
pub enum NoticeKind {
    Gate(ErrorCode),
    Transient,
}

/// Dismissible, non-fatal message shown after a failed attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub retryable: bool,
}

impl Notice {
    pub fn gate(decision: &GateDecision) -> Self {
        Self {
            kind: NoticeKind::Gate(decision.code),
            message: decision.message.clone(),
            retryable: false,
        }
    }

    pub fn transient() -> Self {
        Self {
            kind: NoticeKind::Transient,
            message: TRANSIENT_FAILURE_MESSAGE.to_string(),
            retryable: true,
        }
    }
}

/// What a `generate` call did
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateOutcome {
    /// New result set stored
    Ranked { shown: usize, total_count: usize },
    /// Another request was already in flight; nothing was sent
    Skipped,
    Gated(GateDecision),
    Failed(Notice),
    /// The session ended while the request was in flight
    Discarded,
}

/// Clears the in-flight flag when dropped
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Issues ranking requests, one at a time
///
/// A failed attempt never clears the current result set. Gate failures
/// become [`GateDecision`]s, everything else except malformed responses
/// becomes a transient notice. Usage is refreshed after every attempt.
pub struct RankingClient {
    backend: Arc<dyn MatchBackend>,
    quota: Arc<QuotaGate>,
    liveness: Liveness,
    in_flight: AtomicBool,
    current: RwLock<Option<Arc<RankedSet>>>,
    notice: RwLock<Option<Notice>>,
    usage_refresh: Mutex<Option<JoinHandle<()>>>,
}

impl RankingClient {
    pub fn new(backend: Arc<dyn MatchBackend>, quota: Arc<QuotaGate>, liveness: Liveness) -> Self {
        Self {
            backend,
            quota,
            liveness,
            in_flight: AtomicBool::new(false),
            current: RwLock::new(None),
            notice: RwLock::new(None),
            usage_refresh: Mutex::new(None),
        }
    }

    /// Request a ranking for the given criteria
    ///
    /// Returns `Skipped` without touching the network while another call
    /// is pending. Only malformed responses and invalid requests are
    /// returned as `Err`.
    pub async fn generate(
        &self,
        criteria: &Criteria,
        weights: &Weights,
        min_match_percentage: u8,
    ) -> Result<GenerateOutcome, ApiError> {
        let Some(guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("Ranking request already in flight, ignoring trigger");
            return Ok(GenerateOutcome::Skipped);
        };

        let request = MatchRequest {
            sections: criteria.sections.clone(),
            interests: criteria.interests.clone(),
            weights: weights.clone(),
            min_match_percentage,
        };
        request
            .validate()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let attempt = uuid::Uuid::new_v4();
        tracing::info!(%attempt, min_match_percentage, "Requesting university matches");

        let result = self.backend.rank(&request).await;

        if !self.liveness.is_alive() {
            tracing::debug!(%attempt, "Session ended, discarding ranking response");
            return Ok(GenerateOutcome::Discarded);
        }

        let outcome = match result {
            Ok(response) => {
                let mut results = response.matches;
                for c in &mut results {
                    c.score_original = c.score_original.min(100);
                }
                let total_count = response.total_count.max(results.len());
                let shown = results.len();

                let set = RankedSet {
                    results,
                    total_count,
                    basis: CriteriaSnapshot {
                        criteria: criteria.clone(),
                        weights: weights.clone(),
                    },
                    min_match_percentage,
                    fetched_at: Utc::now(),
                };
                *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(set));
                self.set_notice(None);

                tracing::info!(%attempt, "Received {} matches ({} total)", shown, total_count);
                Ok(GenerateOutcome::Ranked { shown, total_count })
            }
            Err(e @ ApiError::InvalidResponse(_)) => {
                tracing::error!(%attempt, "Malformed ranking response: {}", e);
                self.set_notice(None);
                Err(e)
            }
            Err(e) => match self.quota.evaluate(&e) {
                Some(decision) => {
                    tracing::info!(%attempt, code = decision.code.as_str(), "Ranking gated");
                    self.set_notice(Some(Notice::gate(&decision)));
                    Ok(GenerateOutcome::Gated(decision))
                }
                None => {
                    tracing::warn!(%attempt, "Ranking request failed: {}", e);
                    let notice = Notice::transient();
                    self.set_notice(Some(notice.clone()));
                    Ok(GenerateOutcome::Failed(notice))
                }
            },
        };
        // Released only once the outcome is committed
        drop(guard);

        self.refresh_usage();
        outcome
    }

    /// Re-fetch usage in the background after an attempt settled
    fn refresh_usage(&self) {
        let quota = Arc::clone(&self.quota);
        let handle = tokio::spawn(async move {
            // Errors are logged by the gate; the previous snapshot stays
            let _ = quota.fetch_usage().await;
        });
        *self.usage_refresh.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Wait for the usage refresh started by the last attempt
    pub async fn usage_settled(&self) {
        let handle = self
            .usage_refresh
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Usage refresh task failed: {}", e);
            }
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn current(&self) -> Option<Arc<RankedSet>> {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn dismiss_notice(&self) {
        self.set_notice(None);
    }

    fn set_notice(&self, notice: Option<Notice>) {
        *self.notice.write().unwrap_or_else(|e| e.into_inner()) = notice;
    }
}
