use crate::core::DefaultsRegistry;
use crate::models::Weights;
use crate::services::backend::{ApiError, ErrorCode, MatchBackend};
use crate::services::debounce::Debouncer;
use crate::services::liveness::Liveness;
use crate::services::quota::GateDecision;
use std::sync::Arc;
use std::time::Duration;

/// Default quiet period before weights are persisted
pub const DEFAULT_SYNC_DELAY: Duration = Duration::from_millis(600);

/// Callback invoked when persistence needs the user to sign in
pub type AuthPromptHandler = Arc<dyn Fn(GateDecision) + Send + Sync>;

/// What happened to one persistence attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Saved,
    /// Auth gate surfaced through the prompt handler
    AuthPrompted,
    /// Failure logged and swallowed
    Failed,
    /// Session ended before the response arrived
    Discarded,
}

/// Best-effort persistence of the weight vector
///
/// Writes go through a [`Debouncer`] so a continuously dragged slider
/// produces one `PUT /preferences`. Failures never reach the ranking
/// workflow; only a login gate is surfaced, via the prompt handler.
pub struct PreferenceSync {
    backend: Arc<dyn MatchBackend>,
    debouncer: Debouncer<Weights>,
    liveness: Liveness,
    on_auth_required: AuthPromptHandler,
}

impl PreferenceSync {
    pub fn new(
        backend: Arc<dyn MatchBackend>,
        delay: Duration,
        liveness: Liveness,
        on_auth_required: AuthPromptHandler,
    ) -> Self {
        Self {
            backend,
            debouncer: Debouncer::new("weights", delay),
            liveness,
            on_auth_required,
        }
    }

    /// Load persisted weights, falling back to defaults
    pub async fn load(&self) -> Weights {
        let defaults = DefaultsRegistry::global().weights().clone();
        match self.backend.load_preferences().await {
            Ok(Some(weights)) => {
                tracing::debug!("Loaded persisted weights");
                merge_onto_defaults(defaults, weights)
            }
            Ok(None) => defaults,
            Err(ApiError::AuthRequired { .. }) => {
                tracing::debug!("No signed-in user, starting from default weights");
                defaults
            }
            Err(e) => {
                tracing::warn!("Failed to load preferences, using defaults: {}", e);
                defaults
            }
        }
    }

    /// Queue `weights` for persistence after the quiet period
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn schedule(&self, weights: Weights) {
        let backend = Arc::clone(&self.backend);
        let liveness = self.liveness.clone();
        let on_auth = Arc::clone(&self.on_auth_required);

        self.debouncer.schedule(weights, move |w| async move {
            persist(backend.as_ref(), &w, &liveness, &on_auth).await;
        });
    }

    /// Persist immediately, bypassing the debouncer
    pub async fn sync(&self, weights: &Weights) -> SyncOutcome {
        persist(self.backend.as_ref(), weights, &self.liveness, &self.on_auth_required).await
    }

    /// Persist the pending value now, if there is one
    pub async fn flush(&self) {
        self.debouncer.flush().await;
    }

    pub fn cancel(&self) {
        self.debouncer.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}

async fn persist(
    backend: &dyn MatchBackend,
    weights: &Weights,
    liveness: &Liveness,
    on_auth_required: &AuthPromptHandler,
) -> SyncOutcome {
    if !liveness.is_alive() {
        return SyncOutcome::Discarded;
    }

    let result = backend.save_preferences(weights).await;

    if !liveness.is_alive() {
        return SyncOutcome::Discarded;
    }

    match result {
        Ok(()) => {
            tracing::debug!("Persisted weights");
            SyncOutcome::Saved
        }
        Err(e) if e.code() == Some(ErrorCode::LoginRequired) => {
            tracing::info!("Saving preferences requires login");
            on_auth_required(GateDecision::new(ErrorCode::LoginRequired, e.server_message()));
            SyncOutcome::AuthPrompted
        }
        Err(e) => {
            tracing::warn!("Failed to persist weights (ignored): {}", e);
            SyncOutcome::Failed
        }
    }
}

/// Keep every known dimension, taking persisted values where present
fn merge_onto_defaults(mut defaults: Weights, persisted: Weights) -> Weights {
    for (dimension, value) in persisted.as_map() {
        defaults.set(*dimension, *value);
    }
    defaults
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dimension;
    use std::collections::BTreeMap;

    #[test]
    fn test_merge_keeps_missing_dimensions() {
        let defaults = DefaultsRegistry::global().weights().clone();
        let mut partial = BTreeMap::new();
        partial.insert(Dimension::Financials, 0.9);

        let merged = merge_onto_defaults(defaults, Weights::new(partial));
        assert_eq!(merged.get(Dimension::Financials), 0.9);
        assert_eq!(merged.get(Dimension::Academics), crate::core::DEFAULT_WEIGHT);
        assert_eq!(merged.as_map().len(), Dimension::ALL.len());
    }
}
