use crate::config::Settings;
use crate::core::{
    AnchoredFitStrategy, CriteriaError, CriteriaSnapshot, CriteriaStore, DefaultsRegistry,
    ScenarioEngine, ScenarioSummary, ScoringStrategy, StatusBoard,
};
use crate::models::{
    CompletionStatus, Criteria, Dimension, FieldValue, ScenarioCandidate, SectionName,
    UsageSummary, Weights,
};
use crate::services::{
    ApiError, GateDecision, GenerateOutcome, Liveness, MatchBackend, Notice, PreferenceSync,
    QuotaGate, RankedSet, RankingClient, RemainingDisplay, SessionContext, SyncOutcome,
    DEFAULT_SYNC_DELAY,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

/// Events the UI layer must act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Preferences could not be saved without signing in
    AuthPrompt(GateDecision),
}

/// Tunables for a session
#[derive(Clone)]
pub struct SessionOptions {
    pub sync_delay: Duration,
    pub min_match_percentage: u8,
    pub strategy: Arc<dyn ScoringStrategy>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            sync_delay: DEFAULT_SYNC_DELAY,
            min_match_percentage: 0,
            strategy: Arc::new(AnchoredFitStrategy::default()),
        }
    }
}

impl SessionOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            sync_delay: Duration::from_millis(settings.sync.debounce_ms),
            min_match_percentage: settings.ranking.min_match_percentage.min(100),
            ..Default::default()
        }
    }
}

/// One user's criteria editing and ranking session
///
/// Owns the live criteria and weights, and wires the classifier,
/// preference sync, quota gate, ranking client and scenario engine
/// around them. Ending the session (explicitly or by dropping it)
/// cancels pending preference writes and discards late responses.
pub struct MatchSession {
    context: SessionContext,
    registry: &'static DefaultsRegistry,
    criteria: Mutex<CriteriaStore>,
    weights: Mutex<Weights>,
    min_match_percentage: AtomicU8,
    quota: Arc<QuotaGate>,
    ranking: RankingClient,
    preferences: PreferenceSync,
    scenario: Mutex<ScenarioEngine>,
    liveness: Liveness,
}

impl MatchSession {
    /// Build a session with explicit starting weights
    pub fn new(
        context: SessionContext,
        backend: Arc<dyn MatchBackend>,
        weights: Weights,
        options: SessionOptions,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let registry = DefaultsRegistry::global();
        let liveness = Liveness::new();
        let (events, receiver) = mpsc::unbounded_channel();

        let quota = Arc::new(QuotaGate::new(
            Arc::clone(&backend),
            context.feature.clone(),
            liveness.clone(),
        ));
        let ranking = RankingClient::new(Arc::clone(&backend), Arc::clone(&quota), liveness.clone());
        let preferences = PreferenceSync::new(
            backend,
            options.sync_delay,
            liveness.clone(),
            Arc::new(move |decision: GateDecision| {
                if events.send(SessionEvent::AuthPrompt(decision)).is_err() {
                    tracing::debug!("Auth prompt dropped, no listener");
                }
            }),
        );

        let session = Self {
            context,
            registry,
            criteria: Mutex::new(CriteriaStore::new(registry)),
            weights: Mutex::new(weights.normalized()),
            min_match_percentage: AtomicU8::new(options.min_match_percentage.min(100)),
            quota,
            ranking,
            preferences,
            scenario: Mutex::new(ScenarioEngine::new(options.strategy)),
            liveness,
        };

        (session, receiver)
    }

    /// Build a session from persisted preferences and fetch initial usage
    pub async fn start(
        context: SessionContext,
        backend: Arc<dyn MatchBackend>,
        options: SessionOptions,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let defaults = DefaultsRegistry::global().weights().clone();
        let (session, events) = Self::new(context, backend, defaults, options);

        let weights = session.preferences.load().await;
        *lock(&session.weights) = weights;

        // Failures are logged by the gate; the session starts without usage
        let _ = session.quota.fetch_usage().await;

        tracing::info!(
            user = session.context.user_id.as_deref().unwrap_or("anonymous"),
            feature = %session.context.feature,
            "Match session started"
        );
        (session, events)
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn is_active(&self) -> bool {
        self.liveness.is_alive()
    }

    // Criteria editing

    pub fn criteria(&self) -> Criteria {
        lock(&self.criteria).criteria().clone()
    }

    pub fn set_field(
        &self,
        section: SectionName,
        field: &str,
        value: FieldValue,
    ) -> Result<(), CriteriaError> {
        lock(&self.criteria).set_field(section, field, value)
    }

    pub fn set_section_enabled(&self, section: SectionName, enabled: bool) {
        lock(&self.criteria).set_enabled(section, enabled);
    }

    pub fn reset_section(&self, section: SectionName) {
        lock(&self.criteria).reset_section(section);
    }

    pub fn add_interest(&self, interest: &str) -> bool {
        lock(&self.criteria).add_interest(interest)
    }

    pub fn remove_interest(&self, interest: &str) -> bool {
        lock(&self.criteria).remove_interest(interest)
    }

    /// Restore every section and the interest list to defaults
    pub fn reset_criteria(&self) {
        lock(&self.criteria).reset_all();
    }

    // Weights

    pub fn weights(&self) -> Weights {
        lock(&self.weights).clone()
    }

    /// Update one weight and queue it for persistence. Returns the clamped value.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, since the save is
    /// scheduled on a spawned task.
    pub fn set_weight(&self, dimension: Dimension, value: f64) -> f64 {
        let (stored, snapshot) = {
            let mut weights = lock(&self.weights);
            let stored = weights.set(dimension, value);
            (stored, weights.clone())
        };
        self.preferences.schedule(snapshot);
        stored
    }

    /// Restore default weights and queue them for persistence
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn reset_weights(&self) {
        let defaults = self.registry.weights().clone();
        *lock(&self.weights) = defaults.clone();
        self.preferences.schedule(defaults);
    }

    /// Persist pending weight changes now
    pub async fn save_now(&self) {
        self.preferences.flush().await;
    }

    /// Persist the current weights immediately, replacing any pending save
    pub async fn sync_weights(&self) -> SyncOutcome {
        self.preferences.cancel();
        let weights = self.weights();
        self.preferences.sync(&weights).await
    }

    pub fn has_pending_save(&self) -> bool {
        self.preferences.is_pending()
    }

    // Completion

    pub fn status_board(&self) -> StatusBoard {
        let criteria = lock(&self.criteria);
        let weights = lock(&self.weights);
        StatusBoard::compute(criteria.criteria(), &weights, self.registry)
    }

    pub fn section_status(&self, section: SectionName) -> CompletionStatus {
        self.status_board().section(section)
    }

    // Ranking

    pub fn min_match_percentage(&self) -> u8 {
        self.min_match_percentage.load(Ordering::Relaxed)
    }

    pub fn set_min_match_percentage(&self, value: u8) {
        self.min_match_percentage.store(value.min(100), Ordering::Relaxed);
    }

    /// Rank universities for the current criteria and weights
    ///
    /// A successful call replaces the result set and ends any scenario.
    pub async fn generate(&self) -> Result<GenerateOutcome, ApiError> {
        let criteria = self.criteria();
        let weights = self.weights();

        let outcome = self
            .ranking
            .generate(&criteria, &weights, self.min_match_percentage())
            .await?;

        if matches!(outcome, GenerateOutcome::Ranked { .. }) {
            lock(&self.scenario).reset_to_original();
        }
        Ok(outcome)
    }

    pub fn is_generating(&self) -> bool {
        self.ranking.is_in_flight()
    }

    pub fn ranked(&self) -> Option<Arc<RankedSet>> {
        self.ranking.current()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.ranking.notice()
    }

    pub fn dismiss_notice(&self) {
        self.ranking.dismiss_notice();
    }

    // Usage

    pub fn usage(&self) -> Option<UsageSummary> {
        self.quota.latest()
    }

    pub fn remaining_display(&self) -> RemainingDisplay {
        self.quota.remaining_display()
    }

    /// True when the last known usage shows no ranking attempts left
    pub fn is_quota_exhausted(&self) -> bool {
        self.quota.is_exhausted()
    }

    /// Wait for the usage refresh that follows a generate call
    pub async fn usage_settled(&self) {
        self.ranking.usage_settled().await;
    }

    // Scenarios

    /// Re-score the current result set under hypothetical criteria
    ///
    /// Returns `None` when nothing has been ranked yet.
    pub fn apply_scenario(
        &self,
        criteria: Criteria,
        weights: Weights,
    ) -> Option<(Vec<ScenarioCandidate>, ScenarioSummary)> {
        let ranked = self.ranked()?;
        let scenario = CriteriaSnapshot {
            criteria: CriteriaStore::from_persisted(self.registry, criteria)
                .criteria()
                .clone(),
            weights: weights.normalized(),
        };

        let mut engine = lock(&self.scenario);
        let view = engine.apply_scenario(&ranked.results, &ranked.basis, scenario);
        Some((view.candidates.clone(), view.summary))
    }

    pub fn scenario_candidates(&self) -> Vec<ScenarioCandidate> {
        lock(&self.scenario).candidates().to_vec()
    }

    pub fn is_scenario_active(&self) -> bool {
        lock(&self.scenario).is_active()
    }

    pub fn reset_scenario(&self) {
        lock(&self.scenario).reset_to_original();
    }

    /// End the session: cancel pending saves and ignore late responses
    pub fn teardown(&self) {
        if self.liveness.is_alive() {
            tracing::debug!("Tearing down match session");
        }
        self.liveness.end();
        self.preferences.cancel();
    }
}

impl Drop for MatchSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
