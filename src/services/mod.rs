// Service exports
pub mod backend;
pub mod debounce;
pub mod liveness;
pub mod preferences;
pub mod quota;
pub mod ranking;

pub use backend::{ApiError, ErrorCode, HttpBackend, MatchBackend, SessionContext};
pub use debounce::Debouncer;
pub use liveness::Liveness;
pub use preferences::{AuthPromptHandler, PreferenceSync, SyncOutcome, DEFAULT_SYNC_DELAY};
pub use quota::{GateDecision, QuotaGate, RemainingDisplay};
pub use ranking::{GenerateOutcome, Notice, NoticeKind, RankedSet, RankingClient};
