use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag marking whether the owning session is still mounted
///
/// Async work captures a clone and checks it before writing results
/// back, so responses that arrive after teardown are discarded.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn end(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
