use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

type BoxedEffect<T> = Box<dyn FnOnce(T) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

struct Scheduled<T> {
    generation: u64,
    value: T,
    effect: BoxedEffect<T>,
}

struct State<T> {
    generation: u64,
    scheduled: Option<Scheduled<T>>,
    timer: Option<JoinHandle<()>>,
}

/// Delayed-commit primitive for one logical channel
///
/// Every `schedule` call supersedes the pending one: its timer is cancelled
/// and a new one started with the latest value. The effect runs once the
/// channel has been quiet for `delay`. An effect that already started is
/// left to finish. Dropping the debouncer cancels any pending timer.
pub struct Debouncer<T: Send + 'static> {
    channel: &'static str,
    delay: Duration,
    state: Arc<Mutex<State<T>>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(channel: &'static str, delay: Duration) -> Self {
        Self {
            channel,
            delay,
            state: Arc::new(Mutex::new(State {
                generation: 0,
                scheduled: None,
                timer: None,
            })),
        }
    }

    pub fn channel(&self) -> &'static str {
        self.channel
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `effect(value)` after the quiet period, replacing any
    /// pending call.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn schedule<F, Fut>(&self, value: T, effect: F)
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = lock(&self.state);
        state.generation += 1;
        let generation = state.generation;

        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        state.scheduled = Some(Scheduled {
            generation,
            value,
            effect: Box::new(move |v| Box::pin(effect(v))),
        });

        let shared = Arc::clone(&self.state);
        let delay = self.delay;
        let channel = self.channel;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let due = {
                let mut state = lock(&shared);
                match state.scheduled.take() {
                    Some(s) if s.generation == generation => {
                        // Detach: a later schedule must not abort a running effect
                        state.timer.take();
                        Some(s)
                    }
                    other => {
                        state.scheduled = other;
                        None
                    }
                }
            };

            if let Some(s) = due {
                tracing::trace!("Debounce channel {} firing", channel);
                (s.effect)(s.value).await;
            }
        }));
    }

    /// Run the pending effect now, if any, and wait for it
    pub async fn flush(&self) {
        let due = {
            let mut state = lock(&self.state);
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.scheduled.take()
        };

        if let Some(s) = due {
            tracing::trace!("Debounce channel {} flushed", self.channel);
            (s.effect)(s.value).await;
        }
    }

    /// Drop the pending call without running it
    pub fn cancel(&self) {
        let mut state = lock(&self.state);
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if state.scheduled.take().is_some() {
            tracing::debug!("Debounce channel {} cancelled with a pending value", self.channel);
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.state).scheduled.is_some()
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock<T>(state: &Mutex<State<T>>) -> MutexGuard<'_, State<T>> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Arc<Mutex<Vec<u32>>>;

    fn record(log: &Log) -> impl FnOnce(u32) -> std::future::Ready<()> + Send + 'static {
        let log = Arc::clone(log);
        move |v| {
            log.lock().unwrap().push(v);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_values_coalesce_to_last() {
        let log: Log = Default::default();
        let debouncer = Debouncer::new("weights", Duration::from_millis(600));

        for v in [1, 2, 3] {
            debouncer.schedule(v, record(&log));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(*log.lock().unwrap(), vec![3]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_quiet_periods_fire_separately() {
        let log: Log = Default::default();
        let debouncer = Debouncer::new("weights", Duration::from_millis(600));

        debouncer.schedule(1, record(&log));
        tokio::time::sleep(Duration::from_millis(700)).await;
        debouncer.schedule(2, record(&log));
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_drop_suppress_effect() {
        let log: Log = Default::default();

        let debouncer = Debouncer::new("weights", Duration::from_millis(600));
        debouncer.schedule(1, record(&log));
        debouncer.cancel();

        let dropped = Debouncer::new("other", Duration::from_millis(600));
        dropped.schedule(2, record(&log));
        drop(dropped);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_fires_once() {
        let log: Log = Default::default();
        let debouncer = Debouncer::new("weights", Duration::from_millis(600));

        debouncer.schedule(7, record(&log));
        debouncer.flush().await;
        assert_eq!(*log.lock().unwrap(), vec![7]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*log.lock().unwrap(), vec![7]);
    }
}
