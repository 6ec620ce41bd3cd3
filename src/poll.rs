//! Bounded polling with an injectable clock.
//!
//! `poll_until` re-fetches a value at a fixed interval until a predicate
//! accepts it or the wait budget is spent. The final sleep is clamped so the
//! total wait never exceeds the budget, and the value is fetched once more
//! after that sleep before giving up.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;

/// Source of monotonic time and sleeping
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created
    fn now(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self { origin: tokio::time::Instant::now() }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How a poll ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Done { value: T, waited: Duration, polls: u32 },
    TimedOut { last: T, waited: Duration, polls: u32 },
}

/// Poll `fetch` every `interval` until `is_done` holds or `max_wait` is spent.
///
/// `initial` is checked first without sleeping. Errors from `fetch` abort the
/// loop immediately.
pub async fn poll_until<T, F, Fut, P>(
    clock: &dyn Clock,
    interval: Duration,
    max_wait: Duration,
    initial: T,
    mut fetch: F,
    is_done: P,
) -> Result<PollOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&T) -> bool,
{
    let start = clock.now();
    let mut current = initial;
    let mut polls = 0u32;

    loop {
        let waited = clock.now().saturating_sub(start);

        if is_done(&current) {
            return Ok(PollOutcome::Done { value: current, waited, polls });
        }
        if waited >= max_wait {
            return Ok(PollOutcome::TimedOut { last: current, waited, polls });
        }

        let nap = interval.min(max_wait - waited);
        clock.sleep(nap).await;

        current = fetch().await?;
        polls += 1;
        debug!("Poll #{} after {:?}", polls, clock.now().saturating_sub(start));
    }
}

#[cfg(test)]
pub use manual::ManualClock;

#[cfg(test)]
mod manual {
    use super::*;
    use std::sync::Mutex;

    /// Clock whose sleeps advance time instantly
    #[derive(Default)]
    pub struct ManualClock {
        elapsed: Mutex<Duration>,
        sleeps: Mutex<Vec<Duration>>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn now(&self) -> Duration {
            *self.elapsed.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            *self.elapsed.lock().unwrap() += duration;
            self.sleeps.lock().unwrap().push(duration);
        }
    }
}
