//! Shared sliding-window rate limiting for fetch attempts.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

/// Sliding-window rate limiter shared by all workers of a run.
///
/// [`acquire`](Self::acquire) suspends the caller until issuing one more
/// attempt keeps the number of attempts inside the window at or below the
/// configured ceiling. Every attempt counts, including retries. Waiters
/// contend on an async mutex whose FIFO wake order keeps any single worker
/// from being starved.
#[derive(Debug)]
pub struct RateLimiter {
    /// Timestamps of attempts admitted within the current window.
    admitted: Mutex<VecDeque<Instant>>,
    max_per_window: usize,
    window: Duration,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_per_window` attempts per `window`.
    ///
    /// A ceiling of zero is treated as one: a limiter that can never admit
    /// an attempt would deadlock its callers.
    #[must_use]
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        Self {
            admitted: Mutex::new(VecDeque::new()),
            max_per_window: max_per_window.max(1),
            window,
        }
    }

    /// Returns the configured attempts-per-window ceiling.
    #[must_use]
    pub const fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    /// Returns the configured window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Blocks until the caller may issue the next fetch attempt.
    ///
    /// The slot is claimed before returning, so the ceiling holds even
    /// when many workers wake at once: a woken waiter re-checks the window
    /// and goes back to sleep if another claimed the freed slot first.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let now = Instant::now();
                let mut admitted = self.admitted.lock().await;
                while admitted
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.window)
                {
                    admitted.pop_front();
                }
                if admitted.len() < self.max_per_window {
                    admitted.push_back(now);
                    return;
                }
                // Window full: wait for the oldest admission to expire
                let oldest = *admitted.front().expect("window is full");
                self.window - now.duration_since(oldest)
            };
            sleep(wait).await;
        }
    }
}
