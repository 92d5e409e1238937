//! Keyed sliding-window rate limiter. One instance throttles fetches
//! per host; another throttles Telegram sends per bot.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    history: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1) as usize,
            window,
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Block until a slot is available for `key`, then consume it.
    pub async fn acquire(&self, key: &str) {
        loop {
            let wait = {
                let mut history = self.history.lock().await;
                let timestamps = history.entry(key.to_string()).or_default();
                let now = Instant::now();
                while timestamps
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.window)
                {
                    timestamps.pop_front();
                }
                if timestamps.len() < self.max_requests {
                    timestamps.push_back(now);
                    None
                } else {
                    // Oldest entry decides how long until a slot frees.
                    timestamps
                        .front()
                        .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                }
            };
            match wait {
                None => return,
                Some(delay) => {
                    tracing::debug!(key, delay_ms = delay.as_millis() as u64, "rate limit reached, waiting");
                    tokio::time::sleep(delay.max(Duration::from_millis(10))).await;
                }
            }
        }
    }

    /// Non-blocking variant used by tests and opportunistic callers.
    pub async fn try_acquire(&self, key: &str) -> bool {
        let mut history = self.history.lock().await;
        let timestamps = history.entry(key.to_string()).or_default();
        let now = Instant::now();
        while timestamps
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            timestamps.pop_front();
        }
        if timestamps.len() < self.max_requests {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }
}
