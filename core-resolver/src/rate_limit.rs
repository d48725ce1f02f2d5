use std::collections::VecDeque;
use std::time::Duration;

/// Sliding-window request budget.
///
/// Remembers when each counted request was made; a request is allowed if
/// fewer than `max_requests` happened in the trailing `window`. Time is
/// passed in so tests can drive it with a manual clock.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: u32,
    window_ms: i64,
    requests: VecDeque<i64>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window_ms: window.as_millis() as i64,
            requests: VecDeque::new(),
        }
    }

    /// Count a request at `now_ms` if the budget allows it.
    pub fn try_acquire(&mut self, now_ms: i64) -> bool {
        self.evict(now_ms);
        if self.requests.len() >= self.max_requests as usize {
            return false;
        }
        self.requests.push_back(now_ms);
        true
    }

    pub fn request_count(&mut self, now_ms: i64) -> usize {
        self.evict(now_ms);
        self.requests.len()
    }

    /// Oldest request still inside the window.
    pub fn window_start(&mut self, now_ms: i64) -> Option<i64> {
        self.evict(now_ms);
        self.requests.front().copied()
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    fn evict(&mut self, now_ms: i64) {
        while let Some(&oldest) = self.requests.front() {
            if now_ms - oldest >= self.window_ms {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }
}
