use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const BUCKETS: u32 = 10;

/// Counts events over a sliding window, in buckets of `window / 10`.
pub struct RateCounter {
    window: Duration,
    resolution: Duration,
    buckets: Mutex<VecDeque<(Instant, u64)>>,
}

impl RateCounter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            resolution: window / BUCKETS,
            buckets: Mutex::new(VecDeque::with_capacity(BUCKETS as usize + 1)),
        }
    }

    pub fn per_second() -> Self {
        Self::new(Duration::from_secs(1))
    }

    pub fn incr(&self, n: u64) {
        self.incr_at(Instant::now(), n);
    }

    /// Events counted within the last window.
    pub fn rate(&self) -> u64 {
        self.rate_at(Instant::now())
    }

    fn incr_at(&self, now: Instant, n: u64) {
        let mut buckets = self.buckets.lock().unwrap();
        self.expire(&mut buckets, now);
        match buckets.back_mut() {
            Some((start, count)) if now.duration_since(*start) < self.resolution => *count += n,
            _ => buckets.push_back((now, n)),
        }
    }

    fn rate_at(&self, now: Instant) -> u64 {
        let mut buckets = self.buckets.lock().unwrap();
        self.expire(&mut buckets, now);
        buckets.iter().map(|(_, n)| n).sum()
    }

    fn expire(&self, buckets: &mut VecDeque<(Instant, u64)>, now: Instant) {
        while let Some((start, _)) = buckets.front() {
            if now.duration_since(*start) >= self.window {
                buckets.pop_front();
            } else {
                break;
            }
        }
    }
}
