//! Exponential reconnect backoff with jitter.
//!
//! `delay(n) = min(max, base · 2ⁿ) + jitter`, where jitter is uniform in
//! `0..=delay · jitter_percent / 100`, and the sum is capped at `max`.

use core::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    jitter_percent: u8,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter_percent: u8) -> Self {
        let base_ms = base.as_millis().max(1) as u64;
        Self {
            base_ms,
            max_ms: (max.as_millis() as u64).max(base_ms),
            jitter_percent: jitter_percent.min(100),
            attempt: 0,
        }
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next retry.  `entropy` picks the jitter.
    pub fn next_delay(&mut self, entropy: u32) -> Duration {
        let exp = self
            .base_ms
            .saturating_mul(1u64 << self.attempt.min(32))
            .min(self.max_ms);
        let span = exp * u64::from(self.jitter_percent) / 100;
        let jitter = u64::from(entropy) % (span + 1);
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis((exp + jitter).min(self.max_ms))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Random bits for jitter.
#[cfg(target_os = "espidf")]
pub fn entropy() -> u32 {
    // SAFETY: esp_random reads the hardware RNG and has no preconditions.
    unsafe { esp_idf_sys::esp_random() }
}

/// Random bits for jitter.
#[cfg(not(target_os = "espidf"))]
pub fn entropy() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let mut h = RandomState::new().build_hasher();
    h.write_u64(COUNTER.fetch_add(1, Ordering::Relaxed));
    h.finish() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff(jitter: u8) -> Backoff {
        Backoff::new(Duration::from_secs(1), Duration::from_secs(60), jitter)
    }

    #[test]
    fn doubles_until_capped() {
        let mut b = backoff(0);
        let delays: Vec<u64> = (0..8).map(|_| b.next_delay(0).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);
        assert_eq!(b.attempt(), 8);
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut b = backoff(0);
        b.next_delay(0);
        b.next_delay(0);
        b.reset();
        assert_eq!(b.next_delay(0), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_percentage() {
        let mut b = backoff(20);
        // span for the first delay is 200 ms
        assert_eq!(b.next_delay(200), Duration::from_millis(1_200));
        b.reset();
        assert_eq!(b.next_delay(201), Duration::from_millis(1_000));
        b.reset();
        for _ in 0..50 {
            let d = b.next_delay(entropy());
            assert!(d <= Duration::from_secs(60));
        }
    }

    #[test]
    fn jitter_never_exceeds_max() {
        let mut b = backoff(100);
        for _ in 0..10 {
            b.next_delay(0);
        }
        assert_eq!(b.next_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let mut b = backoff(0);
        b.attempt = u32::MAX - 1;
        assert_eq!(b.next_delay(0), Duration::from_secs(60));
        assert_eq!(b.next_delay(0), Duration::from_secs(60));
    }
}
