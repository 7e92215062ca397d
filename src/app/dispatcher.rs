//! Command dispatcher.
//!
//! Turns validated [`Command`]s into broker publishes and tracks the
//! lifecycle of Collect requests:
//!
//! ```text
//!  Idle ──issue──▶ Pending{since} ──Empty telemetry──▶ Idle
//!                        │         ──operator reset──▶ Idle
//!                        └──────── timeout ──────────▶ Idle
//! ```
//!
//! At most one Collect may be in flight per bin.  All outbound commands
//! share a token-bucket rate limit.

use core::time::Duration;

use burster::Limiter;
use heapless::Vec;
use log::{debug, info, warn};

use crate::error::{Error, ValidationError};
use crate::fleet::{BinId, BinStatus, Fleet, MAX_FLEET_SIZE};
use crate::protocol::{Topics, encode};

use super::commands::{Command, CommandKind};
use super::ports::BrokerPort;

const SLOTS: usize = MAX_FLEET_SIZE as usize;

/// Why a pending Collect stopped blocking its bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// The bin reported Empty.
    Emptied,
    /// Operator reset.
    Reset,
    /// No Empty report within the pending timeout.
    TimedOut,
}

pub struct Dispatcher {
    fleet: Fleet,
    topics: Topics,
    pending_timeout_ms: u64,
    /// Monotonic ms at which each bin's Collect was issued.
    pending: [Option<u64>; SLOTS],
    limiter: burster::TokenBucket<fn() -> Duration>,
}

impl Dispatcher {
    pub fn new(fleet: Fleet, topics: Topics, pending_timeout: Duration, rate_per_sec: u32) -> Self {
        Self::with_time_provider(
            fleet,
            topics,
            pending_timeout,
            rate_per_sec,
            platform_now as fn() -> Duration,
        )
    }

    /// Construct with an explicit rate-limiter clock.
    pub fn with_time_provider(
        fleet: Fleet,
        topics: Topics,
        pending_timeout: Duration,
        rate_per_sec: u32,
        now: fn() -> Duration,
    ) -> Self {
        let rate = u64::from(rate_per_sec.max(1));
        Self {
            fleet,
            topics,
            pending_timeout_ms: pending_timeout.as_millis() as u64,
            pending: [None; SLOTS],
            limiter: burster::TokenBucket::new_with_time_provider(rate, rate, now),
        }
    }

    /// Validate, rate-limit and publish `command`.
    ///
    /// `now_ms` is monotonic and stamps the pending Collect.  On a publish
    /// failure the pending flag is left untouched.
    pub fn issue<B: BrokerPort>(
        &mut self,
        command: &Command,
        broker: &mut B,
        now_ms: u64,
    ) -> Result<CommandKind, Error> {
        if let Command::Collect(bin) = command {
            if !self.fleet.contains(u32::from(bin.get())) {
                return Err(ValidationError::UnknownBin.into());
            }
            if self.is_pending(*bin) {
                debug!("dispatch: collect for bin {} already pending", bin);
                return Err(ValidationError::AlreadyPending.into());
            }
        }
        if self.limiter.try_consume(1).is_err() {
            warn!("dispatch: rate limit exceeded, rejecting {}", command.kind());
            return Err(ValidationError::RateLimited.into());
        }

        let out = encode(&self.topics, command);
        broker.publish(&out.topic, out.payload.as_bytes())?;

        if let Command::Collect(bin) = command {
            self.pending[bin.index()] = Some(now_ms);
        }
        info!("dispatch: published {} -> {} '{}'", command.kind(), out.topic, out.payload);
        Ok(command.kind())
    }

    /// Feed applied telemetry.  Returns `true` if it cleared a pending Collect.
    pub fn on_telemetry(&mut self, bin: BinId, status: BinStatus) -> bool {
        if status == BinStatus::Empty {
            self.clear(bin, ClearReason::Emptied)
        } else {
            false
        }
    }

    /// Operator reset of a bin's pending flag.
    pub fn reset(&mut self, bin: BinId) -> bool {
        self.clear(bin, ClearReason::Reset)
    }

    /// Drop every Collect older than the pending timeout.
    pub fn expire(&mut self, now_ms: u64) -> Vec<BinId, SLOTS> {
        let mut expired = Vec::new();
        for bin in self.fleet.iter() {
            let Some(since) = self.pending[bin.index()] else {
                continue;
            };
            if now_ms.saturating_sub(since) >= self.pending_timeout_ms {
                self.clear(bin, ClearReason::TimedOut);
                // At most one entry per fleet slot.
                let _ = expired.push(bin);
            }
        }
        expired
    }

    pub fn is_pending(&self, bin: BinId) -> bool {
        self.pending.get(bin.index()).is_some_and(Option::is_some)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.iter().filter(|p| p.is_some()).count()
    }

    fn clear(&mut self, bin: BinId, reason: ClearReason) -> bool {
        let Some(slot) = self.pending.get_mut(bin.index()) else {
            return false;
        };
        if slot.take().is_none() {
            return false;
        }
        info!("dispatch: collect for bin {} cleared ({:?})", bin, reason);
        true
    }
}

// ── Platform clock for the rate limiter ──────────────────────

#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    let us = unsafe { esp_idf_sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[derive(Default)]
    struct RecordingBroker {
        published: std::vec::Vec<(String, String)>,
        fail: bool,
    }

    impl BrokerPort for RecordingBroker {
        fn connect(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
        fn subscribe(&mut self, _topic: &str) -> Result<(), TransportError> {
            Ok(())
        }
        fn unsubscribe(&mut self, _topic: &str) -> Result<(), TransportError> {
            Ok(())
        }
        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::PublishFailed);
            }
            self.published
                .push((topic.into(), String::from_utf8_lossy(payload).into_owned()));
            Ok(())
        }
        fn disconnect(&mut self) {}
    }

    /// Frozen clock: the bucket never refills during a test.
    fn frozen() -> Duration {
        Duration::ZERO
    }

    fn dispatcher(rate: u32) -> Dispatcher {
        Dispatcher::with_time_provider(
            Fleet::new(5),
            Topics::new("trash_collector_main", "trash_collector_sub"),
            Duration::from_secs(300),
            rate,
            frozen,
        )
    }

    fn bin(raw: u32) -> BinId {
        Fleet::new(5).bin(raw).unwrap()
    }

    #[test]
    fn collect_publishes_bin_id_and_marks_pending() {
        let mut d = dispatcher(10);
        let mut broker = RecordingBroker::default();
        let kind = d.issue(&Command::Collect(bin(2)), &mut broker, 0).unwrap();
        assert_eq!(kind, CommandKind::Collect);
        assert_eq!(
            broker.published,
            vec![("trash_collector_sub".into(), "2".into())]
        );
        assert!(d.is_pending(bin(2)));
        assert_eq!(d.pending_count(), 1);
    }

    #[test]
    fn second_collect_for_pending_bin_is_rejected() {
        let mut d = dispatcher(10);
        let mut broker = RecordingBroker::default();
        d.issue(&Command::Collect(bin(2)), &mut broker, 0).unwrap();
        assert_eq!(
            d.issue(&Command::Collect(bin(2)), &mut broker, 1),
            Err(Error::Validation(ValidationError::AlreadyPending))
        );
        assert_eq!(broker.published.len(), 1);
        // Other bins are unaffected.
        assert!(d.issue(&Command::Collect(bin(3)), &mut broker, 2).is_ok());
    }

    #[test]
    fn publish_failure_leaves_bin_idle() {
        let mut d = dispatcher(10);
        let mut broker = RecordingBroker {
            fail: true,
            ..Default::default()
        };
        assert_eq!(
            d.issue(&Command::Collect(bin(1)), &mut broker, 0),
            Err(Error::Transport(TransportError::PublishFailed))
        );
        assert!(!d.is_pending(bin(1)));
    }

    #[test]
    fn empty_telemetry_clears_pending() {
        let mut d = dispatcher(10);
        let mut broker = RecordingBroker::default();
        d.issue(&Command::Collect(bin(4)), &mut broker, 0).unwrap();
        assert!(!d.on_telemetry(bin(4), BinStatus::Full));
        assert!(d.is_pending(bin(4)));
        assert!(d.on_telemetry(bin(4), BinStatus::Empty));
        assert!(!d.is_pending(bin(4)));
    }

    #[test]
    fn reset_clears_pending() {
        let mut d = dispatcher(10);
        let mut broker = RecordingBroker::default();
        d.issue(&Command::Collect(bin(1)), &mut broker, 0).unwrap();
        assert!(d.reset(bin(1)));
        assert!(!d.reset(bin(1)));
    }

    #[test]
    fn pending_expires_after_timeout() {
        let mut d = dispatcher(10);
        let mut broker = RecordingBroker::default();
        d.issue(&Command::Collect(bin(1)), &mut broker, 1_000).unwrap();
        d.issue(&Command::Collect(bin(2)), &mut broker, 200_000).unwrap();
        assert!(d.expire(300_999).is_empty());
        let expired = d.expire(301_000);
        assert_eq!(expired.as_slice(), &[bin(1)]);
        assert!(d.is_pending(bin(2)));
        assert_eq!(d.expire(500_000).as_slice(), &[bin(2)]);
        assert_eq!(d.pending_count(), 0);
    }

    #[test]
    fn rate_limit_rejects_burst_overflow() {
        let mut d = dispatcher(2);
        let mut broker = RecordingBroker::default();
        assert!(d.issue(&Command::Calibrate, &mut broker, 0).is_ok());
        assert!(d.issue(&Command::Dock, &mut broker, 0).is_ok());
        assert_eq!(
            d.issue(&Command::Calibrate, &mut broker, 0),
            Err(Error::Validation(ValidationError::RateLimited))
        );
        assert_eq!(broker.published.len(), 2);
    }
}
