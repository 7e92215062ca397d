//! Broker link supervisor.
//!
//! Owns the [`BrokerPort`] and drives its connection state machine:
//!
//! ```text
//!  Disconnected ──connect──▶ Connecting ──ok──▶ Subscribed
//!                                 │                 │ transport lost
//!                                 ▼ fail            ▼
//!                          Degraded{attempt} ◀──────┘
//!                                 │ retry at now + backoff(attempt)
//!                                 └──▶ Connecting ...
//!
//!  any ──teardown──▶ Disconnected   (unsubscribe both topics, close)
//! ```
//!
//! A connection only counts as up once both topics are subscribed, so
//! commands are never accepted on a half-open link.

pub mod backoff;

use core::time::Duration;

use log::{info, warn};
use serde::Serialize;

use crate::app::events::GatewayUpdate;
use crate::app::ports::{BrokerPort, UpdateSink};
use crate::config::GatewayConfig;
use crate::error::TransportError;
use crate::protocol::Topics;

pub use backoff::Backoff;

/// Connection state of the broker link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Subscribed,
    /// Waiting to retry; `attempt` counts consecutive failures.
    Degraded { attempt: u32 },
}

impl LinkState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::Degraded { .. } => "degraded",
        }
    }
}

pub struct LinkSupervisor<B: BrokerPort> {
    broker: B,
    topics: Topics,
    state: LinkState,
    backoff: Backoff,
    /// Monotonic ms of the next reconnect attempt while degraded.
    retry_at: Option<u64>,
}

impl<B: BrokerPort> LinkSupervisor<B> {
    pub fn new(broker: B, topics: Topics, backoff: Backoff) -> Self {
        Self {
            broker,
            topics,
            state: LinkState::Disconnected,
            backoff,
            retry_at: None,
        }
    }

    pub fn from_config(broker: B, config: &GatewayConfig) -> Self {
        let backoff = Backoff::new(
            Duration::from_millis(u64::from(config.backoff_base_ms)),
            Duration::from_millis(u64::from(config.backoff_max_ms)),
            config.backoff_jitter_percent,
        );
        Self::new(broker, Topics::from_config(config), backoff)
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_subscribed(&self) -> bool {
        self.state == LinkState::Subscribed
    }

    pub fn next_retry_at(&self) -> Option<u64> {
        self.retry_at
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    /// Bring the link up: connect, then subscribe both topics.
    ///
    /// On failure the link is left `Degraded` with a retry scheduled.
    pub fn connect(&mut self, now_ms: u64, sink: &mut impl UpdateSink) -> Result<(), TransportError> {
        if self.is_subscribed() {
            return Ok(());
        }
        self.set_state(LinkState::Connecting, sink);

        match self.establish() {
            Ok(()) => {
                self.backoff.reset();
                self.retry_at = None;
                info!("link: subscribed to '{}' and '{}'", self.topics.telemetry, self.topics.command);
                self.set_state(LinkState::Subscribed, sink);
                Ok(())
            }
            Err(e) => {
                warn!("link: connect failed: {}", e);
                self.broker.disconnect();
                self.degrade(now_ms, sink);
                Err(e)
            }
        }
    }

    /// The adapter reported the transport as gone.
    pub fn on_transport_lost(&mut self, now_ms: u64, sink: &mut impl UpdateSink) {
        if !self.is_subscribed() {
            return;
        }
        warn!("link: transport lost, degrading");
        self.broker.disconnect();
        self.degrade(now_ms, sink);
    }

    /// Retry the connection if degraded and the backoff has elapsed.
    ///
    /// Returns `true` when an attempt was made.
    pub fn poll(&mut self, now_ms: u64, sink: &mut impl UpdateSink) -> bool {
        match (self.state, self.retry_at) {
            (LinkState::Degraded { .. }, Some(at)) if now_ms >= at => {
                let _ = self.connect(now_ms, sink);
                true
            }
            _ => false,
        }
    }

    /// Unsubscribe both topics and close the transport.
    pub fn teardown(&mut self, sink: &mut impl UpdateSink) {
        if self.is_subscribed() {
            for topic in self.topics.all() {
                if let Err(e) = self.broker.unsubscribe(topic) {
                    warn!("link: unsubscribe '{}' failed: {}", topic, e);
                }
            }
        }
        self.broker.disconnect();
        self.retry_at = None;
        self.backoff.reset();
        self.set_state(LinkState::Disconnected, sink);
        info!("link: torn down");
    }

    fn establish(&mut self) -> Result<(), TransportError> {
        self.broker.connect()?;
        for topic in self.topics.all() {
            self.broker.subscribe(topic)?;
        }
        Ok(())
    }

    fn degrade(&mut self, now_ms: u64, sink: &mut impl UpdateSink) {
        let attempt = self.backoff.attempt();
        let delay = self.backoff.next_delay(backoff::entropy());
        self.retry_at = Some(now_ms.saturating_add(delay.as_millis() as u64));
        info!("link: retry {} in {} ms", attempt, delay.as_millis());
        self.set_state(LinkState::Degraded { attempt }, sink);
    }

    fn set_state(&mut self, state: LinkState, sink: &mut impl UpdateSink) {
        if self.state != state {
            self.state = state;
            sink.emit(&GatewayUpdate::LinkChanged(state));
        }
    }
}
