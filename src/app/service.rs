//! Gateway core: the hexagonal centre.
//!
//! [`GatewayCore`] owns the bin state store, the event log and the command
//! dispatcher.  It is the only writer of all three.  Every I/O dependency
//! (broker, clock, update sinks) is passed in at the call site, making the
//! whole core testable with mock adapters.
//!
//! ```text
//!  broker msg ──▶ ┌──────────────────────────────┐ ──▶ UpdateSink
//!                 │         GatewayCore           │
//!  Command    ──▶ │ Store · EventLog · Dispatcher │ ──▶ BrokerPort (publish)
//!                 └──────────────────────────────┘
//! ```

use core::time::Duration;
use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::config::{EVENT_LOG_CAPACITY, GatewayConfig};
use crate::error::{DecodeError, Error, Result};
use crate::event_log::EventLog;
use crate::fleet::{BinId, BinStateStore, Fleet};
use crate::link::{LinkState, LinkSupervisor};
use crate::protocol::{Decoded, Event, Topics, decode};

use super::commands::{Command, CommandKind};
use super::dispatcher::Dispatcher;
use super::events::GatewayUpdate;
use super::ports::{BrokerPort, ClockPort, UpdateSink};
use super::view::{SNAPSHOT_EVENT_TAIL, Snapshot};

// ───────────────────────────────────────────────────────────────
// GatewayCore
// ───────────────────────────────────────────────────────────────

pub struct GatewayCore {
    fleet: Fleet,
    topics: Topics,
    store: BinStateStore,
    log: EventLog<EVENT_LOG_CAPACITY>,
    dispatcher: Dispatcher,
}

impl GatewayCore {
    /// Build the core from validated configuration.
    pub fn new(config: &GatewayConfig) -> Self {
        let fleet = config.fleet();
        let topics = Topics::from_config(config);
        let dispatcher = Dispatcher::new(
            fleet,
            topics.clone(),
            Duration::from_secs(u64::from(config.pending_timeout_secs)),
            config.command_rate_per_sec,
        );
        Self::with_dispatcher(fleet, topics, dispatcher)
    }

    /// Build the core around an existing dispatcher.
    pub fn with_dispatcher(fleet: Fleet, topics: Topics, dispatcher: Dispatcher) -> Self {
        info!("GatewayCore: fleet of {} bins", fleet.size());
        Self {
            fleet,
            topics,
            store: BinStateStore::new(fleet),
            log: EventLog::new(),
            dispatcher,
        }
    }

    pub fn fleet(&self) -> Fleet {
        self.fleet
    }

    pub fn store(&self) -> &BinStateStore {
        &self.store
    }

    pub fn log(&self) -> &EventLog<EVENT_LOG_CAPACITY> {
        &self.log
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Route one message received from the broker.
    ///
    /// Decode failures on a known topic are recorded as `Ignored` log
    /// entries and returned; they never affect bin state.
    pub fn handle_inbound(
        &mut self,
        topic: &str,
        payload: &[u8],
        clock: &impl ClockPort,
        sink: &mut impl UpdateSink,
    ) -> core::result::Result<(), DecodeError> {
        let at = clock.now_ms();
        match decode(&self.topics, self.fleet, topic, payload, at) {
            Ok(Decoded::Event(Event::Telemetry { bin, status, at })) => {
                if !self.store.apply_telemetry(bin, status, at) {
                    return Ok(());
                }
                self.dispatcher.on_telemetry(bin, status);
                if let Some(state) = self.store.get(bin) {
                    sink.emit(&GatewayUpdate::BinChanged(state));
                }
                self.record(Event::Telemetry { bin, status, at }, sink);
                Ok(())
            }
            Ok(Decoded::Event(event)) => {
                self.record(event, sink);
                Ok(())
            }
            Ok(Decoded::InstructionEcho(d)) => {
                debug!("core: instruction echo '{}' filtered", d);
                Ok(())
            }
            Ok(Decoded::Blank) => Ok(()),
            Err(DecodeError::UnknownTopic) => {
                debug!("core: message on unhandled topic '{}'", topic);
                Err(DecodeError::UnknownTopic)
            }
            Err(e) => {
                warn!("core: dropped payload on '{}': {}", topic, e);
                self.record(Event::ignored(payload, e, at), sink);
                Err(e)
            }
        }
    }

    // ── Commands ──────────────────────────────────────────────

    /// Dispatch an operator command over the link.
    ///
    /// Rejected with [`Error::Unavailable`] unless the link is subscribed.
    /// A transport failure while publishing degrades the link, so the
    /// supervisor reconnects on its backoff schedule.
    pub fn submit<B: BrokerPort>(
        &mut self,
        command: &Command,
        link: &mut LinkSupervisor<B>,
        clock: &impl ClockPort,
        sink: &mut impl UpdateSink,
    ) -> Result<CommandKind> {
        if !link.is_subscribed() {
            debug!("core: {} rejected, link {}", command.kind(), link.state().as_str());
            return Err(Error::Unavailable);
        }
        let kind = match self
            .dispatcher
            .issue(command, link.broker_mut(), clock.uptime_ms())
        {
            Ok(kind) => kind,
            Err(Error::Transport(e)) => {
                warn!("core: {} not delivered: {}", command.kind(), e);
                link.on_transport_lost(clock.uptime_ms(), sink);
                return Err(Error::Transport(e));
            }
            Err(e) => return Err(e),
        };
        self.record(
            Event::CommandIssued {
                kind,
                bin: command.bin(),
                at: clock.now_ms(),
            },
            sink,
        );
        Ok(kind)
    }

    /// Operator reset: bin back to `Unknown`, pending Collect dropped.
    pub fn reset_bin(&mut self, bin: BinId, sink: &mut impl UpdateSink) -> bool {
        if !self.store.reset(bin) {
            return false;
        }
        self.dispatcher.reset(bin);
        if let Some(state) = self.store.get(bin) {
            sink.emit(&GatewayUpdate::BinChanged(state));
        }
        info!("core: bin {} reset", bin);
        true
    }

    // ── Housekeeping ──────────────────────────────────────────

    /// Periodic maintenance: expire stale Collects.
    pub fn housekeeping(&mut self, clock: &impl ClockPort) -> usize {
        let expired = self.dispatcher.expire(clock.uptime_ms());
        for bin in &expired {
            warn!("core: collect for bin {} timed out", bin);
        }
        expired.len()
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn snapshot(&self, link: LinkState) -> Snapshot {
        Snapshot {
            bins: self.store.snapshot(),
            events: self.log.tail(SNAPSHOT_EVENT_TAIL).into_iter().collect::<VecDeque<_>>(),
            link,
            pending_collects: self.dispatcher.pending_count(),
            log_len: self.log.len(),
        }
    }

    fn record(&mut self, event: Event, sink: &mut impl UpdateSink) {
        self.log.append(event);
        if let Some(entry) = self.log.latest() {
            sink.emit(&GatewayUpdate::Logged(entry.clone()));
        }
    }
}
