//! Worker inter-task communication.
//!
//! Uses `embassy-sync` primitives to bridge the gateway worker with request
//! handlers (HTTP threads) and the broker adapter's callback.  Everything
//! lives in one [`Shared`] block behind an `Arc`.
//!
//! ```text
//! ┌──────────────┐  Request   ┌──────────┐ LinkMessage ┌──────────────┐
//! │ HTTP threads │───inbox───▶│  Worker  │◀───link─────│ MQTT adapter │
//! │              │◀──reply────│ (async)  │◀───lost─────│  (callback)  │
//! └──────────────┘            └──────────┘             └──────────────┘
//!        ▲                         │
//!        └──── view (Mutex) ◀──────┤
//!        └──── updates (PubSub) ◀──┘
//! ```

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::pubsub::PubSubChannel;
use embassy_sync::signal::Signal;
use heapless::{String, Vec};
use log::warn;

use crate::app::commands::{Command, CommandKind};
use crate::app::events::GatewayUpdate;
use crate::app::ports::UpdateSink;
use crate::app::view::Snapshot;
use crate::config::{
    INBOX_DEPTH, LINK_DEPTH, MAX_PAYLOAD_LEN, MAX_TOPIC_LEN, MAX_UPDATE_SUBSCRIBERS, UPDATE_DEPTH,
};
use crate::error::Result;
use crate::fleet::BinId;

pub type RawMutex = CriticalSectionRawMutex;

const PENDING: u8 = 0;
const CLAIMED: u8 = 1;
const ABANDONED: u8 = 2;

/// One-shot reply slot for a request.
///
/// The worker [`claim`](Self::claim)s a slot before acting on its request.
/// A client that stops waiting [`abandon`](Self::abandon)s it first, and
/// the request is then dropped unexecuted.  Exactly one of the two wins.
pub struct ReplySlot<T> {
    state: AtomicU8,
    value: Signal<RawMutex, T>,
}

impl<T> ReplySlot<T> {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(PENDING),
            value: Signal::new(),
        }
    }

    /// Worker side.  `false` if the client already gave up.
    pub fn claim(&self) -> bool {
        self.transition(CLAIMED)
    }

    /// Client side.  `false` if the worker already took the request.
    pub fn abandon(&self) -> bool {
        self.transition(ABANDONED)
    }

    pub fn send(&self, value: T) {
        self.value.signal(value);
    }

    pub async fn wait(&self) -> T {
        self.value.wait().await
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl<T> Default for ReplySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub type Reply<T> = Arc<ReplySlot<T>>;

/// Live update channel type.
pub type UpdateChannel =
    PubSubChannel<RawMutex, GatewayUpdate, UPDATE_DEPTH, MAX_UPDATE_SUBSCRIBERS, 1>;

/// Subscriber handed to live-update clients.
pub type UpdateSubscriber<'a> = embassy_sync::pubsub::Subscriber<
    'a,
    RawMutex,
    GatewayUpdate,
    UPDATE_DEPTH,
    MAX_UPDATE_SUBSCRIBERS,
    1,
>;

/// Request from a client to the worker.
pub enum Request {
    Submit {
        command: Command,
        reply: Reply<Result<CommandKind>>,
    },
    ResetBin {
        bin: BinId,
        reply: Reply<bool>,
    },
}

/// A broker message pushed by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMessage {
    pub topic: String<MAX_TOPIC_LEN>,
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

pub struct Shared {
    pub inbox: Channel<RawMutex, Request, INBOX_DEPTH>,
    pub link: Channel<RawMutex, LinkMessage, LINK_DEPTH>,
    /// Transport loss.  A signal rather than a channel slot, so it is never
    /// dropped when the message channel is full.
    pub lost: Signal<RawMutex, ()>,
    pub view: Mutex<RawMutex, RefCell<Snapshot>>,
    pub updates: UpdateChannel,
    pub shutdown: Signal<RawMutex, ()>,
    pub stopped: Signal<RawMutex, ()>,
    closed: AtomicBool,
}

impl Shared {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            inbox: Channel::new(),
            link: Channel::new(),
            lost: Signal::new(),
            view: Mutex::new(RefCell::new(initial)),
            updates: PubSubChannel::new(),
            shutdown: Signal::new(),
            stopped: Signal::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Copy of the current view.  The lock is held only for the clone.
    pub fn snapshot(&self) -> Snapshot {
        self.view.lock(|v| v.borrow().clone())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter side
// ───────────────────────────────────────────────────────────────

/// Handle given to the broker adapter for pushing inbound traffic.
///
/// Never blocks: a full channel drops the message with a warning.  Loss
/// notifications always get through.
#[derive(Clone)]
pub struct LinkSender {
    shared: Arc<Shared>,
}

impl LinkSender {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn deliver(&self, topic: &str, payload: &[u8]) {
        let Ok(topic) = String::try_from(topic) else {
            warn!("link: topic too long, dropping message");
            return;
        };
        let Ok(payload) = Vec::from_slice(payload) else {
            warn!("link: {} byte payload on '{}' too large, dropping", payload.len(), topic);
            return;
        };
        if self
            .shared
            .link
            .try_send(LinkMessage { topic, payload })
            .is_err()
        {
            warn!("link: channel full, dropping message");
        }
    }

    pub fn lost(&self) {
        self.shared.lost.signal(());
    }
}

// ───────────────────────────────────────────────────────────────
// Worker side
// ───────────────────────────────────────────────────────────────

/// Update sink that patches the shared view and fans out to subscribers.
pub struct SharedSink<'a> {
    shared: &'a Shared,
}

impl<'a> SharedSink<'a> {
    pub fn new(shared: &'a Shared) -> Self {
        Self { shared }
    }
}

impl UpdateSink for SharedSink<'_> {
    fn emit(&mut self, update: &GatewayUpdate) {
        self.shared.view.lock(|v| v.borrow_mut().apply(update));
        // Slow subscribers lag rather than block the worker.
        self.shared
            .updates
            .immediate_publisher()
            .publish_immediate(update.clone());
    }
}
