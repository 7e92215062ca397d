//! Gateway worker: the single owner of all mutable gateway state.
//!
//! Runs in a dedicated thread using `edge-executor`, with `async-io-mini`
//! providing the housekeeping and backoff timer.  Each loop iteration
//! waits on whichever comes first:
//!
//! 1. **Shutdown**: `Shared::shutdown` signalled by the handle
//! 2. **Lost**: the adapter reported the transport gone
//! 3. **Link**: a broker message pushed by the adapter
//! 4. **Inbox**: a client request
//! 5. **Timer**: housekeeping interval or reconnect deadline
//!
//! A request is executed only if the worker claims its reply slot before
//! the client's deadline; otherwise it is dropped unexecuted.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────┐
//!  │  Worker thread                                           │
//!  │  futures_lite::block_on(LocalExecutor::run(..))          │
//!  │                                                          │
//!  │   or(shutdown, lost, link, inbox, timer) ──▶ step        │
//!  │        │                                                 │
//!  │        ▼                                                 │
//!  │   GatewayCore + LinkSupervisor ──▶ SharedSink (view,     │
//!  │                                     pub/sub) + sink      │
//!  └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing awaits while the view lock is held; the lock is only taken by
//! `SharedSink` for the duration of a patch.

use core::time::Duration;
use std::sync::Arc;

use futures_lite::future;
use log::{debug, info, warn};

use crate::app::ports::{BrokerPort, ClockPort, UpdateSink};
use crate::app::service::GatewayCore;
use crate::error::Error;
use crate::link::LinkSupervisor;

use super::channels::{LinkMessage, Request, Shared, SharedSink};

/// Stack for the worker thread.  The core is boxed and its event log is a
/// heap ring, so nothing large lives on this stack.
const WORKER_STACK_SIZE: usize = 24 * 1024;

enum Step {
    Shutdown,
    Lost,
    Message(LinkMessage),
    Request(Request),
    Tick,
}

pub struct Worker<B, C, S>
where
    B: BrokerPort,
    C: ClockPort,
    S: UpdateSink,
{
    core: Box<GatewayCore>,
    link: LinkSupervisor<B>,
    clock: C,
    sink: S,
    shared: Arc<Shared>,
    housekeeping: Duration,
}

impl<B, C, S> Worker<B, C, S>
where
    B: BrokerPort,
    C: ClockPort,
    S: UpdateSink,
{
    pub fn new(
        core: Box<GatewayCore>,
        link: LinkSupervisor<B>,
        clock: C,
        sink: S,
        shared: Arc<Shared>,
        housekeeping: Duration,
    ) -> Self {
        Self {
            core,
            link,
            clock,
            sink,
            shared,
            housekeeping,
        }
    }

    /// Drive the gateway until shutdown, then tear the link down.
    pub async fn run(mut self) {
        info!("worker: started");
        // A loss reported before the first connect belongs to no session.
        self.shared.lost.reset();
        {
            let mut sink = (SharedSink::new(&self.shared), &mut self.sink);
            let _ = self.link.connect(self.clock.uptime_ms(), &mut sink);
        }
        self.refresh_counters();

        loop {
            let wait = self.next_wakeup();
            let shared = &*self.shared;
            let step = future::or(
                async {
                    shared.shutdown.wait().await;
                    Step::Shutdown
                },
                future::or(
                    async {
                        shared.lost.wait().await;
                        Step::Lost
                    },
                    future::or(
                        async { Step::Message(shared.link.receive().await) },
                        future::or(
                            async { Step::Request(shared.inbox.receive().await) },
                            async {
                                async_io_mini::Timer::after(wait).await;
                                Step::Tick
                            },
                        ),
                    ),
                ),
            )
            .await;

            match step {
                Step::Shutdown => break,
                Step::Lost => self.on_lost(),
                Step::Message(message) => self.on_message(message),
                Step::Request(request) => self.on_request(request),
                Step::Tick => self.on_tick(),
            }
            self.refresh_counters();
        }

        self.stop();
    }

    fn on_lost(&mut self) {
        let mut sink = (SharedSink::new(&self.shared), &mut self.sink);
        self.link.on_transport_lost(self.clock.uptime_ms(), &mut sink);
    }

    fn on_message(&mut self, message: LinkMessage) {
        let LinkMessage { topic, payload } = message;
        if !self.link.is_subscribed() {
            debug!("worker: message on '{}' while {}, dropped", topic, self.link.state().as_str());
            return;
        }
        let mut sink = (SharedSink::new(&self.shared), &mut self.sink);
        let _ = self
            .core
            .handle_inbound(&topic, &payload, &self.clock, &mut sink);
    }

    fn on_request(&mut self, request: Request) {
        let mut sink = (SharedSink::new(&self.shared), &mut self.sink);
        match request {
            Request::Submit { command, reply } => {
                if !reply.claim() {
                    warn!("worker: {} withdrawn by client, not sent", command.kind());
                    return;
                }
                let result = self
                    .core
                    .submit(&command, &mut self.link, &self.clock, &mut sink);
                if let Err(e) = result {
                    debug!("worker: {} rejected: {}", command.kind(), e);
                }
                reply.send(result);
            }
            Request::ResetBin { bin, reply } => {
                if !reply.claim() {
                    warn!("worker: reset of bin {} withdrawn by client", bin);
                    return;
                }
                reply.send(self.core.reset_bin(bin, &mut sink));
            }
        }
    }

    fn on_tick(&mut self) {
        let now = self.clock.uptime_ms();
        let mut sink = (SharedSink::new(&self.shared), &mut self.sink);
        self.link.poll(now, &mut sink);
        self.core.housekeeping(&self.clock);
    }

    /// How long to sleep before the next housekeeping or reconnect step.
    fn next_wakeup(&self) -> Duration {
        match self.link.next_retry_at() {
            Some(at) => {
                let until = Duration::from_millis(at.saturating_sub(self.clock.uptime_ms()));
                until.min(self.housekeeping)
            }
            None => self.housekeeping,
        }
    }

    /// Counters that do not travel as updates.
    fn refresh_counters(&self) {
        let pending = self.core.dispatcher().pending_count();
        let log_len = self.core.log().len();
        self.shared.view.lock(|v| {
            let mut v = v.borrow_mut();
            v.pending_collects = pending;
            v.log_len = log_len;
        });
    }

    fn stop(&mut self) {
        info!("worker: shutting down");
        self.shared.close();
        {
            let mut sink = (SharedSink::new(&self.shared), &mut self.sink);
            self.link.teardown(&mut sink);
        }
        let mut refused = 0;
        while let Ok(request) = self.shared.inbox.try_receive() {
            match request {
                Request::Submit { reply, .. } if reply.claim() => reply.send(Err(Error::Unavailable)),
                Request::ResetBin { reply, .. } if reply.claim() => reply.send(false),
                _ => {}
            }
            refused += 1;
        }
        if refused > 0 {
            warn!("worker: refused {} queued requests", refused);
        }
        self.shared.stopped.signal(());
        info!("worker: stopped");
    }
}

/// Run the worker on a dedicated thread.
pub fn spawn<B, C, S>(worker: Worker<B, C, S>) -> std::io::Result<std::thread::JoinHandle<()>>
where
    B: BrokerPort + Send + 'static,
    C: ClockPort + Send + 'static,
    S: UpdateSink + Send + 'static,
{
    std::thread::Builder::new()
        .name("gateway".into())
        .stack_size(WORKER_STACK_SIZE)
        .spawn(move || {
            let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
            futures_lite::future::block_on(executor.run(worker.run()));
        })
}
