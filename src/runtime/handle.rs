//! Client-side handle to a running gateway.
//!
//! Cheap to share between request-handler threads: it never touches the
//! core.  Reads copy the shared view; writes go through the worker's
//! bounded inbox and wait for a one-shot reply.  A request the worker has
//! not taken by the reply deadline is withdrawn, so a client told
//! `Unavailable` can safely retry.

use core::time::Duration;
use std::sync::Arc;
use std::thread::JoinHandle;

use futures_lite::future;
use log::{info, warn};

use crate::app::commands::{Command, CommandKind, CommandRequest};
use crate::app::view::Snapshot;
use crate::error::{Error, Result};
use crate::fleet::{BinId, Fleet};

use super::channels::{Reply, ReplySlot, Request, Shared, UpdateSubscriber};

pub struct GatewayHandle {
    shared: Arc<Shared>,
    fleet: Fleet,
    grace: Duration,
    reply_timeout: Duration,
    thread: Option<JoinHandle<()>>,
}

impl GatewayHandle {
    pub(crate) fn new(
        shared: Arc<Shared>,
        fleet: Fleet,
        grace: Duration,
        reply_timeout: Duration,
        thread: JoinHandle<()>,
    ) -> Self {
        Self {
            shared,
            fleet,
            grace,
            reply_timeout,
            thread: Some(thread),
        }
    }

    pub fn fleet(&self) -> Fleet {
        self.fleet
    }

    /// Point-in-time copy of bins, recent events and link state.
    pub fn snapshot(&self) -> Snapshot {
        self.shared.snapshot()
    }

    /// Validate a client request and submit it.
    pub fn submit_request(&self, request: &CommandRequest) -> Result<CommandKind> {
        let command = Command::from_request(request, self.fleet)?;
        self.submit(command)
    }

    /// Submit a command and block until the worker answers.
    pub fn submit(&self, command: Command) -> Result<CommandKind> {
        future::block_on(self.submit_async(command))
    }

    pub async fn submit_async(&self, command: Command) -> Result<CommandKind> {
        let reply: Reply<Result<CommandKind>> = Arc::new(ReplySlot::new());
        self.request(Request::Submit {
            command,
            reply: reply.clone(),
        })?;
        self.await_reply(&reply).await.unwrap_or(Err(Error::Unavailable))
    }

    /// Operator reset of one bin.  `false` if the worker is gone.
    pub fn reset_bin(&self, bin: BinId) -> bool {
        let reply: Reply<bool> = Arc::new(ReplySlot::new());
        if self
            .request(Request::ResetBin {
                bin,
                reply: reply.clone(),
            })
            .is_err()
        {
            return false;
        }
        future::block_on(self.await_reply(&reply)).unwrap_or(false)
    }

    /// Live update stream.  `None` when every subscriber slot is taken.
    pub fn subscribe(&self) -> Option<UpdateSubscriber<'_>> {
        self.shared.updates.subscriber().ok()
    }

    /// Stop the worker and wait up to the grace period for it to finish.
    ///
    /// Returns `true` if the worker stopped in time.  Idempotent.
    pub fn shutdown(&mut self) -> bool {
        let Some(thread) = self.thread.take() else {
            return true;
        };
        info!("gateway: shutdown requested");
        self.shared.shutdown.signal(());
        let stopped = future::block_on(future::or(
            async {
                self.shared.stopped.wait().await;
                true
            },
            async {
                async_io_mini::Timer::after(self.grace).await;
                false
            },
        ));
        if stopped {
            if thread.join().is_err() {
                warn!("gateway: worker thread panicked");
            }
        } else {
            warn!("gateway: worker did not stop within {:?}, abandoning", self.grace);
        }
        stopped
    }

    /// Wait for the worker's answer.  `None` if the request was withdrawn
    /// before the worker took it.
    async fn await_reply<T>(&self, reply: &ReplySlot<T>) -> Option<T> {
        let answered = future::or(async { Some(reply.wait().await) }, async {
            async_io_mini::Timer::after(self.reply_timeout).await;
            None
        })
        .await;
        if answered.is_some() {
            return answered;
        }
        if reply.abandon() {
            warn!("gateway: no reply within {:?}, request withdrawn", self.reply_timeout);
            return None;
        }
        // The worker took it just before the deadline; its answer is coming.
        Some(reply.wait().await)
    }

    fn request(&self, request: Request) -> Result<()> {
        if self.shared.is_closed() {
            return Err(Error::Unavailable);
        }
        self.shared.inbox.try_send(request).map_err(|_| {
            warn!("gateway: inbox full");
            Error::Unavailable
        })
    }
}

impl Drop for GatewayHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shared.shutdown.signal(());
        }
    }
}
