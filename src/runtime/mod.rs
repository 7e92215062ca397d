//! Gateway runtime: wiring the core to its worker thread.
//!
//! ```text
//!  Gateway::new(config)          validate, build core + shared block
//!     .link_sender()             hand to the broker adapter callback
//!     .spawn(broker, clock, sink) ──▶ GatewayHandle
//! ```

pub mod channels;
pub mod handle;
pub mod worker;

use core::time::Duration;
use std::sync::Arc;

use log::info;

use crate::app::ports::{BrokerPort, ClockPort, ConfigError, UpdateSink};
use crate::app::service::GatewayCore;
use crate::config::GatewayConfig;
use crate::link::{LinkState, LinkSupervisor};

pub use channels::{LinkMessage, LinkSender, Shared, UpdateSubscriber};
pub use handle::GatewayHandle;
pub use worker::Worker;

/// A configured gateway that has not started yet.
pub struct Gateway {
    config: GatewayConfig,
    core: Box<GatewayCore>,
    shared: Arc<Shared>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let core = Box::new(GatewayCore::new(&config));
        Ok(Self::assemble(config, core))
    }

    /// Start from a pre-built core.
    pub fn with_core(config: GatewayConfig, core: GatewayCore) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(config, Box::new(core)))
    }

    fn assemble(config: GatewayConfig, core: Box<GatewayCore>) -> Self {
        let shared = Arc::new(Shared::new(core.snapshot(LinkState::Disconnected)));
        Self {
            config,
            core,
            shared,
        }
    }

    /// Sender for the broker adapter's inbound callback.
    pub fn link_sender(&self) -> LinkSender {
        LinkSender::new(self.shared.clone())
    }

    /// Start the worker thread.  The worker connects the link itself.
    pub fn spawn<B, C, S>(self, broker: B, clock: C, sink: S) -> std::io::Result<GatewayHandle>
    where
        B: BrokerPort + Send + 'static,
        C: ClockPort + Send + 'static,
        S: UpdateSink + Send + 'static,
    {
        let fleet = self.core.fleet();
        let link = LinkSupervisor::from_config(broker, &self.config);
        let worker = Worker::new(
            self.core,
            link,
            clock,
            sink,
            self.shared.clone(),
            Duration::from_millis(u64::from(self.config.housekeeping_interval_ms)),
        );
        let thread = worker::spawn(worker)?;
        info!("gateway: worker spawned for {} bins", fleet.size());
        Ok(GatewayHandle::new(
            self.shared,
            fleet,
            Duration::from_millis(u64::from(self.config.shutdown_grace_ms)),
            Duration::from_millis(u64::from(self.config.reply_timeout_ms)),
            thread,
        ))
    }
}
