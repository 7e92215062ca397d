//! SmartBin fleet gateway library.
//!
//! Bridges the bins and the collector robot (MQTT) to operators (JSON
//! API).  The pure-logic modules build and test on the host; everything
//! ESP-IDF-specific is guarded by `#[cfg(target_os = "espidf")]` inside
//! the adapters.
//!
//! ```text
//!  bins / robot ──MQTT──▶ adapters::mqtt ──LinkSender──▶ runtime::Worker
//!                                                          │ owns
//!                                                          ▼
//!                          GatewayCore (store, log, dispatcher) + LinkSupervisor
//!                                                          │ updates
//!  operators ◀──HTTP── adapters::http ◀── api ◀── GatewayHandle (snapshot, submit)
//! ```

#![deny(unused_must_use)]

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod event_log;
pub mod fleet;
pub mod link;
pub mod protocol;
pub mod runtime;

pub mod adapters;

mod util;

pub use error::{Error, Result};
pub use runtime::{Gateway, GatewayHandle};
