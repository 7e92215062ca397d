//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules of the gateway: command
//! validation and dispatch, telemetry routing, Collect lifecycle tracking
//! and the read-side snapshot.  All interaction with the broker, clock and
//! storage happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without a network.

pub mod commands;
pub mod dispatcher;
pub mod events;
pub mod ports;
pub mod service;
pub mod view;
