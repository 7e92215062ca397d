//! Integration test driver for `tests/integration/` submodules.
//!
//! These run a real worker thread against the host loopback broker and
//! drive it through `GatewayHandle` and the operator API.  All tests run
//! on the host with no network required.

mod api_tests;
mod mock_adapters;
mod worker_tests;
