//! Shared fixtures: a recording update sink and a running gateway.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use binfleet::GatewayHandle;
use binfleet::adapters::mqtt::{MqttBroker, SimBroker};
use binfleet::adapters::time::SystemClock;
use binfleet::app::events::GatewayUpdate;
use binfleet::app::ports::UpdateSink;
use binfleet::config::GatewayConfig;
use binfleet::link::LinkState;
use binfleet::runtime::Gateway;

pub const MAIN: &str = "trash_collector_main";
pub const SUB: &str = "trash_collector_sub";

/// Records every update; clones share the same buffer.
#[derive(Clone, Default)]
pub struct RecordingSink {
    updates: Arc<Mutex<Vec<GatewayUpdate>>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<GatewayUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn link_states(&self) -> Vec<LinkState> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                GatewayUpdate::LinkChanged(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

impl UpdateSink for RecordingSink {
    fn emit(&mut self, update: &GatewayUpdate) {
        self.updates.lock().unwrap().push(update.clone());
    }
}

pub struct Running {
    pub handle: GatewayHandle,
    pub sim: SimBroker,
    pub sink: RecordingSink,
}

pub fn fast_config() -> GatewayConfig {
    GatewayConfig {
        backoff_base_ms: 20,
        backoff_max_ms: 100,
        backoff_jitter_percent: 0,
        housekeeping_interval_ms: 100,
        ..Default::default()
    }
}

/// Start a gateway on the loopback broker.  `prepare` runs before the
/// worker starts, e.g. to make the broker refuse connects.
pub fn start_with(config: GatewayConfig, prepare: impl FnOnce(&SimBroker)) -> Running {
    let gateway = Gateway::new(config.clone()).unwrap();
    let broker = MqttBroker::new(&config, gateway.link_sender());
    let sim = broker.sim();
    prepare(&sim);
    let sink = RecordingSink::default();
    let handle = gateway
        .spawn(broker, SystemClock::new(), sink.clone())
        .unwrap();
    Running { handle, sim, sink }
}

/// Start and wait until the link is subscribed.
pub fn start() -> Running {
    let running = start_with(fast_config(), |_| {});
    wait_subscribed(&running.handle);
    running
}

pub fn wait_subscribed(handle: &GatewayHandle) {
    wait_until("link subscribed", || {
        handle.snapshot().link == LinkState::Subscribed
    });
}

/// Poll `cond` until it holds, panicking after two seconds.
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}
