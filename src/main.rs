//! SmartBin gateway firmware entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  MqttBroker     SystemClock   LogUpdateSink   NvsAdapter     │
//! │  (BrokerPort)   (ClockPort)   (UpdateSink)    (ConfigPort)   │
//! │  http::serve ──▶ api::handle ──▶ GatewayHandle               │
//! │                                                              │
//! │  ─────────────── Port trait boundary ────────────────        │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────┐      │
//! │  │  Worker thread: GatewayCore + LinkSupervisor       │      │
//! │  └────────────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::{Context, Result};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::EspSntp;
use log::{info, warn};

use binfleet::Gateway;
use binfleet::adapters::log_sink::LogUpdateSink;
use binfleet::adapters::mqtt::MqttBroker;
use binfleet::adapters::nvs::NvsAdapter;
use binfleet::adapters::time::SystemClock;
use binfleet::adapters::{http, wifi};
use binfleet::config::GatewayConfig;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  SmartBin gateway v{}             ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let config = match NvsAdapter::new() {
        Ok(nvs) => nvs.load_or_init(),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults", e);
            GatewayConfig::default()
        }
    };

    // ── 3. Network ────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let _wifi = wifi::connect_station(
        peripherals.modem,
        sysloop,
        EspDefaultNvsPartition::take().ok(),
        &config.wifi_ssid,
        &config.wifi_password,
    )
    .context("WiFi bring-up")?;
    // Event timestamps are wall time; keep SNTP running for the process lifetime.
    let _sntp = EspSntp::new_default()?;

    // ── 4. Gateway ────────────────────────────────────────────
    let gateway = Gateway::new(config.clone()).map_err(|e| anyhow::anyhow!("config: {e}"))?;
    let broker = MqttBroker::new(&config, gateway.link_sender());
    let handle = Arc::new(gateway.spawn(broker, SystemClock::new(), LogUpdateSink::new())?);

    // ── 5. Operator API ───────────────────────────────────────
    let _server = http::serve(handle, config.http_port)?;

    info!("Gateway ready.");
    loop {
        std::thread::park();
    }
}
