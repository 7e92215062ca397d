//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`] on top of the ESP-IDF MQTT client.  Inbound
//! traffic never goes through the port: the client callback forwards each
//! complete message, and every connection loss, to the worker through a
//! [`LinkSender`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` with a callback.  A new
//!   client is created per `connect()`, so the link supervisor owns the
//!   reconnect policy instead of esp-mqtt.
//! - **all other targets**: an in-process loopback broker.  Publishes on a
//!   subscribed topic are delivered back, as a real broker would, and a
//!   [`SimBroker`] handle lets tests inject traffic, drop the connection
//!   or refuse connects.
//!
//! All publishes and subscriptions are QoS 0.

use log::{info, warn};

use crate::app::ports::BrokerPort;
use crate::config::GatewayConfig;
use crate::error::TransportError;
use crate::runtime::LinkSender;

#[cfg(target_os = "espidf")]
use core::time::Duration;
#[cfg(target_os = "espidf")]
use std::sync::Arc;
#[cfg(target_os = "espidf")]
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(target_os = "espidf")]
use embassy_sync::signal::Signal;
#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
};

#[cfg(target_os = "espidf")]
use crate::runtime::channels::RawMutex;

/// How long `connect()` waits for the broker's CONNACK.  The worker is
/// blocked for that long, so it stays under the default reply timeout.
#[cfg(target_os = "espidf")]
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

// ───────────────────────────────────────────────────────────────
// ESP-IDF client
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct MqttBroker {
    url: String,
    client_id: heapless::String<32>,
    username: heapless::String<32>,
    password: heapless::String<64>,
    link: LinkSender,
    client: Option<EspMqttClient<'static>>,
    /// Set on CONNACK.  Cleared before a deliberate drop so the callback
    /// does not report it as a loss.
    up: Arc<AtomicBool>,
}

#[cfg(target_os = "espidf")]
impl MqttBroker {
    pub fn new(config: &GatewayConfig, link: LinkSender) -> Self {
        Self {
            url: format!("{}:{}", config.broker_url, config.broker_port),
            client_id: config.client_id.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            link,
            client: None,
            up: Arc::new(AtomicBool::new(false)),
        }
    }

    fn client(&mut self) -> Result<&mut EspMqttClient<'static>, TransportError> {
        self.client.as_mut().ok_or(TransportError::NotConnected)
    }
}

#[cfg(target_os = "espidf")]
impl BrokerPort for MqttBroker {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.disconnect();

        let conf = MqttClientConfiguration {
            client_id: Some(self.client_id.as_str()),
            username: (!self.username.is_empty()).then_some(self.username.as_str()),
            password: (!self.password.is_empty()).then_some(self.password.as_str()),
            disable_auto_reconnect: true,
            ..Default::default()
        };

        let connack: Arc<Signal<RawMutex, bool>> = Arc::new(Signal::new());
        let up = Arc::new(AtomicBool::new(false));
        self.up = up.clone();
        let link = self.link.clone();
        let cb_connack = connack.clone();

        let client = EspMqttClient::new_cb(&self.url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => {
                up.store(true, Ordering::Release);
                cb_connack.signal(true);
            }
            EventPayload::Disconnected => {
                // Only a drop after CONNACK is a loss; before it, connect() times out.
                if up.swap(false, Ordering::AcqRel) {
                    link.lost();
                } else {
                    cb_connack.signal(false);
                }
            }
            EventPayload::Received {
                topic: Some(topic),
                data,
                details: Details::Complete,
                ..
            } => link.deliver(topic, data),
            EventPayload::Received { .. } => {
                warn!("MQTT: fragmented or topic-less message dropped");
            }
            EventPayload::Error(e) => warn!("MQTT: {:?}", e),
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client init failed: {}", e);
            TransportError::ConnectFailed
        })?;
        self.client = Some(client);

        let accepted = futures_lite::future::block_on(futures_lite::future::or(connack.wait(), async {
            async_io_mini::Timer::after(CONNECT_TIMEOUT).await;
            false
        }));
        if !accepted {
            warn!("MQTT: no CONNACK from {}", self.url);
            self.disconnect();
            return Err(TransportError::ConnectFailed);
        }
        info!("MQTT: connected to {}", self.url);
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.client()?
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: subscribe '{}' failed: {}", topic, e);
                TransportError::SubscribeFailed
            })
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.client()?
            .unsubscribe(topic)
            .map(|_| ())
            .map_err(|_| TransportError::SubscribeFailed)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.client()?
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: publish to '{}' failed: {}", topic, e);
                TransportError::PublishFailed
            })
    }

    fn disconnect(&mut self) {
        self.up.store(false, Ordering::Release);
        // Dropping the client stops the esp-mqtt task.
        if self.client.take().is_some() {
            info!("MQTT: disconnected");
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Host loopback broker
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub use sim::{MqttBroker, SimBroker};

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
    use std::time::Duration;

    use super::{BrokerPort, GatewayConfig, LinkSender, TransportError, info, warn};

    #[derive(Default)]
    struct SimState {
        connected: bool,
        subscriptions: Vec<String>,
        published: Vec<(String, Vec<u8>)>,
        refuse_connects: u32,
        connects: u32,
        fail_publishes: u32,
        publish_stall: Duration,
    }

    fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
        state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loopback broker for host builds.
    pub struct MqttBroker {
        url: String,
        link: LinkSender,
        state: Arc<Mutex<SimState>>,
    }

    impl MqttBroker {
        pub fn new(config: &GatewayConfig, link: LinkSender) -> Self {
            Self {
                url: format!("{}:{}", config.broker_url, config.broker_port),
                link,
                state: Arc::default(),
            }
        }

        /// Test-side handle to the simulated broker.
        pub fn sim(&self) -> SimBroker {
            SimBroker {
                link: self.link.clone(),
                state: self.state.clone(),
            }
        }
    }

    impl BrokerPort for MqttBroker {
        fn connect(&mut self) -> Result<(), TransportError> {
            let mut s = lock(&self.state);
            s.connects += 1;
            if s.refuse_connects > 0 {
                s.refuse_connects -= 1;
                warn!("MQTT(sim): refusing connect to {}", self.url);
                return Err(TransportError::ConnectFailed);
            }
            s.connected = true;
            info!("MQTT(sim): connected to {}", self.url);
            Ok(())
        }

        fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
            let mut s = lock(&self.state);
            if !s.connected {
                return Err(TransportError::NotConnected);
            }
            if !s.subscriptions.iter().any(|t| t == topic) {
                s.subscriptions.push(topic.into());
            }
            Ok(())
        }

        fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError> {
            let mut s = lock(&self.state);
            if !s.connected {
                return Err(TransportError::NotConnected);
            }
            s.subscriptions.retain(|t| t != topic);
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
            let (echo, stall) = {
                let mut s = lock(&self.state);
                if !s.connected {
                    return Err(TransportError::NotConnected);
                }
                if s.fail_publishes > 0 {
                    s.fail_publishes -= 1;
                    warn!("MQTT(sim): dropping publish to '{}'", topic);
                    return Err(TransportError::PublishFailed);
                }
                s.published.push((topic.into(), payload.to_vec()));
                (s.subscriptions.iter().any(|t| t == topic), s.publish_stall)
            };
            // A slow network write: the caller stays blocked, the broker
            // already has the message.
            if !stall.is_zero() {
                std::thread::sleep(stall);
            }
            if echo {
                self.link.deliver(topic, payload);
            }
            Ok(())
        }

        fn disconnect(&mut self) {
            let mut s = lock(&self.state);
            s.connected = false;
            s.subscriptions.clear();
        }
    }

    /// Shared control surface of a [`MqttBroker`] simulation.
    #[derive(Clone)]
    pub struct SimBroker {
        link: LinkSender,
        state: Arc<Mutex<SimState>>,
    }

    impl SimBroker {
        /// A device publishes `payload` on `topic`.  Delivered only if the
        /// gateway is subscribed to it.
        pub fn inject(&self, topic: &str, payload: &[u8]) -> bool {
            let subscribed = {
                let s = lock(&self.state);
                s.connected && s.subscriptions.iter().any(|t| t == topic)
            };
            if subscribed {
                self.link.deliver(topic, payload);
            }
            subscribed
        }

        /// Broker drops the connection.
        pub fn drop_connection(&self) {
            {
                let mut s = lock(&self.state);
                s.connected = false;
                s.subscriptions.clear();
            }
            self.link.lost();
        }

        /// Refuse the next `n` connect attempts.
        pub fn refuse_connects(&self, n: u32) {
            lock(&self.state).refuse_connects = n;
        }

        /// Fail the next `n` publishes with `PublishFailed`.
        pub fn fail_publishes(&self, n: u32) {
            lock(&self.state).fail_publishes = n;
        }

        /// Block every later publish for `stall` after the broker records it.
        pub fn stall_publishes(&self, stall: Duration) {
            lock(&self.state).publish_stall = stall;
        }

        pub fn is_connected(&self) -> bool {
            lock(&self.state).connected
        }

        pub fn connects(&self) -> u32 {
            lock(&self.state).connects
        }

        pub fn subscriptions(&self) -> Vec<String> {
            lock(&self.state).subscriptions.clone()
        }

        /// Everything the gateway published, oldest first.
        pub fn published(&self) -> Vec<(String, Vec<u8>)> {
            lock(&self.state).published.clone()
        }
    }
}
