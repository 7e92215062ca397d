//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements   | Connects to                       |
//! |------------|--------------|-----------------------------------|
//! | `mqtt`     | BrokerPort   | ESP-IDF MQTT client / loopback    |
//! | `time`     | ClockPort    | ESP32 system timer, SNTP time     |
//! | `log_sink` | UpdateSink   | Serial log output                 |
//! | `nvs`      | ConfigPort   | NVS / in-memory store             |
//! | `http`     | (driving)    | `EspHttpServer` → operator API    |
//! | `wifi`     | (boot only)  | ESP-IDF WiFi STA                  |

#[cfg(target_os = "espidf")]
pub mod http;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub(super) mod utils;
pub mod wifi;
