//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                    |
//! |------------|--------------------|--------------------------------|
//! | `log_sink` | EventSink          | Serial log output              |
//! | `mqtt`     | TransportPort      | ESP-IDF WiFi STA + MQTT client |
//! | `nvs`      | ConfigPort         | NVS / in-memory store          |
//! |            | StoragePort        | (EEPROM-style byte region)     |
//! | `panel`    | PanelPort          | Button + indicator GPIO        |
//! | `time`     | —                  | ESP32 high-resolution timer    |

pub mod log_sink;
#[cfg(target_os = "espidf")]
pub mod mqtt;
pub mod nvs;
pub mod panel;
pub mod time;
