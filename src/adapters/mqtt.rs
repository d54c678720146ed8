//! Wi-Fi station + MQTT transport adapter (device only).
//!
//! Implements [`TransportPort`] on top of `esp_idf_svc::wifi::BlockingWifi`
//! and `esp_idf_svc::mqtt::client::EspMqttClient`.
//!
//! The MQTT client is created lazily on the first `connect()` and from
//! then on reconnects to the broker by itself; its event callback keeps an
//! atomic "session up" flag current.  `connect()` therefore only has to
//! bring the station link up, make sure the client exists, and report
//! whether the session is established.  The report publisher decides when
//! to ask again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{info, warn};

use crate::app::ports::TransportPort;
use crate::config::NodeConfig;
use crate::error::CommsError;

pub struct MqttTransport {
    wifi: BlockingWifi<EspWifi<'static>>,
    client: Option<EspMqttClient<'static>>,
    session_up: Arc<AtomicBool>,
    url: heapless::String<64>,
    client_id: heapless::String<32>,
}

impl MqttTransport {
    /// Configure and start the Wi-Fi station.  Does not associate yet.
    pub fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        config: &NodeConfig,
    ) -> anyhow::Result<Self> {
        let esp_wifi = EspWifi::new(modem, sys_loop.clone(), nvs)?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;

        let auth_method = if config.wifi_password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: config
                .wifi_ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow::anyhow!("wifi ssid too long"))?,
            password: config
                .wifi_password
                .as_str()
                .try_into()
                .map_err(|_| anyhow::anyhow!("wifi password too long"))?,
            auth_method,
            ..Default::default()
        }))?;
        wifi.start()?;
        info!("WiFi: started, station '{}'", config.wifi_ssid);

        Ok(Self {
            wifi,
            client: None,
            session_up: Arc::new(AtomicBool::new(false)),
            url: config.mqtt_url.clone(),
            client_id: config.mqtt_client_id.clone(),
        })
    }

    fn wifi_up(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn bring_up_wifi(&mut self) -> Result<(), CommsError> {
        info!("WiFi: connecting");
        self.wifi
            .connect()
            .and_then(|()| self.wifi.wait_netif_up())
            .map_err(|e| {
                warn!("WiFi: connect failed ({})", e);
                let _ = self.wifi.disconnect();
                CommsError::WifiConnectFailed
            })?;
        info!("WiFi: connected, netif up");
        Ok(())
    }

    fn ensure_client(&mut self) -> Result<(), CommsError> {
        if self.client.is_some() {
            return Ok(());
        }
        let conf = MqttClientConfiguration {
            client_id: Some(self.client_id.as_str()),
            ..Default::default()
        };
        let flag = Arc::clone(&self.session_up);
        let client = EspMqttClient::new_cb(self.url.as_str(), &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => {
                    info!("MQTT: session established");
                    flag.store(true, Ordering::Release);
                }
                EventPayload::Disconnected => {
                    warn!("MQTT: session lost");
                    flag.store(false, Ordering::Release);
                }
                EventPayload::Error(e) => warn!("MQTT: {:?}", e),
                _ => {}
            }
        })
        .map_err(|e| {
            warn!("MQTT: client creation failed ({})", e);
            CommsError::MqttNotConnected
        })?;
        info!("MQTT: client started for {}", self.url);
        self.client = Some(client);
        Ok(())
    }
}

impl TransportPort for MqttTransport {
    fn is_connected(&self) -> bool {
        self.wifi_up() && self.session_up.load(Ordering::Acquire)
    }

    fn connect(&mut self) -> Result<(), CommsError> {
        if !self.wifi_up() {
            self.bring_up_wifi()?;
        }
        self.ensure_client()?;
        if self.session_up.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(CommsError::MqttNotConnected)
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::MqttNotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: publish to '{}' failed ({})", topic, e);
                CommsError::MqttPublishFailed
            })
    }
}
