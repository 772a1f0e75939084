//! ESP-IDF adapters for the connection orchestrator.
//!
//! [`EspStation`] wraps the non-blocking `EspWifi` driver; connect attempts
//! are issued from the system event loop task, so the driver sits behind a
//! mutex. [`SystemEventSource`] maps Wi-Fi and IP events from the default
//! event loop onto [`SystemEvent`].

use super::event::{EventSource, SystemEvent};
use super::orchestrator::StationDriver;
use super::NetworkError;
use crate::config::{AuthThreshold, WifiConfig};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::netif::IpEvent;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent};
use esp_idf_sys::{esp, esp_wifi_set_mode, wifi_mode_t_WIFI_MODE_STA};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Station-mode Wi-Fi driver.
pub struct EspStation {
    wifi: Mutex<EspWifi<'static>>,
}

impl EspStation {
    /// Create the Wi-Fi driver.
    ///
    /// # Arguments
    ///
    /// * `modem` - The WiFi/BT modem peripheral
    /// * `sysloop` - The ESP-IDF system event loop
    /// * `nvs` - NVS partition for the driver's calibration data
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<Self, NetworkError> {
        let wifi = EspWifi::new(modem, sysloop, nvs)?;
        Ok(Self {
            wifi: Mutex::new(wifi),
        })
    }

    fn wifi(&self) -> MutexGuard<'_, EspWifi<'static>> {
        self.wifi.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn auth_method(threshold: AuthThreshold) -> AuthMethod {
    match threshold {
        AuthThreshold::Open => AuthMethod::None,
        AuthThreshold::Wep => AuthMethod::WEP,
        AuthThreshold::Wpa => AuthMethod::WPA,
        AuthThreshold::Wpa2 => AuthMethod::WPA2Personal,
        AuthThreshold::Wpa3 => AuthMethod::WPA3Personal,
        AuthThreshold::Wpa2Wpa3 => AuthMethod::WPA2WPA3Personal,
    }
}

impl StationDriver for EspStation {
    fn set_station_mode(&self) -> Result<(), NetworkError> {
        let _wifi = self.wifi();
        esp!(unsafe { esp_wifi_set_mode(wifi_mode_t_WIFI_MODE_STA) })?;
        Ok(())
    }

    fn set_credentials(&self, config: &WifiConfig) -> Result<(), NetworkError> {
        let client = ClientConfiguration {
            ssid: config
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| NetworkError::Driver("SSID does not fit driver buffer".into()))?,
            password: config
                .password
                .as_str()
                .try_into()
                .map_err(|_| NetworkError::Driver("password does not fit driver buffer".into()))?,
            auth_method: auth_method(config.effective_auth()),
            ..Default::default()
        };
        self.wifi().set_configuration(&Configuration::Client(client))?;
        Ok(())
    }

    fn start(&self) -> Result<(), NetworkError> {
        self.wifi().start()?;
        Ok(())
    }

    fn connect(&self) -> Result<(), NetworkError> {
        self.wifi().connect()?;
        Ok(())
    }
}

/// The default ESP-IDF event loop as an [`EventSource`].
#[derive(Clone)]
pub struct SystemEventSource {
    sysloop: EspSystemEventLoop,
}

impl SystemEventSource {
    pub fn new(sysloop: EspSystemEventLoop) -> Self {
        Self { sysloop }
    }
}

/// Wi-Fi and IP event subscriptions; dropping it unregisters both.
pub struct SystemSubscription {
    _wifi: EspSubscription<'static, System>,
    _ip: EspSubscription<'static, System>,
}

impl EventSource for SystemEventSource {
    type Subscription = SystemSubscription;

    fn subscribe<F>(&self, handler: F) -> Result<SystemSubscription, NetworkError>
    where
        F: FnMut(&SystemEvent) + Send + 'static,
    {
        let handler = Arc::new(Mutex::new(handler));

        let wifi_handler = handler.clone();
        let wifi = self.sysloop.subscribe::<WifiEvent, _>(move |event| {
            let event = match event {
                WifiEvent::StaStarted => SystemEvent::StaStarted,
                WifiEvent::StaStopped => SystemEvent::StaStopped,
                WifiEvent::StaConnected(_) => SystemEvent::StaConnected,
                WifiEvent::StaDisconnected(_) => SystemEvent::StaDisconnected,
                _ => SystemEvent::Other("wifi"),
            };
            let mut handler = wifi_handler.lock().unwrap_or_else(PoisonError::into_inner);
            (*handler)(&event);
        })?;

        let ip_handler = handler;
        let ip = self.sysloop.subscribe::<IpEvent, _>(move |event| {
            let event = match event {
                IpEvent::DhcpIpAssigned(assignment) => SystemEvent::StaGotIp(assignment.ip()),
                _ => SystemEvent::Other("ip"),
            };
            let mut handler = ip_handler.lock().unwrap_or_else(PoisonError::into_inner);
            (*handler)(&event);
        })?;

        Ok(SystemSubscription {
            _wifi: wifi,
            _ip: ip,
        })
    }
}
