//! Station-mode network bring-up.
//!
//! This module contains:
//! - [`event`]: system event type, [`EventSource`] seam and the host [`EventBus`]
//! - [`signal`]: event-group signalling for the blocking wait
//! - [`orchestrator`]: the connection state machine
//! - `esp`: ESP-IDF Wi-Fi driver and system event loop adapters (ESP32 only)
//!
//! # Example
//!
//! ```ignore
//! use esp32_cam_node::network::{Connection, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(station);
//! let (connection, link) = orchestrator.bring_up(&events, &wifi)?;
//! if let Connection::Connected(ip) = connection {
//!     println!("Connected, IP: {}", ip);
//! }
//! ```

mod event;
mod orchestrator;
mod signal;

#[cfg(feature = "esp32")]
mod esp;

pub use event::{BusSubscription, EventBus, EventSource, SystemEvent};
pub use orchestrator::{
    next_state, Action, Connection, ConnectionState, Orchestrator, StationDriver, StationLink,
};
pub use signal::{EventGroup, CONNECTED_BIT, FAILED_BIT};

#[cfg(feature = "esp32")]
pub use esp::{EspStation, SystemEventSource, SystemSubscription};

use crate::config::ConfigError;

/// Network errors.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Credentials rejected before reaching the driver.
    #[error("invalid credentials: {0}")]
    Credentials(#[from] ConfigError),
    /// Attaching to the event source failed.
    #[error("event subscription failed: {0}")]
    Subscribe(String),
    /// The driver refused an operation.
    #[error("station driver error: {0}")]
    Driver(String),
    /// ESP-IDF error.
    #[cfg(feature = "esp32")]
    #[error("ESP error: {0}")]
    Esp(#[from] esp_idf_sys::EspError),
}
