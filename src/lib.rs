//! ESP32 camera node firmware library.
//!
//! Brings up a camera module with a configuration that fits the memory the
//! board actually has, joins a Wi-Fi network and retries indefinitely until
//! an address is assigned, then hands the camera to an HTTP frame server.
//!
//! Everything except the `esp` backends is platform-independent and tested
//! on the host against the simulated drivers in [`sim`].

// Allow the crate to reference itself by name (needed for proc-macro generated code)
extern crate self as esp32_cam_node;

pub mod bringup;
pub mod camera;
pub mod config;
pub mod network;
pub mod server;
pub mod sim;
#[cfg(feature = "tap-tests")]
pub mod testing;

// Re-export commonly used items
pub use bringup::{BringUp, BringUpError, Ready};
pub use camera::{ActiveCamera, CameraConfigurator, CaptureConfig, FrameSize, PixelFormat};
pub use config::{AppConfig, ConfigError, WifiConfig};
pub use network::{Connection, ConnectionState, EventBus, Orchestrator};
pub use server::{FrameServer, FrameService};
