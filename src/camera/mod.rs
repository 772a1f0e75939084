//! Capture device configuration and bring-up.
//!
//! This module contains:
//! - [`types`]: pixel formats, frame-size tiers, buffer placement
//! - [`pins`]: per-board wiring
//! - [`sensor`]: sensor product ids and their factory corrections
//! - [`config`]: capability-aware configuration selection
//! - [`driver`]: the traits a camera backend implements
//! - [`configurator`]: initialize, calibrate and set the starting tier
//! - `esp`: esp32-camera backend (ESP32 only)
//!
//! # Example
//!
//! ```
//! use esp32_cam_node::camera::{
//!     Board, CameraConfigurator, MemoryCapability, PixelFormat, SensorId,
//! };
//! use esp32_cam_node::sim::SimulatedCamera;
//!
//! let mut driver = SimulatedCamera::new(SensorId::OV2640);
//! let camera = CameraConfigurator::new(Board::XiaoEsp32S3, PixelFormat::Jpeg)
//!     .bring_up(&mut driver, MemoryCapability::PRESENT)
//!     .unwrap();
//! assert!(camera.active_tier() <= camera.allocated_tier());
//! ```

pub mod config;
pub mod configurator;
pub mod driver;
pub mod pins;
pub mod sensor;
pub mod types;

#[cfg(feature = "esp32")]
mod esp;

pub use config::{
    CaptureConfig, InvalidConfig, XclkSource, DEFAULT_JPEG_QUALITY, HIGH_FIDELITY_JPEG_QUALITY,
    MAX_FB_COUNT, MAX_JPEG_QUALITY, XCLK_FREQ_HZ,
};
pub use configurator::{ActiveCamera, CameraConfigurator, CameraSummary};
pub use driver::{CameraDriver, CameraError, Frame, FrameSource, SensorControl};
pub use pins::{Board, CameraPins};
pub use sensor::{Calibration, SensorId};
pub use types::{FbLocation, FrameSize, GrabMode, HardwareTarget, MemoryCapability, PixelFormat};

#[cfg(feature = "esp32")]
pub use esp::{detect_memory_capability, EspCamera, EspSensor};
