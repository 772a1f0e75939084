//! Device-layer seams.
//!
//! The configurator only talks to the sensor through these traits, so the
//! same bring-up logic runs against the esp32-camera driver on the device
//! and against [`crate::sim::SimulatedCamera`] on the host.

use super::config::{CaptureConfig, InvalidConfig};
use super::sensor::{Calibration, SensorId};
use super::types::FrameSize;

/// Initializes the physical device.
pub trait CameraDriver {
    /// Handle to the live device.
    type Handle: SensorControl;

    /// Allocate frame buffers and bring the sensor up.
    fn initialize(&mut self, config: &CaptureConfig) -> Result<Self::Handle, CameraError>;
}

/// Post-init sensor controls.
pub trait SensorControl {
    /// Product id read back from the sensor.
    fn sensor_id(&self) -> SensorId;

    /// Apply a calibration triple in one go.
    fn apply_calibration(&mut self, calibration: &Calibration) -> Result<(), CameraError>;

    /// Change the output resolution without reallocating buffers.
    fn set_frame_size(&mut self, size: FrameSize) -> Result<(), CameraError>;
}

/// Source of captured frames, used by the frame server.
pub trait FrameSource {
    /// Grab one frame and copy it out of the driver's buffer.
    fn capture(&mut self) -> Result<Frame, CameraError>;
}

/// One captured frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u16,
    pub height: u16,
    pub data: Vec<u8>,
}

/// Camera errors.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// The selected configuration broke an invariant.
    #[error("invalid capture configuration: {0}")]
    InvalidConfig(#[from] InvalidConfig),
    /// Driver initialization failed with the given status code.
    #[error("camera init failed with error 0x{0:x}")]
    Init(i32),
    /// A sensor control call returned non-zero.
    #[error("sensor control '{control}' failed with status {status}")]
    Control { control: &'static str, status: i32 },
    /// The driver has no sensor object after init.
    #[error("no sensor attached")]
    NoSensor,
    /// Frame capture returned no buffer.
    #[error("frame capture failed")]
    Capture,
    /// Runtime tier would outgrow the allocated buffers.
    #[error("frame size {requested} exceeds allocated {allocated}")]
    TierTooLarge {
        requested: FrameSize,
        allocated: FrameSize,
    },
    /// Runtime resolution changes only apply to JPEG streams.
    #[error("frame size is fixed for raw pixel formats")]
    FixedFrameSize,
}
