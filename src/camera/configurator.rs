//! Camera bring-up: select, initialize, calibrate, start small.
//!
//! Buffers are allocated for the configured tier, but a JPEG stream starts at
//! [`FrameSize::STREAM_START_TIER`] so the first frames arrive quickly. The
//! two tiers are kept apart in [`ActiveCamera`]; the active tier may later be
//! raised up to the allocated one without reallocating.

use super::config::CaptureConfig;
use super::driver::{CameraDriver, CameraError, FrameSource, Frame, SensorControl};
use super::pins::Board;
use super::sensor::SensorId;
use super::types::{
    FbLocation, FrameSize, GrabMode, HardwareTarget, MemoryCapability, PixelFormat,
};
use log::{error, info, warn};
use serde::Serialize;

/// Builds and initializes the capture device for one board and format.
#[derive(Debug, Clone, Copy)]
pub struct CameraConfigurator {
    board: Board,
    format: PixelFormat,
}

impl CameraConfigurator {
    pub fn new(board: Board, format: PixelFormat) -> Self {
        Self { board, format }
    }

    /// The configuration that [`bring_up`](Self::bring_up) will hand to the driver.
    pub fn select(&self, capability: MemoryCapability) -> CaptureConfig {
        CaptureConfig::select(self.format, capability, self.board)
    }

    /// Initialize the device and apply post-init adjustments.
    ///
    /// Initialization failure is returned as-is and is not retried. A failed
    /// adjustment after that is logged and leaves the camera uncalibrated or
    /// at its allocated tier.
    pub fn bring_up<D: CameraDriver>(
        &self,
        driver: &mut D,
        capability: MemoryCapability,
    ) -> Result<ActiveCamera<D::Handle>, CameraError> {
        if let Some(chip) = HardwareTarget::built_for() {
            if chip != self.board.target() {
                warn!(
                    "{} carries {:?}, firmware built for {:?}",
                    self.board.name(),
                    self.board.target(),
                    chip
                );
            }
        }

        let config = self.select(capability);
        config.validate(capability)?;

        info!(
            "Camera config: {} {} in {:?} x{} ({:?}, quality {})",
            config.pixel_format,
            config.frame_size,
            config.fb_location,
            config.fb_count,
            config.grab_mode,
            config.jpeg_quality
        );

        let mut handle = driver.initialize(&config).map_err(|e| {
            error!("{}", e);
            e
        })?;

        let sensor = handle.sensor_id();
        info!("Sensor: {}", sensor);

        let calibrated = match sensor.calibration() {
            Some(calibration) => match handle.apply_calibration(&calibration) {
                Ok(()) => {
                    info!("Applied factory correction: {:?}", calibration);
                    true
                }
                Err(e) => {
                    warn!("Factory correction not applied: {}", e);
                    false
                }
            },
            None => false,
        };

        let active_tier = if config.pixel_format.is_jpeg() {
            match handle.set_frame_size(FrameSize::STREAM_START_TIER) {
                Ok(()) => FrameSize::STREAM_START_TIER,
                Err(e) => {
                    warn!("Staying at {}: {}", config.frame_size, e);
                    config.frame_size
                }
            }
        } else {
            config.frame_size
        };

        Ok(ActiveCamera {
            handle,
            summary: CameraSummary {
                sensor,
                pixel_format: config.pixel_format,
                allocated_tier: config.frame_size,
                active_tier,
                fb_location: config.fb_location,
                fb_count: config.fb_count,
                grab_mode: config.grab_mode,
                jpeg_quality: config.jpeg_quality,
                calibrated,
            },
        })
    }
}

/// Snapshot of what the camera was brought up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CameraSummary {
    pub sensor: SensorId,
    pub pixel_format: PixelFormat,
    /// Tier the buffers were sized for.
    pub allocated_tier: FrameSize,
    /// Tier the sensor currently outputs. Never larger than `allocated_tier`.
    pub active_tier: FrameSize,
    pub fb_location: FbLocation,
    pub fb_count: u8,
    pub grab_mode: GrabMode,
    pub jpeg_quality: u8,
    pub calibrated: bool,
}

/// An initialized camera, ready to be handed to the server.
#[derive(Debug)]
pub struct ActiveCamera<H> {
    handle: H,
    summary: CameraSummary,
}

impl<H: SensorControl> ActiveCamera<H> {
    pub fn summary(&self) -> &CameraSummary {
        &self.summary
    }

    pub fn allocated_tier(&self) -> FrameSize {
        self.summary.allocated_tier
    }

    pub fn active_tier(&self) -> FrameSize {
        self.summary.active_tier
    }

    /// Change the output tier within the allocated buffers.
    pub fn set_active_tier(&mut self, tier: FrameSize) -> Result<(), CameraError> {
        if !self.summary.pixel_format.is_jpeg() {
            return Err(CameraError::FixedFrameSize);
        }
        if tier > self.summary.allocated_tier {
            return Err(CameraError::TierTooLarge {
                requested: tier,
                allocated: self.summary.allocated_tier,
            });
        }
        self.handle.set_frame_size(tier)?;
        self.summary.active_tier = tier;
        info!("Active frame size now {}", tier);
        Ok(())
    }
}

impl<H: SensorControl + FrameSource> FrameSource for ActiveCamera<H> {
    fn capture(&mut self) -> Result<Frame, CameraError> {
        self.handle.capture()
    }
}
