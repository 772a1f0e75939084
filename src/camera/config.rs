//! Capability-aware capture configuration.
//!
//! [`CaptureConfig::select`] is a pure function of the target pixel format,
//! the detected [`MemoryCapability`] and the board. Every configuration it
//! returns passes [`CaptureConfig::validate`] for the same capability.
//!
//! # Example
//!
//! ```
//! use esp32_cam_node::camera::{
//!     Board, CaptureConfig, FbLocation, FrameSize, MemoryCapability, PixelFormat,
//! };
//!
//! let config =
//!     CaptureConfig::select(PixelFormat::Jpeg, MemoryCapability::ABSENT, Board::XiaoEsp32S3);
//! assert_eq!(config.fb_location, FbLocation::InternalRam);
//! assert_eq!(config.frame_size, FrameSize::Svga);
//! assert_eq!(config.fb_count, 1);
//! ```

use super::pins::{Board, CameraPins};
use super::types::{
    FbLocation, FrameSize, GrabMode, HardwareTarget, MemoryCapability, PixelFormat,
};

/// Sensor master clock.
pub const XCLK_FREQ_HZ: u32 = 20_000_000;

/// JPEG quality used unless external RAM allows the high-fidelity tier.
pub const DEFAULT_JPEG_QUALITY: u8 = 12;

/// JPEG quality when large buffers live in external RAM.
pub const HIGH_FIDELITY_JPEG_QUALITY: u8 = 10;

/// Worst quality value the driver accepts.
pub const MAX_JPEG_QUALITY: u8 = 63;

/// Most frame buffers the firmware ever allocates.
pub const MAX_FB_COUNT: u8 = 2;

/// LEDC peripheral used to generate XCLK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XclkSource {
    pub ledc_timer: u8,
    pub ledc_channel: u8,
}

impl Default for XclkSource {
    fn default() -> Self {
        Self {
            ledc_timer: 0,
            ledc_channel: 0,
        }
    }
}

/// Everything the driver needs to bring the sensor up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub pins: CameraPins,
    pub xclk: XclkSource,
    pub xclk_freq_hz: u32,
    pub pixel_format: PixelFormat,
    /// Allocated tier; buffers are sized for it.
    pub frame_size: FrameSize,
    pub fb_location: FbLocation,
    /// 1 or 2.
    pub fb_count: u8,
    pub grab_mode: GrabMode,
    /// 0-63, lower is better.
    pub jpeg_quality: u8,
}

impl CaptureConfig {
    /// Choose a mutually consistent configuration.
    ///
    /// JPEG with external RAM gets the largest tier, double buffering and
    /// latest-frame grabbing. JPEG without it drops to the internal RAM tier
    /// with a single buffer that is never overwritten. Raw formats always use
    /// the bounded square tier. Double-buffered raw capture depends on the
    /// chip the firmware is built for, or the board's chip off-device.
    pub fn select(format: PixelFormat, capability: MemoryCapability, board: Board) -> Self {
        let mut config = Self {
            pins: board.pins(),
            xclk: XclkSource::default(),
            xclk_freq_hz: XCLK_FREQ_HZ,
            pixel_format: format,
            frame_size: FrameSize::LARGEST,
            fb_location: FbLocation::ExternalRam,
            fb_count: 1,
            grab_mode: GrabMode::WhenEmpty,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        };

        if format.is_jpeg() {
            if capability.has_external_ram() {
                config.jpeg_quality = HIGH_FIDELITY_JPEG_QUALITY;
                config.fb_count = 2;
                config.grab_mode = GrabMode::Latest;
            } else {
                config.frame_size = FrameSize::INTERNAL_RAM_TIER;
                config.fb_location = FbLocation::InternalRam;
            }
        } else {
            config.frame_size = FrameSize::RAW_TIER;
            if capability.has_external_ram() {
                let chip = HardwareTarget::built_for().unwrap_or(board.target());
                if chip.supports_double_raw_buffer() {
                    config.fb_count = 2;
                }
            } else {
                config.fb_location = FbLocation::InternalRam;
            }
        }

        config
    }

    /// Check the placement and buffer invariants against the capability.
    pub fn validate(&self, capability: MemoryCapability) -> Result<(), InvalidConfig> {
        if self.fb_location == FbLocation::ExternalRam && !capability.has_external_ram() {
            return Err(InvalidConfig::ExternalRamUnavailable);
        }
        if self.fb_count == 0 || self.fb_count > MAX_FB_COUNT {
            return Err(InvalidConfig::FbCount {
                count: self.fb_count,
                max: MAX_FB_COUNT,
            });
        }
        if self.fb_count > 1 && self.fb_location != FbLocation::ExternalRam {
            return Err(InvalidConfig::MultipleBuffersInInternalRam {
                count: self.fb_count,
            });
        }
        if self.jpeg_quality > MAX_JPEG_QUALITY {
            return Err(InvalidConfig::JpegQuality {
                quality: self.jpeg_quality,
                max: MAX_JPEG_QUALITY,
            });
        }
        Ok(())
    }
}

/// A configuration the driver must not be given.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidConfig {
    #[error("frame buffers placed in external RAM, but none was detected")]
    ExternalRamUnavailable,
    #[error("frame buffer count {count} out of range (1..={max})")]
    FbCount { count: u8, max: u8 },
    #[error("{count} frame buffers require external RAM")]
    MultipleBuffersInInternalRam { count: u8 },
    #[error("JPEG quality {quality} out of range (max {max})")]
    JpegQuality { quality: u8, max: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMATS: [PixelFormat; 4] = [
        PixelFormat::Jpeg,
        PixelFormat::Rgb565,
        PixelFormat::Yuv422,
        PixelFormat::Grayscale,
    ];
    const CAPABILITIES: [MemoryCapability; 2] =
        [MemoryCapability::PRESENT, MemoryCapability::ABSENT];
    const BOARDS: [Board; 2] = [Board::XiaoEsp32S3, Board::AiThinker];

    fn all_selections() -> impl Iterator<Item = (PixelFormat, MemoryCapability, Board)> {
        FORMATS.into_iter().flat_map(|f| {
            CAPABILITIES
                .into_iter()
                .flat_map(move |c| BOARDS.into_iter().map(move |b| (f, c, b)))
        })
    }

    #[test]
    fn test_jpeg_with_external_ram() {
        let c =
            CaptureConfig::select(PixelFormat::Jpeg, MemoryCapability::PRESENT, Board::XiaoEsp32S3);
        assert_eq!(c.fb_location, FbLocation::ExternalRam);
        assert_eq!(c.frame_size, FrameSize::LARGEST);
        assert_eq!(c.fb_count, 2);
        assert_eq!(c.grab_mode, GrabMode::Latest);
        assert_eq!(c.jpeg_quality, HIGH_FIDELITY_JPEG_QUALITY);
    }

    #[test]
    fn test_jpeg_without_external_ram() {
        let c =
            CaptureConfig::select(PixelFormat::Jpeg, MemoryCapability::ABSENT, Board::XiaoEsp32S3);
        assert_eq!(c.fb_location, FbLocation::InternalRam);
        assert_eq!(c.frame_size, FrameSize::Svga);
        assert_eq!(c.fb_count, 1);
        assert_eq!(c.grab_mode, GrabMode::WhenEmpty);
        assert_eq!(c.jpeg_quality, DEFAULT_JPEG_QUALITY);
    }

    #[test]
    fn test_raw_forces_square_tier() {
        for (format, capability, board) in all_selections().filter(|(f, _, _)| !f.is_jpeg()) {
            let c = CaptureConfig::select(format, capability, board);
            assert_eq!(c.frame_size, FrameSize::R240x240);
        }
    }

    #[test]
    fn test_raw_double_buffer_only_on_s3_with_external_ram() {
        let s3 = CaptureConfig::select(
            PixelFormat::Rgb565,
            MemoryCapability::PRESENT,
            Board::XiaoEsp32S3,
        );
        assert_eq!(s3.fb_count, 2);

        let esp32 =
            CaptureConfig::select(PixelFormat::Rgb565, MemoryCapability::PRESENT, Board::AiThinker);
        assert_eq!(esp32.fb_count, 1);

        let s3_no_psram = CaptureConfig::select(
            PixelFormat::Rgb565,
            MemoryCapability::ABSENT,
            Board::XiaoEsp32S3,
        );
        assert_eq!(s3_no_psram.fb_count, 1);
        assert_eq!(s3_no_psram.fb_location, FbLocation::InternalRam);
    }

    #[test]
    fn test_selection_is_deterministic() {
        for (format, capability, board) in all_selections() {
            assert_eq!(
                CaptureConfig::select(format, capability, board),
                CaptureConfig::select(format, capability, board)
            );
        }
    }

    #[test]
    fn test_external_ram_implies_capability() {
        for (format, capability, board) in all_selections() {
            let c = CaptureConfig::select(format, capability, board);
            if c.fb_location == FbLocation::ExternalRam {
                assert!(capability.has_external_ram(), "{:?}", (format, board));
            }
        }
    }

    #[test]
    fn test_multiple_buffers_imply_external_ram() {
        for (format, capability, board) in all_selections() {
            let c = CaptureConfig::select(format, capability, board);
            if c.fb_count > 1 {
                assert_eq!(c.fb_location, FbLocation::ExternalRam);
            }
        }
    }

    #[test]
    fn test_every_selection_validates() {
        for (format, capability, board) in all_selections() {
            let c = CaptureConfig::select(format, capability, board);
            assert_eq!(c.validate(capability), Ok(()));
        }
    }

    #[test]
    fn test_validate_rejects_external_ram_without_capability() {
        let c =
            CaptureConfig::select(PixelFormat::Jpeg, MemoryCapability::PRESENT, Board::XiaoEsp32S3);
        assert_eq!(
            c.validate(MemoryCapability::ABSENT),
            Err(InvalidConfig::ExternalRamUnavailable)
        );
    }

    #[test]
    fn test_validate_rejects_double_buffer_in_internal_ram() {
        let mut c =
            CaptureConfig::select(PixelFormat::Jpeg, MemoryCapability::ABSENT, Board::XiaoEsp32S3);
        c.fb_count = 2;
        assert_eq!(
            c.validate(MemoryCapability::ABSENT),
            Err(InvalidConfig::MultipleBuffersInInternalRam { count: 2 })
        );
    }

    #[test]
    fn test_validate_rejects_buffer_count_out_of_range() {
        let mut c =
            CaptureConfig::select(PixelFormat::Jpeg, MemoryCapability::PRESENT, Board::XiaoEsp32S3);
        c.fb_count = 0;
        assert!(matches!(
            c.validate(MemoryCapability::PRESENT),
            Err(InvalidConfig::FbCount { count: 0, .. })
        ));
        c.fb_count = 3;
        assert!(matches!(
            c.validate(MemoryCapability::PRESENT),
            Err(InvalidConfig::FbCount { count: 3, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_quality() {
        let mut c =
            CaptureConfig::select(PixelFormat::Jpeg, MemoryCapability::PRESENT, Board::XiaoEsp32S3);
        c.jpeg_quality = 64;
        assert!(matches!(
            c.validate(MemoryCapability::PRESENT),
            Err(InvalidConfig::JpegQuality { quality: 64, .. })
        ));
    }

    #[test]
    fn test_board_pins_carried() {
        let c =
            CaptureConfig::select(PixelFormat::Jpeg, MemoryCapability::PRESENT, Board::AiThinker);
        assert_eq!(c.pins, Board::AiThinker.pins());
        assert_eq!(c.xclk_freq_hz, XCLK_FREQ_HZ);
    }
}

#[cfg(feature = "tap-tests")]
mod tap_tests {
    use super::*;
    use esp32_cam_node_macros::tap_test;

    #[tap_test]
    fn selected_configs_validate() {
        for format in [PixelFormat::Jpeg, PixelFormat::Rgb565, PixelFormat::Grayscale] {
            for capability in [MemoryCapability::PRESENT, MemoryCapability::ABSENT] {
                let config = CaptureConfig::select(format, capability, Board::default());
                assert_eq!(config.validate(capability), Ok(()));
            }
        }
    }

    #[tap_test]
    fn psram_config_rejected_without_psram() -> Result<(), InvalidConfig> {
        let config =
            CaptureConfig::select(PixelFormat::Jpeg, MemoryCapability::PRESENT, Board::default());
        match config.validate(MemoryCapability::ABSENT) {
            Err(InvalidConfig::ExternalRamUnavailable) => Ok(()),
            other => panic!("unexpected {:?}", other),
        }
    }
}
