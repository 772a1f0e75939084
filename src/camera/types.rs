//! Capture format, frame-size tiers and buffer policies.
//!
//! These are the platform-independent vocabulary of the camera module. The
//! ESP backend maps them onto the esp32-camera driver constants.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Pixel format delivered by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Compressed JPEG, used for streaming.
    Jpeg,
    /// Raw RGB565, used for on-device recognition.
    Rgb565,
    /// Raw YUV 4:2:2.
    Yuv422,
    /// Raw 8-bit grayscale.
    Grayscale,
}

impl PixelFormat {
    /// Whether the sensor compresses frames itself.
    pub fn is_jpeg(self) -> bool {
        matches!(self, Self::Jpeg)
    }

    /// HTTP content type for a captured frame in this format.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            _ => "application/octet-stream",
        }
    }

    /// Short lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Rgb565 => "rgb565",
            Self::Yuv422 => "yuv422",
            Self::Grayscale => "grayscale",
        }
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "rgb565" | "raw565" => Ok(Self::Rgb565),
            "yuv422" => Ok(Self::Yuv422),
            "grayscale" | "gray" => Ok(Self::Grayscale),
            other => Err(format!("unknown pixel format: {}", other)),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensor frame-size tier.
///
/// Ordering follows pixel area, so `a <= b` means "a needs no larger buffer
/// than b".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameSize {
    /// 160x120
    Qqvga,
    /// 240x240, the square tier used for raw capture.
    #[serde(rename = "240X240")]
    R240x240,
    /// 320x240
    Qvga,
    /// 400x296
    Cif,
    /// 480x320
    Hvga,
    /// 640x480
    Vga,
    /// 800x600
    Svga,
    /// 1024x768
    Xga,
    /// 1280x720
    Hd,
    /// 1280x1024
    Sxga,
    /// 1600x1200
    Uxga,
}

impl FrameSize {
    /// All tiers, smallest first.
    pub const ALL: [FrameSize; 11] = [
        Self::Qqvga,
        Self::R240x240,
        Self::Qvga,
        Self::Cif,
        Self::Hvga,
        Self::Vga,
        Self::Svga,
        Self::Xga,
        Self::Hd,
        Self::Sxga,
        Self::Uxga,
    ];

    /// Largest tier the supported sensors deliver.
    pub const LARGEST: FrameSize = Self::Uxga;

    /// Tier that fits the internal RAM budget for a single JPEG buffer.
    pub const INTERNAL_RAM_TIER: FrameSize = Self::Svga;

    /// Bounded square input for raw-format consumers.
    pub const RAW_TIER: FrameSize = Self::R240x240;

    /// Tier a JPEG stream starts at after initialization.
    pub const STREAM_START_TIER: FrameSize = Self::Qvga;

    /// Width and height in pixels.
    pub fn dimensions(self) -> (u16, u16) {
        match self {
            Self::Qqvga => (160, 120),
            Self::R240x240 => (240, 240),
            Self::Qvga => (320, 240),
            Self::Cif => (400, 296),
            Self::Hvga => (480, 320),
            Self::Vga => (640, 480),
            Self::Svga => (800, 600),
            Self::Xga => (1024, 768),
            Self::Hd => (1280, 720),
            Self::Sxga => (1280, 1024),
            Self::Uxga => (1600, 1200),
        }
    }

    /// Pixel count.
    pub fn area(self) -> u32 {
        let (w, h) = self.dimensions();
        w as u32 * h as u32
    }

    /// Position in [`FrameSize::ALL`], used as the control-plane value.
    pub fn index(self) -> usize {
        // ALL is sorted and contains every variant
        Self::ALL.iter().position(|&t| t == self).unwrap_or(0)
    }

    /// Tier at the given control-plane index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl PartialOrd for FrameSize {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrameSize {
    fn cmp(&self, other: &Self) -> Ordering {
        self.area().cmp(&other.area())
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        write!(f, "{}x{}", w, h)
    }
}

/// Where frame buffers are allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FbLocation {
    /// External PSRAM.
    ExternalRam,
    /// Internal DRAM.
    InternalRam,
}

/// Buffer reuse strategy when all frame buffers are full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrabMode {
    /// Wait for a free buffer; never drops a frame.
    WhenEmpty,
    /// Always hand out the most recent frame, dropping older ones.
    Latest,
}

/// Runtime fact: is external memory (PSRAM) present?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCapability {
    external_ram: bool,
}

impl MemoryCapability {
    /// External RAM detected.
    pub const PRESENT: MemoryCapability = MemoryCapability { external_ram: true };
    /// No external RAM.
    pub const ABSENT: MemoryCapability = MemoryCapability {
        external_ram: false,
    };

    /// Build from the detected boolean.
    pub fn new(external_ram: bool) -> Self {
        Self { external_ram }
    }

    /// Whether external RAM may hold frame buffers.
    pub fn has_external_ram(self) -> bool {
        self.external_ram
    }
}

/// Chip family the firmware is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareTarget {
    /// Original ESP32.
    Esp32,
    /// ESP32-S3, which has enough DMA bandwidth for double-buffered raw capture.
    Esp32S3,
}

impl HardwareTarget {
    /// Chip the firmware is compiled for. `None` off-device.
    pub const fn built_for() -> Option<Self> {
        if cfg!(all(feature = "esp32", esp32s3)) {
            Some(Self::Esp32S3)
        } else if cfg!(all(feature = "esp32", esp32)) {
            Some(Self::Esp32)
        } else {
            None
        }
    }

    /// Whether raw capture may use two frame buffers on this chip.
    pub fn supports_double_raw_buffer(self) -> bool {
        matches!(self, Self::Esp32S3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_sorted_by_area() {
        for pair in FrameSize::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{} should be < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_policy_tiers() {
        assert_eq!(FrameSize::LARGEST, *FrameSize::ALL.last().unwrap());
        assert!(FrameSize::STREAM_START_TIER < FrameSize::INTERNAL_RAM_TIER);
        assert!(FrameSize::INTERNAL_RAM_TIER < FrameSize::LARGEST);
        assert_eq!(FrameSize::RAW_TIER.dimensions(), (240, 240));
    }

    #[test]
    fn test_index_round_trip() {
        for tier in FrameSize::ALL {
            assert_eq!(FrameSize::from_index(tier.index()), Some(tier));
        }
        assert_eq!(FrameSize::from_index(FrameSize::ALL.len()), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(FrameSize::Uxga.to_string(), "1600x1200");
        assert_eq!(PixelFormat::Rgb565.to_string(), "rgb565");
    }

    #[test]
    fn test_pixel_format_parse() {
        assert_eq!("JPEG".parse::<PixelFormat>(), Ok(PixelFormat::Jpeg));
        assert_eq!(" raw565 ".parse::<PixelFormat>(), Ok(PixelFormat::Rgb565));
        assert!("bmp".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn test_only_jpeg_is_jpeg() {
        assert!(PixelFormat::Jpeg.is_jpeg());
        assert!(!PixelFormat::Rgb565.is_jpeg());
        assert!(!PixelFormat::Grayscale.is_jpeg());
    }

    #[test]
    fn test_double_raw_buffer_only_on_s3() {
        assert!(HardwareTarget::Esp32S3.supports_double_raw_buffer());
        assert!(!HardwareTarget::Esp32.supports_double_raw_buffer());
    }

    #[cfg(not(feature = "esp32"))]
    #[test]
    fn test_host_build_has_no_chip() {
        assert_eq!(HardwareTarget::built_for(), None);
    }
}
