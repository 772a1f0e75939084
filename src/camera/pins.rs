//! Per-board camera pin tables.
//!
//! Pin numbers are GPIO numbers; `-1` means the line is not wired (the
//! driver's convention for PWDN/RESET).

use super::types::HardwareTarget;

/// Camera interface pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraPins {
    /// D0..D7 (Y2..Y9).
    pub data: [i32; 8],
    /// Master clock output.
    pub xclk: i32,
    /// Pixel clock input.
    pub pclk: i32,
    pub vsync: i32,
    pub href: i32,
    /// SCCB (I2C) data.
    pub sccb_sda: i32,
    /// SCCB (I2C) clock.
    pub sccb_scl: i32,
    pub pwdn: i32,
    pub reset: i32,
}

/// Supported camera boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    /// Seeed XIAO ESP32S3 Sense (OV2640/OV3660, 8 MB PSRAM).
    XiaoEsp32S3,
    /// AI-Thinker ESP32-CAM (OV2640, 4 MB PSRAM).
    AiThinker,
}

impl Board {
    /// Pin assignment for this board.
    pub fn pins(self) -> CameraPins {
        match self {
            Self::XiaoEsp32S3 => CameraPins {
                data: [15, 17, 18, 16, 14, 12, 11, 48],
                xclk: 10,
                pclk: 13,
                vsync: 38,
                href: 47,
                sccb_sda: 40,
                sccb_scl: 39,
                pwdn: -1,
                reset: -1,
            },
            Self::AiThinker => CameraPins {
                data: [5, 18, 19, 21, 36, 39, 34, 35],
                xclk: 0,
                pclk: 22,
                vsync: 25,
                href: 23,
                sccb_sda: 26,
                sccb_scl: 27,
                pwdn: 32,
                reset: -1,
            },
        }
    }

    /// Chip family the board carries.
    pub fn target(self) -> HardwareTarget {
        match self {
            Self::XiaoEsp32S3 => HardwareTarget::Esp32S3,
            Self::AiThinker => HardwareTarget::Esp32,
        }
    }

    /// Human-readable board name.
    pub fn name(self) -> &'static str {
        match self {
            Self::XiaoEsp32S3 => "XIAO ESP32S3 Sense",
            Self::AiThinker => "AI-Thinker ESP32-CAM",
        }
    }
}

#[cfg(all(feature = "board-xiao-esp32s3", feature = "board-ai-thinker"))]
compile_error!("enable one board feature; use --no-default-features with board-ai-thinker");

impl Default for Board {
    fn default() -> Self {
        #[cfg(feature = "board-ai-thinker")]
        return Self::AiThinker;
        #[cfg(feature = "board-xiao-esp32s3")]
        return Self::XiaoEsp32S3;
        #[cfg(not(any(feature = "board-xiao-esp32s3", feature = "board-ai-thinker")))]
        Self::XiaoEsp32S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_board_follows_features() {
        let expected = if cfg!(feature = "board-ai-thinker") {
            Board::AiThinker
        } else {
            Board::XiaoEsp32S3
        };
        assert_eq!(Board::default(), expected);
    }

    #[test]
    fn test_board_targets() {
        assert_eq!(Board::XiaoEsp32S3.target(), HardwareTarget::Esp32S3);
        assert_eq!(Board::AiThinker.target(), HardwareTarget::Esp32);
    }

    #[test]
    fn test_pins_are_distinct() {
        for board in [Board::XiaoEsp32S3, Board::AiThinker] {
            let p = board.pins();
            let mut wired: Vec<i32> = p.data.to_vec();
            wired.extend([p.xclk, p.pclk, p.vsync, p.href, p.sccb_sda, p.sccb_scl]);
            wired.extend([p.pwdn, p.reset].into_iter().filter(|&n| n >= 0));
            let count = wired.len();
            wired.sort_unstable();
            wired.dedup();
            assert_eq!(wired.len(), count, "{} reuses a pin", board.name());
        }
    }

    #[test]
    fn test_xiao_unwired_control_lines() {
        let p = Board::XiaoEsp32S3.pins();
        assert_eq!(p.pwdn, -1);
        assert_eq!(p.reset, -1);
    }
}
