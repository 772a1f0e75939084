//! Sensor identification and per-model calibration.

use serde::Serialize;
use std::fmt;

/// Sensor product id as read back from the initialized device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SensorId(pub u16);

impl SensorId {
    /// Sentinel for "nothing read back".
    pub const UNKNOWN: SensorId = SensorId(0);

    pub const OV2640: SensorId = SensorId(0x26);
    pub const OV3660: SensorId = SensorId(0x3660);
    pub const OV5640: SensorId = SensorId(0x5640);
    pub const OV7670: SensorId = SensorId(0x76);
    pub const OV7725: SensorId = SensorId(0x77);
    pub const NT99141: SensorId = SensorId(0x1410);
    pub const GC2145: SensorId = SensorId(0x2145);
    pub const GC032A: SensorId = SensorId(0x232a);
    pub const GC0308: SensorId = SensorId(0x9b);
    pub const BF3005: SensorId = SensorId(0x30);
    pub const BF20A6: SensorId = SensorId(0x20a6);
    pub const SC101IOT: SensorId = SensorId(0xda4a);
    pub const SC030IOT: SensorId = SensorId(0x9a46);
    pub const SC031GS: SensorId = SensorId(0x0031);

    const MODELS: [(SensorId, &'static str); 14] = [
        (Self::OV2640, "OV2640"),
        (Self::OV3660, "OV3660"),
        (Self::OV5640, "OV5640"),
        (Self::OV7670, "OV7670"),
        (Self::OV7725, "OV7725"),
        (Self::NT99141, "NT99141"),
        (Self::GC2145, "GC2145"),
        (Self::GC032A, "GC032A"),
        (Self::GC0308, "GC0308"),
        (Self::BF3005, "BF3005"),
        (Self::BF20A6, "BF20A6"),
        (Self::SC101IOT, "SC101IOT"),
        (Self::SC030IOT, "SC030IOT"),
        (Self::SC031GS, "SC031GS"),
    ];

    /// Model name, if the id is a known sensor.
    pub fn model(self) -> Option<&'static str> {
        Self::MODELS
            .iter()
            .find(|(id, _)| *id == self)
            .map(|(_, name)| *name)
    }

    /// Factory-default correction for this sensor, if it needs one.
    ///
    /// Only the OV3660 ships vertically flipped and oversaturated. Every
    /// other id, including [`SensorId::UNKNOWN`], gets `None` so that no
    /// register is touched on hardware we do not know.
    pub fn calibration(self) -> Option<Calibration> {
        if self == Self::OV3660 {
            Some(Calibration::OV3660)
        } else {
            None
        }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.model() {
            Some(name) => write!(f, "{} (PID 0x{:04x})", name, self.0),
            None => write!(f, "unknown (PID 0x{:04x})", self.0),
        }
    }
}

/// Post-init register adjustments, applied once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Calibration {
    /// Flip the vertical axis.
    pub vflip: bool,
    /// Brightness delta in sensor steps (-2..=2).
    pub brightness: i8,
    /// Saturation delta in sensor steps (-2..=2).
    pub saturation: i8,
}

impl Calibration {
    /// Flip back, brighten a step, desaturate two steps.
    pub const OV3660: Calibration = Calibration {
        vflip: true,
        brightness: 1,
        saturation: -2,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_ov3660_is_calibrated() {
        assert_eq!(SensorId::OV3660.calibration(), Some(Calibration::OV3660));
        for (id, _) in SensorId::MODELS.iter().filter(|(id, _)| *id != SensorId::OV3660) {
            assert_eq!(id.calibration(), None, "{} must not be calibrated", id);
        }
        assert_eq!(SensorId::UNKNOWN.calibration(), None);
        assert_eq!(SensorId(0xffff).calibration(), None);
    }

    #[test]
    fn test_ov3660_calibration_values() {
        let c = Calibration::OV3660;
        assert!(c.vflip);
        assert_eq!(c.brightness, 1);
        assert_eq!(c.saturation, -2);
    }

    #[test]
    fn test_model_lookup() {
        assert_eq!(SensorId::OV2640.model(), Some("OV2640"));
        assert_eq!(SensorId(0x3660).model(), Some("OV3660"));
        assert_eq!(SensorId::UNKNOWN.model(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(SensorId::OV3660.to_string(), "OV3660 (PID 0x3660)");
        assert_eq!(SensorId::UNKNOWN.to_string(), "unknown (PID 0x0000)");
    }
}

#[cfg(feature = "tap-tests")]
mod tap_tests {
    use super::*;
    use esp32_cam_node_macros::tap_test;

    #[tap_test]
    fn only_ov3660_is_calibrated() {
        assert_eq!(SensorId::OV3660.calibration(), Some(Calibration::OV3660));
        assert_eq!(SensorId::OV2640.calibration(), None);
        assert_eq!(SensorId::UNKNOWN.calibration(), None);
    }
}
