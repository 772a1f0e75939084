//! Firmware configuration.
//!
//! Values come from `cfg.toml` at build time (see `cfg.toml.example`) and are
//! validated once at startup by [`AppConfig::load`]. The camera board is a
//! cargo feature, see [`crate::camera::Board`].
//!
//! # Components
//!
//! - [`wifi`] - Wi-Fi credential validation (host-testable)

mod wifi;

pub use wifi::{AuthThreshold, WifiConfig, MAX_PASSWORD_LEN, MAX_SSID_LEN, MIN_PASSWORD_LEN};

use crate::camera::{Board, PixelFormat};

/// Default port of the frame server.
pub const DEFAULT_SERVER_PORT: u16 = 80;

/// Build-time settings, generated from the `[esp32-cam-node]` table of `cfg.toml`.
#[toml_cfg::toml_config]
pub struct Config {
    #[default("")]
    wifi_ssid: &'static str,

    #[default("")]
    wifi_password: &'static str,

    #[default("wpa2")]
    wifi_auth: &'static str,

    #[default("jpeg")]
    pixel_format: &'static str,

    #[default(80)]
    server_port: u16,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub wifi: WifiConfig,
    pub pixel_format: PixelFormat,
    pub board: Board,
    pub server_port: u16,
}

impl AppConfig {
    /// Validate the settings baked in from `cfg.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::parse(
            CONFIG.wifi_ssid,
            CONFIG.wifi_password,
            CONFIG.wifi_auth,
            CONFIG.pixel_format,
            CONFIG.server_port,
        )
    }

    /// Validate raw setting values.
    pub fn parse(
        ssid: &str,
        password: &str,
        auth: &str,
        pixel_format: &str,
        server_port: u16,
    ) -> Result<Self, ConfigError> {
        let wifi = WifiConfig::with_auth(ssid, password, auth.parse()?)?;
        let pixel_format = pixel_format
            .parse()
            .map_err(ConfigError::UnknownPixelFormat)?;
        let server_port = if server_port == 0 {
            DEFAULT_SERVER_PORT
        } else {
            server_port
        };

        Ok(Self {
            wifi,
            pixel_format,
            board: Board::default(),
            server_port,
        })
    }
}

/// Errors that can occur during configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("SSID cannot be empty (set wifi_ssid in cfg.toml)")]
    SsidEmpty,
    #[error("SSID too long: {len} bytes (max {max})")]
    SsidTooLong { len: usize, max: usize },
    #[error("password too short: {len} bytes (min {min})")]
    PasswordTooShort { len: usize, min: usize },
    #[error("password too long: {len} bytes (max {max})")]
    PasswordTooLong { len: usize, max: usize },
    #[error("auth threshold {0} needs a password")]
    PasswordRequired(AuthThreshold),
    #[error("unknown auth threshold: {0}")]
    UnknownAuth(String),
    #[error("{0}")]
    UnknownPixelFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let config = AppConfig::parse("Home", "password123", "wpa2", "jpeg", 8080).unwrap();
        assert_eq!(config.wifi.ssid, "Home");
        assert_eq!(config.pixel_format, PixelFormat::Jpeg);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.board, Board::default());
    }

    #[test]
    fn test_parse_raw_format() {
        let config = AppConfig::parse("Home", "password123", "wpa2", "rgb565", 80).unwrap();
        assert_eq!(config.pixel_format, PixelFormat::Rgb565);
    }

    #[test]
    fn test_zero_port_uses_default() {
        let config = AppConfig::parse("Home", "password123", "wpa2", "jpeg", 0).unwrap();
        assert_eq!(config.server_port, DEFAULT_SERVER_PORT);
    }

    #[test]
    fn test_parse_rejects_missing_ssid() {
        assert_eq!(
            AppConfig::parse("", "password123", "wpa2", "jpeg", 80).unwrap_err(),
            ConfigError::SsidEmpty
        );
    }

    #[test]
    fn test_parse_rejects_unknown_values() {
        assert!(matches!(
            AppConfig::parse("Home", "password123", "wpa9", "jpeg", 80),
            Err(ConfigError::UnknownAuth(_))
        ));
        assert!(matches!(
            AppConfig::parse("Home", "password123", "wpa2", "png", 80),
            Err(ConfigError::UnknownPixelFormat(_))
        ));
    }

    #[test]
    fn test_build_time_defaults_are_well_formed() {
        assert!(CONFIG.wifi_auth.parse::<AuthThreshold>().is_ok());
        assert!(CONFIG.pixel_format.parse::<PixelFormat>().is_ok());
    }
}
