//! Wi-Fi station credentials.
//!
//! Platform-independent and host-testable.
//!
//! # Example
//!
//! ```
//! use esp32_cam_node::config::{AuthThreshold, WifiConfig};
//!
//! let config = WifiConfig::new("MyNetwork", "MyPassword").unwrap();
//! assert_eq!(config.effective_auth(), AuthThreshold::Wpa2);
//!
//! let open = WifiConfig::open("Cafe").unwrap();
//! assert_eq!(open.effective_auth(), AuthThreshold::Open);
//! ```

use super::ConfigError;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum password length for WPA2.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Minimum password length for WPA2.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Weakest access point security the station accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthThreshold {
    Open,
    Wep,
    Wpa,
    /// WPA2-PSK. Default for any password of WPA2 length.
    #[default]
    Wpa2,
    Wpa3,
    Wpa2Wpa3,
}

impl AuthThreshold {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Wep => "wep",
            Self::Wpa => "wpa",
            Self::Wpa2 => "wpa2",
            Self::Wpa3 => "wpa3",
            Self::Wpa2Wpa3 => "wpa2wpa3",
        }
    }
}

impl std::str::FromStr for AuthThreshold {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" | "none" => Ok(Self::Open),
            "wep" => Ok(Self::Wep),
            "wpa" => Ok(Self::Wpa),
            "wpa2" | "" => Ok(Self::Wpa2),
            "wpa3" => Ok(Self::Wpa3),
            "wpa2wpa3" => Ok(Self::Wpa2Wpa3),
            _ => Err(ConfigError::UnknownAuth(s.to_string())),
        }
    }
}

impl fmt::Display for AuthThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WiFi credentials for connecting to an access point.
///
/// The password is wiped from memory when the value is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct WifiConfig {
    /// Network SSID (1-32 bytes).
    pub ssid: String,
    /// Network password (8-64 bytes for WPA2, empty for open networks).
    pub password: String,
    #[zeroize(skip)]
    pub auth: AuthThreshold,
}

impl WifiConfig {
    /// Create a WPA2 configuration.
    ///
    /// Returns an error if SSID or password are invalid.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_auth(ssid, password, AuthThreshold::default())
    }

    /// Create a configuration with an explicit auth threshold.
    pub fn with_auth(
        ssid: impl Into<String>,
        password: impl Into<String>,
        auth: AuthThreshold,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            ssid: ssid.into(),
            password: password.into(),
            auth,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration for an open network (no password).
    pub fn open(ssid: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_auth(ssid, String::new(), AuthThreshold::Open)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() {
            return Err(ConfigError::SsidEmpty);
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(ConfigError::SsidTooLong {
                len: self.ssid.len(),
                max: MAX_SSID_LEN,
            });
        }

        // Empty is OK for open networks
        if !self.password.is_empty() && self.password.len() < MIN_PASSWORD_LEN {
            return Err(ConfigError::PasswordTooShort {
                len: self.password.len(),
                min: MIN_PASSWORD_LEN,
            });
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(ConfigError::PasswordTooLong {
                len: self.password.len(),
                max: MAX_PASSWORD_LEN,
            });
        }
        if self.password.is_empty() && self.auth != AuthThreshold::Open {
            return Err(ConfigError::PasswordRequired(self.auth));
        }

        Ok(())
    }

    /// Check if this is an open network (no password).
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// Threshold handed to the driver.
    pub fn effective_auth(&self) -> AuthThreshold {
        if self.is_open() {
            AuthThreshold::Open
        } else {
            self.auth
        }
    }
}

impl fmt::Debug for WifiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiConfig")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .field("auth", &self.auth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = WifiConfig::new("TestNetwork", "password123").unwrap();
        assert_eq!(config.ssid, "TestNetwork");
        assert_eq!(config.password, "password123");
        assert_eq!(config.auth, AuthThreshold::Wpa2);
    }

    #[test]
    fn test_open_network() {
        let config = WifiConfig::open("OpenNetwork").unwrap();
        assert!(config.is_open());
        assert_eq!(config.effective_auth(), AuthThreshold::Open);
    }

    #[test]
    fn test_empty_ssid() {
        assert_eq!(
            WifiConfig::new("", "password123"),
            Err(ConfigError::SsidEmpty)
        );
    }

    #[test]
    fn test_ssid_length_bounds() {
        assert!(WifiConfig::new("a".repeat(32), "password123").is_ok());
        assert!(matches!(
            WifiConfig::new("a".repeat(33), "password123"),
            Err(ConfigError::SsidTooLong { len: 33, max: 32 })
        ));
    }

    #[test]
    fn test_password_length_bounds() {
        assert!(matches!(
            WifiConfig::new("TestNetwork", "short"),
            Err(ConfigError::PasswordTooShort { .. })
        ));
        assert!(WifiConfig::new("TestNetwork", "12345678").is_ok());
        assert!(WifiConfig::new("TestNetwork", "a".repeat(64)).is_ok());
        assert!(matches!(
            WifiConfig::new("TestNetwork", "a".repeat(65)),
            Err(ConfigError::PasswordTooLong { .. })
        ));
    }

    #[test]
    fn test_secured_threshold_needs_password() {
        assert_eq!(
            WifiConfig::with_auth("TestNetwork", "", AuthThreshold::Wpa3),
            Err(ConfigError::PasswordRequired(AuthThreshold::Wpa3))
        );
    }

    #[test]
    fn test_auth_parse() {
        assert_eq!("WPA2".parse::<AuthThreshold>(), Ok(AuthThreshold::Wpa2));
        assert_eq!("none".parse::<AuthThreshold>(), Ok(AuthThreshold::Open));
        assert_eq!("".parse::<AuthThreshold>(), Ok(AuthThreshold::Wpa2));
        assert!(matches!(
            "wpa4".parse::<AuthThreshold>(),
            Err(ConfigError::UnknownAuth(_))
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = WifiConfig::new("TestNetwork", "supersecret").unwrap();
        let text = format!("{:?}", config);
        assert!(text.contains("TestNetwork"));
        assert!(!text.contains("supersecret"));
    }
}
