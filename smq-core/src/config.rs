//! Transport configuration
//!
//! Plain structs with defaults that match deployed nodes. The firmware
//! fills them from its build-time `node.toml`; with the `serde` feature
//! they can also be loaded from any serde format.

use heapless::String;
use smq_hal::{PeerKey, UartConfig, DEFAULT_BAUD_RATE};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Longest host name that fits the 13-byte, NUL-terminated beacon field
pub const MAX_HOST_NAME_LEN: usize = 12;

/// Shortest accepted partition key
pub const MIN_KEY_LEN: usize = 8;

/// Longest accepted partition key
pub const MAX_KEY_LEN: usize = 32;

/// Default beacon period
pub const BEACON_INTERVAL_MS: u32 = 1_000;

/// Default random spread added to each beacon period
pub const BEACON_JITTER_MS: u32 = 250;

/// Silence after which a host is dropped from the directory
pub const HOST_LOST_TIMEOUT_MS: u32 = 10_000;

/// Default send-complete watchdog
pub const SEND_TIMEOUT_MS: u32 = 500;

/// Default length of the pairing window
pub const PAIRING_TIMEOUT_MS: u32 = 2 * 60 * 1_000;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Host name longer than [`MAX_HOST_NAME_LEN`] bytes
    HostNameTooLong,
    /// Partition key shorter than [`MIN_KEY_LEN`] bytes
    KeyTooShort,
    /// Partition key longer than [`MAX_KEY_LEN`] bytes
    KeyTooLong,
    /// Beacon interval is zero or not shorter than the host timeout
    InvalidInterval,
}

/// Serial link configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SerialConfig {
    /// Baud rate agreed with the host out of band
    pub baudrate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baudrate: DEFAULT_BAUD_RATE,
        }
    }
}

impl SerialConfig {
    pub fn uart_config(&self) -> UartConfig {
        UartConfig::with_baudrate(self.baudrate)
    }
}

/// Radio mesh configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeshConfig {
    /// Name advertised in beacons
    pub host_name: String<MAX_HOST_NAME_LEN>,
    /// Pre-shared key separating this mesh from others in range
    pub key: Option<String<MAX_KEY_LEN>>,
    /// Base period between beacons
    pub beacon_interval_ms: u32,
    /// Upper bound of the random delay added to each beacon period
    pub beacon_jitter_ms: u32,
    /// Hosts silent for longer than this are dropped
    pub host_lost_timeout_ms: u32,
    /// Give up waiting for a send-complete after this long.
    /// `None` waits forever.
    pub send_timeout_ms: Option<u32>,
    /// How long [`start_pairing`](crate::MeshTransport::start_pairing)
    /// keeps the window open
    pub pairing_timeout_ms: u32,
    /// Link key offered to hosts we pair with
    pub link_key: Option<PeerKey>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            host_name: String::new(),
            key: None,
            beacon_interval_ms: BEACON_INTERVAL_MS,
            beacon_jitter_ms: BEACON_JITTER_MS,
            host_lost_timeout_ms: HOST_LOST_TIMEOUT_MS,
            send_timeout_ms: Some(SEND_TIMEOUT_MS),
            pairing_timeout_ms: PAIRING_TIMEOUT_MS,
            link_key: None,
        }
    }
}

impl MeshConfig {
    /// Defaults with the given name and optional partition key
    pub fn new(host_name: &str, key: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config
            .host_name
            .push_str(host_name)
            .map_err(|_| ConfigError::HostNameTooLong)?;
        if let Some(key) = key {
            if key.len() < MIN_KEY_LEN {
                return Err(ConfigError::KeyTooShort);
            }
            let mut owned = String::new();
            owned.push_str(key).map_err(|_| ConfigError::KeyTooLong)?;
            config.key = Some(owned);
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the values a caller may have changed after construction
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(key) = &self.key {
            if key.len() < MIN_KEY_LEN {
                return Err(ConfigError::KeyTooShort);
            }
        }
        if self.beacon_interval_ms == 0
            || self.beacon_interval_ms >= self.host_lost_timeout_ms
        {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_ref().map(|k| k.as_str())
    }
}
