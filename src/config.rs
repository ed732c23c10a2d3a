//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub link: LinkConfig,
    pub radio: RadioConfig,
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
}

/// Radio link configuration (modem serial port and protocol timing)
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Reply deadline applied uniformly to each protocol phase
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    /// Link maximum packet size, terminator included; chunks carry one byte
    /// less
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,

    /// Cap on the accumulated transfer size before decoding
    #[serde(default = "default_max_transfer_bytes")]
    pub max_transfer_bytes: usize,
}

/// Radio physical parameters, passed through to the modem at bring-up
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    #[serde(default = "default_frequency_mhz")]
    pub frequency_mhz: f32,

    #[serde(default = "default_bandwidth_hz")]
    pub bandwidth_hz: u32,

    #[serde(default = "default_spreading_factor")]
    pub spreading_factor: u8,

    #[serde(default = "default_coding_rate")]
    pub coding_rate: u8,

    #[serde(default = "default_tx_power_dbm")]
    pub tx_power_dbm: i8,
}

/// Image capture configuration (remote side)
#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    #[serde(default = "default_source_path")]
    pub source_path: String,
}

/// Persistent storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

// Default value functions
fn default_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_reply_timeout_ms() -> u64 { 3000 }
fn default_max_packet_size() -> usize { 251 }
fn default_max_transfer_bytes() -> usize { 1024 * 1024 }

fn default_frequency_mhz() -> f32 { 915.0 }
fn default_bandwidth_hz() -> u32 { 125_000 }
fn default_spreading_factor() -> u8 { 12 }
fn default_coding_rate() -> u8 { 5 }
fn default_tx_power_dbm() -> i8 { 7 }

fn default_source_path() -> String { "./capture.jpg".to_string() }
fn default_data_dir() -> String { "./data".to_string() }

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults, used when no configuration file is given
    pub fn default_values() -> Self {
        Self {
            link: LinkConfig {
                port: default_port(),
                baud_rate: default_baud_rate(),
                reply_timeout_ms: default_reply_timeout_ms(),
                max_packet_size: default_max_packet_size(),
                max_transfer_bytes: default_max_transfer_bytes(),
            },
            radio: RadioConfig {
                frequency_mhz: default_frequency_mhz(),
                bandwidth_hz: default_bandwidth_hz(),
                spreading_factor: default_spreading_factor(),
                coding_rate: default_coding_rate(),
                tx_power_dbm: default_tx_power_dbm(),
            },
            capture: CaptureConfig {
                source_path: default_source_path(),
            },
            storage: StorageConfig {
                data_dir: default_data_dir(),
            },
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.link.port.is_empty() {
            return Err(crate::error::HabLinkError::Config(
                toml::de::Error::custom("link port cannot be empty")
            ));
        }

        if self.link.reply_timeout_ms == 0 || self.link.reply_timeout_ms > 60000 {
            return Err(crate::error::HabLinkError::Config(
                toml::de::Error::custom("reply_timeout_ms must be between 1 and 60000")
            ));
        }

        // A packet must hold the longest reserved literal plus the terminator
        if self.link.max_packet_size < 16 || self.link.max_packet_size > 4096 {
            return Err(crate::error::HabLinkError::Config(
                toml::de::Error::custom("max_packet_size must be between 16 and 4096")
            ));
        }

        if self.link.max_transfer_bytes < self.link.max_packet_size {
            return Err(crate::error::HabLinkError::Config(
                toml::de::Error::custom("max_transfer_bytes must be at least max_packet_size")
            ));
        }

        if self.radio.frequency_mhz < 137.0 || self.radio.frequency_mhz > 1020.0 {
            return Err(crate::error::HabLinkError::Config(
                toml::de::Error::custom("frequency_mhz must be between 137 and 1020")
            ));
        }

        if !(6..=12).contains(&self.radio.spreading_factor) {
            return Err(crate::error::HabLinkError::Config(
                toml::de::Error::custom("spreading_factor must be between 6 and 12")
            ));
        }

        if !(5..=8).contains(&self.radio.coding_rate) {
            return Err(crate::error::HabLinkError::Config(
                toml::de::Error::custom("coding_rate must be between 5 and 8 (4/5 .. 4/8)")
            ));
        }

        if !(2..=20).contains(&self.radio.tx_power_dbm) {
            return Err(crate::error::HabLinkError::Config(
                toml::de::Error::custom("tx_power_dbm must be between 2 and 20")
            ));
        }

        if ![7_800, 10_400, 15_600, 20_800, 31_250, 41_700, 62_500, 125_000, 250_000, 500_000]
            .contains(&self.radio.bandwidth_hz)
        {
            return Err(crate::error::HabLinkError::Config(
                toml::de::Error::custom("bandwidth_hz must be a standard LoRa bandwidth")
            ));
        }

        if self.storage.data_dir.is_empty() {
            return Err(crate::error::HabLinkError::Config(
                toml::de::Error::custom("storage data_dir cannot be empty")
            ));
        }

        Ok(())
    }

    /// Reply deadline as a [`std::time::Duration`]
    pub fn reply_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.link.reply_timeout_ms)
    }

    /// Largest data chunk a frame may carry (room left for the terminator)
    pub fn max_chunk(&self) -> usize {
        self.link.max_packet_size - 1
    }
}
