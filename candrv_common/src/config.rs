//! Configuration loading and the controller descriptor table.
//!
//! Static driver configuration: one descriptor per controller slot, each
//! with its baudrate table, plus the driver-wide ICOM table and the number
//! of polling groups. Loaded from TOML, validated before the driver will
//! accept it, and immutable afterwards.
//!
//! # TOML Example
//!
//! ```toml
//! poll_groups = 2
//!
//! [[controllers]]
//! hw_offset = 0x40
//! default_baudrate_index = 0
//! busoff_polling = true
//! wakeup_polling = true
//! wakeup_source = 1
//! poll_group = 0
//! baudrates = [
//!     { bitrate_kbps = 500, config_id = 1 },
//!     { bitrate_kbps = 250, config_id = 2 },
//! ]
//! ```

use crate::frame::ControllerId;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;

/// Sentinel hardware offset marking an unconfigured controller slot.
pub const NO_HW_OFFSET: u16 = 0xFFFF;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

// ─── Table Entries ──────────────────────────────────────────────────

/// One baudrate option: (bit-rate, identifier), looked up by either
/// value during baudrate-change requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaudrateEntry {
    /// Nominal bit-rate in kbit/s.
    pub bitrate_kbps: u32,
    /// Configuration identifier used by identifier-based selection.
    pub config_id: u16,
}

/// One Pretended-Networking configuration: identifier plus the opaque
/// payload the hardware layer programs into the controller.
///
/// Configuration id 0 is the reserved deactivation sentinel and may not
/// appear in the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcomEntry {
    /// Nonzero configuration identifier.
    pub config_id: u16,
    /// Opaque hardware-programming payload.
    #[serde(default)]
    pub payload: Vec<u8>,
}

// ─── Controller Descriptor ──────────────────────────────────────────

/// Immutable per-controller hardware description.
///
/// A slot whose `hw_offset` equals [`NO_HW_OFFSET`] is unconfigured: it is
/// skipped during init and every request naming it fails as an invalid
/// controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerDescriptor {
    /// Hardware register-bank offset; [`NO_HW_OFFSET`] marks an empty slot.
    #[serde(default = "default_hw_offset")]
    pub hw_offset: u16,

    /// Baudrate options for this controller.
    #[serde(default)]
    pub baudrates: Vec<BaudrateEntry>,

    /// Index into `baudrates` applied at init.
    #[serde(default)]
    pub default_baudrate_index: usize,

    /// Pretended-Networking capability.
    #[serde(default)]
    pub pn_support: bool,

    /// Wakeup source id reported to the power-management collaborator.
    #[serde(default)]
    pub wakeup_source: u8,

    /// Bus-off detection by polling (otherwise interrupt-driven in hardware).
    #[serde(default)]
    pub busoff_polling: bool,

    /// Wakeup detection by polling.
    #[serde(default)]
    pub wakeup_polling: bool,

    /// Polling group this controller is swept by.
    #[serde(default)]
    pub poll_group: u8,
}

fn default_hw_offset() -> u16 {
    NO_HW_OFFSET
}

impl ControllerDescriptor {
    /// Returns true if this slot is populated.
    #[inline]
    pub const fn is_configured(&self) -> bool {
        self.hw_offset != NO_HW_OFFSET
    }

    /// The baudrate entry applied at init.
    #[inline]
    pub fn default_baudrate(&self) -> Option<&BaudrateEntry> {
        self.baudrates.get(self.default_baudrate_index)
    }
}

impl Default for ControllerDescriptor {
    fn default() -> Self {
        Self {
            hw_offset: NO_HW_OFFSET,
            baudrates: Vec::new(),
            default_baudrate_index: 0,
            pn_support: false,
            wakeup_source: 0,
            busoff_polling: false,
            wakeup_polling: false,
            poll_group: 0,
        }
    }
}

// ─── Driver Configuration ───────────────────────────────────────────

/// Complete static driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanConfig {
    /// Number of independent polling groups the scheduler drives.
    #[serde(default = "default_poll_groups")]
    pub poll_groups: u8,

    /// Controller descriptor table, indexed by controller id.
    pub controllers: Vec<ControllerDescriptor>,

    /// Driver-wide ICOM (Pretended Networking) configuration table.
    #[serde(default)]
    pub icom: Vec<IcomEntry>,
}

fn default_poll_groups() -> u8 {
    1
}

impl CanConfig {
    /// Number of controller slots (configured or not).
    #[inline]
    pub fn controllers_configured(&self) -> ControllerId {
        self.controllers.len() as ControllerId
    }

    /// Descriptor lookup; `None` for out-of-range ids.
    #[inline]
    pub fn controller(&self, id: ControllerId) -> Option<&ControllerDescriptor> {
        self.controllers.get(id as usize)
    }

    /// Ids of all populated slots.
    pub fn configured_ids(&self) -> impl Iterator<Item = ControllerId> + '_ {
        self.controllers
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_configured())
            .map(|(i, _)| i as ControllerId)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - the controller table is empty, or no slot is configured
    /// - a configured slot has an empty baudrate table
    /// - a `default_baudrate_index` is out of range
    /// - a `poll_group` is >= `poll_groups`, or `poll_groups` is 0
    /// - the ICOM table contains id 0 or duplicate ids
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_groups == 0 {
            return Err(ConfigError::ValidationError(
                "poll_groups must be at least 1".to_string(),
            ));
        }
        if self.controllers.is_empty() {
            return Err(ConfigError::ValidationError(
                "controller table is empty".to_string(),
            ));
        }
        if self.configured_ids().next().is_none() {
            return Err(ConfigError::ValidationError(
                "no controller slot is configured".to_string(),
            ));
        }

        for (i, desc) in self.controllers.iter().enumerate() {
            if !desc.is_configured() {
                continue;
            }
            if desc.baudrates.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "controller {i}: baudrate table is empty"
                )));
            }
            if desc.default_baudrate_index >= desc.baudrates.len() {
                return Err(ConfigError::ValidationError(format!(
                    "controller {i}: default_baudrate_index {} out of range (table has {} entries)",
                    desc.default_baudrate_index,
                    desc.baudrates.len()
                )));
            }
            if desc.poll_group >= self.poll_groups {
                return Err(ConfigError::ValidationError(format!(
                    "controller {i}: poll_group {} >= poll_groups {}",
                    desc.poll_group, self.poll_groups
                )));
            }
        }

        for (i, entry) in self.icom.iter().enumerate() {
            if entry.config_id == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "ICOM entry {i}: configuration id 0 is reserved for deactivation"
                )));
            }
            if self.icom[..i].iter().any(|e| e.config_id == entry.config_id) {
                return Err(ConfigError::ValidationError(format!(
                    "ICOM entry {i}: duplicate configuration id {}",
                    entry.config_id
                )));
            }
        }

        Ok(())
    }
}

impl ConfigLoader for CanConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        CanConfig::validate(self)
    }
}

// ─── Loading ────────────────────────────────────────────────────────

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
/// - Returns `ConfigError::ValidationError` if semantic validation fails
pub trait ConfigLoader: DeserializeOwned + Sized {
    /// Semantic validation hook; the default accepts everything.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Load and validate a configuration file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound);
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        let config: Self =
            toml::from_str(&text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
