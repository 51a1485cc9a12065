//! # Runtime Configuration
//!
//! Static devices, declarative nodes and probe tuning, loaded from a JSON
//! file with environment overrides.
//!
//! ## Environment Overrides
//!
//! - `VC_PROBE_MAX_PASSES`: maximum probe passes
//! - `VC_PROBE_RETRY_DELAY_MS`: delay before retrying a stalled pass

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use vc_01_virt_concat::{CompositeDeviceSpec, DeviceGeometry, MediumKind, COMPATIBLE};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path as given
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration is inconsistent.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Static devices present at startup.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    /// Declarative nodes, in declaration order.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    /// Probe tuning.
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// One static device.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Name other nodes refer to.
    pub name: String,
    /// Capacity in bytes.
    pub size: u64,
    /// Erase block size in bytes.
    #[serde(default = "default_erase_size")]
    pub erase_size: u32,
    /// Minimum write unit in bytes.
    #[serde(default = "default_write_size")]
    pub write_size: u32,
    /// Medium kind.
    #[serde(default = "default_kind")]
    pub kind: MediumKind,
}

fn default_erase_size() -> u32 {
    128 * 1024
}

fn default_write_size() -> u32 {
    2048
}

fn default_kind() -> MediumKind {
    MediumKind::Nand
}

impl DeviceConfig {
    /// Geometry this device reports.
    pub fn geometry(&self) -> DeviceGeometry {
        DeviceGeometry::new(self.size, self.erase_size, self.write_size, self.kind)
    }
}

/// One declarative node.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Instance name.
    pub name: String,
    /// Compatible string; only `mtd-concat` nodes are bound.
    #[serde(default = "default_compatible")]
    pub compatible: String,
    /// Component references in address order.
    #[serde(default)]
    pub devices: Vec<String>,
}

fn default_compatible() -> String {
    COMPATIBLE.to_string()
}

impl NodeConfig {
    /// Whether this runtime binds the node.
    pub fn is_bound(&self) -> bool {
        self.compatible == COMPATIBLE
    }

    /// Spec for the instance this node declares.
    pub fn to_spec(&self) -> CompositeDeviceSpec {
        CompositeDeviceSpec::from_refs(self.name.clone(), self.devices.iter().cloned())
    }
}

/// Probe tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Passes before giving up on still-deferred instances.
    pub max_passes: u32,
    /// Delay before retrying a pass that activated nothing.
    pub retry_delay_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_passes: 8,
            retry_delay_ms: 100,
        }
    }
}

impl ProbeConfig {
    /// Retry delay as a `Duration`.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl RuntimeConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate JSON text.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `VC_PROBE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `VC_PROBE_*` overrides from an arbitrary lookup.
    ///
    /// Values that would fail `validate` are ignored with a warning.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("VC_PROBE_MAX_PASSES") {
            match raw.parse::<u32>() {
                Ok(passes) if passes > 0 => self.probe.max_passes = passes,
                _ => warn!(value = %raw, "Ignoring invalid VC_PROBE_MAX_PASSES"),
            }
        }
        if let Some(raw) = lookup("VC_PROBE_RETRY_DELAY_MS") {
            match raw.parse() {
                Ok(delay) => self.probe.retry_delay_ms = delay,
                Err(_) => warn!(value = %raw, "Ignoring invalid VC_PROBE_RETRY_DELAY_MS"),
            }
        }
        self
    }

    /// Reject configs that can never probe cleanly.
    ///
    /// Empty device lists are left to the lifecycle controller, which reports
    /// them as configuration errors per instance.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(ConfigError::Invalid("device with empty name".to_string()));
            }
            if !names.insert(device.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "device {} declared twice",
                    device.name
                )));
            }
        }
        for node in self.nodes.iter().filter(|n| n.is_bound()) {
            if names.contains(node.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "node {} shadows a static device",
                    node.name
                )));
            }
        }
        if self.probe.max_passes == 0 {
            return Err(ConfigError::Invalid(
                "probe.max_passes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Specs of every node this runtime binds, in declaration order.
    pub fn bound_specs(&self) -> Vec<CompositeDeviceSpec> {
        self.nodes
            .iter()
            .filter(|node| {
                let bound = node.is_bound();
                if !bound {
                    debug!(
                        node = %node.name,
                        compatible = %node.compatible,
                        "Skipping node, not mtd-concat"
                    );
                }
                bound
            })
            .map(NodeConfig::to_spec)
            .collect()
    }
}
