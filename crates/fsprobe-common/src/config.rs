//! Configuration types for fsprobe
//!
//! A probe run is described entirely by this structure: which backing
//! strategy to use, whether to wipe the region first, how to mount, and
//! which files to round-trip. Values come from a TOML file with CLI
//! overrides applied on top.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration for a probe run
#[derive(Clone, Debug, Deserialize, Default)]
pub struct ProbeConfig {
    /// Backing storage selection
    #[serde(default)]
    pub storage: StorageSection,
    /// Mount point and mount flags
    #[serde(default)]
    pub mount: MountSection,
    /// Files to write and read back
    #[serde(default)]
    pub run: RunSection,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSection,
}

impl ProbeConfig {
    /// Validate cross-field constraints before a run starts
    pub fn validate(&self) -> Result<()> {
        if self.run.read_capacity == 0 {
            return Err(Error::config("run.read_capacity must be greater than zero"));
        }
        for file in &self.run.files {
            if file.name.is_empty() {
                return Err(Error::config("run.files entries need a non-empty name"));
            }
            if file.payload.len() > self.run.read_capacity {
                return Err(Error::config(format!(
                    "payload for {} is {} bytes but run.read_capacity is {}",
                    file.name,
                    file.payload.len(),
                    self.run.read_capacity
                )));
            }
        }
        if let Some(mount_point) = &self.mount.mount_point {
            if !mount_point.starts_with('/') {
                return Err(Error::config(format!(
                    "mount.mount_point {mount_point:?} must be absolute"
                )));
            }
        }
        match self.storage.backing {
            Backing::Flash => {
                if self.storage.partition.is_empty() {
                    return Err(Error::config("storage.partition must name a partition"));
                }
                if self.storage.partitions.is_empty() {
                    return Err(Error::config("storage.partitions must not be empty"));
                }
            }
            Backing::Disk => {
                if self.storage.volume.is_empty() {
                    return Err(Error::config("storage.volume must name a volume"));
                }
            }
        }
        Ok(())
    }
}

/// Which strategy locates the backing region
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backing {
    /// Partition inside a flash image, looked up by label
    #[default]
    Flash,
    /// Named volume from the disk registry
    Disk,
}

/// Backing storage configuration
#[derive(Clone, Debug, Deserialize)]
pub struct StorageSection {
    /// Backing strategy (flash partition or disk volume)
    #[serde(default)]
    pub backing: Backing,
    /// Erase the whole region before mounting (destructive)
    #[serde(default)]
    pub wipe: bool,
    /// Flash image backing file
    #[serde(default = "default_image")]
    pub image: PathBuf,
    /// Flash partition label to probe
    #[serde(default = "default_partition")]
    pub partition: String,
    /// Flash partition map over the image
    #[serde(default = "default_partitions")]
    pub partitions: Vec<PartitionSpec>,
    /// Disk volume name to probe
    #[serde(default)]
    pub volume: String,
    /// Disk volume registry: name to backing device path
    #[serde(default)]
    pub volumes: BTreeMap<String, PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backing: Backing::Flash,
            wipe: false,
            image: default_image(),
            partition: default_partition(),
            partitions: default_partitions(),
            volume: String::new(),
            volumes: BTreeMap::new(),
        }
    }
}

/// One fixed partition inside the flash image
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct PartitionSpec {
    /// Partition label (resolution key)
    pub label: String,
    /// Byte offset inside the image
    pub offset: u64,
    /// Partition size in bytes
    pub size: u64,
}

/// Mount configuration
#[derive(Clone, Debug, Deserialize, Default)]
pub struct MountSection {
    /// Mount point override; strategy default applies when unset
    #[serde(default)]
    pub mount_point: Option<String>,
    /// Volume is bound when the driver is prepared, not by mount()
    #[serde(default)]
    pub automount: bool,
    /// Do not format the region when the first bind fails
    #[serde(default)]
    pub no_format: bool,
}

/// Round-trip workload configuration
#[derive(Clone, Debug, Deserialize)]
pub struct RunSection {
    /// Files to write then read back, in order
    #[serde(default = "default_files")]
    pub files: Vec<FileSpec>,
    /// Read buffer capacity in bytes
    #[serde(default = "default_read_capacity")]
    pub read_capacity: usize,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            files: default_files(),
            read_capacity: default_read_capacity(),
        }
    }
}

/// One file to round-trip, named relative to the mount point
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct FileSpec {
    /// File name under the mount point
    pub name: String,
    /// Payload to write
    pub payload: String,
}

/// Logging configuration
#[derive(Clone, Debug, Deserialize)]
pub struct LoggingSection {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_image() -> PathBuf {
    PathBuf::from("flash.img")
}

fn default_partition() -> String {
    "storage".to_string()
}

fn default_partitions() -> Vec<PartitionSpec> {
    vec![PartitionSpec {
        label: "storage".to_string(),
        offset: 0x0010_0000,
        size: 0x0060_0000, // 6 MiB
    }]
}

fn default_files() -> Vec<FileSpec> {
    // Payloads carry their NUL terminator, so the classic 16-char greeting
    // writes 17 bytes.
    vec![
        FileSpec {
            name: "myfile.txt".to_string(),
            payload: "Hello, LittleFS!\0".to_string(),
        },
        FileSpec {
            name: "name.txt".to_string(),
            payload: "MY name is Farhan\0".to_string(),
        },
    ]
}

fn default_read_capacity() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}
