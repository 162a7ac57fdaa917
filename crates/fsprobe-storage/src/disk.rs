//! Disk volume provider
//!
//! Resolves volume names against a registry of named block devices
//! (backed by device nodes or image files). Unlike the flash strategy,
//! a volume covers its whole device: the offset is always zero and the
//! size is discovered from the device itself. Mounts over this provider
//! go through the disk access layer and default to the `/<NAME>:` mount
//! point convention.

use crate::region::{RegionFile, RegionId, RegionProvider, StorageRegion};
use fsprobe_common::{Error, Result};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;

/// Region provider backed by a named volume registry
pub struct DiskVolumeProvider {
    volumes: BTreeMap<String, PathBuf>,
}

impl DiskVolumeProvider {
    pub fn new(volumes: BTreeMap<String, PathBuf>) -> Self {
        Self { volumes }
    }

    fn device_for(&self, name: &str) -> Option<&PathBuf> {
        self.volumes.get(name)
    }
}

impl RegionProvider for DiskVolumeProvider {
    fn resolve(&self, id: &RegionId) -> Result<StorageRegion> {
        let RegionId::Volume(name) = id else {
            return Err(Error::region_not_found(id));
        };
        let device = self
            .device_for(name)
            .ok_or_else(|| Error::region_not_found(id))?;
        // The device must already exist; an absent volume is a missing
        // card, not something to create.
        let size = std::fs::metadata(device)
            .map_err(|_| Error::region_not_found(id))?
            .len();
        Ok(StorageRegion::new(
            id.clone(),
            0,
            size,
            device.to_string_lossy(),
        ))
    }

    fn open(&self, region: &StorageRegion) -> io::Result<RegionFile> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(region.device())?;
        Ok(RegionFile::new(file, region.offset(), region.size()))
    }

    fn default_mount_point(&self, region: &StorageRegion) -> String {
        match region.id() {
            RegionId::Volume(name) => format!("/{name}:"),
            RegionId::Partition(label) => format!("/{label}:"),
        }
    }

    fn uses_disk_access(&self) -> bool {
        true
    }
}
