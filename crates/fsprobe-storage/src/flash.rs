//! Flash partition map provider
//!
//! Resolves partition labels against a fixed partition map laid over a
//! flash image file, the way an embedded target resolves labels against
//! its flash map. The image file stands in for the flash device: it is
//! created on first use, sized to cover the whole map, and partitions
//! hand out windows into it.

use crate::region::{RegionFile, RegionId, RegionProvider, StorageRegion};
use fsprobe_common::config::PartitionSpec;
use fsprobe_common::{Error, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default mount point for flash-backed filesystems
pub const DEFAULT_FLASH_MOUNT_POINT: &str = "/lfs1";

/// Region provider backed by a flash image and its partition map
pub struct FlashMapProvider {
    image: PathBuf,
    device: String,
    partitions: Vec<PartitionSpec>,
}

impl FlashMapProvider {
    /// Build a provider over `image` with the given partition map
    ///
    /// Validates the map (no empty or overlapping partitions) and makes
    /// sure the image file exists and spans the whole map, growing or
    /// creating it when needed.
    pub fn new(image: impl AsRef<Path>, partitions: Vec<PartitionSpec>) -> Result<Self> {
        if partitions.is_empty() {
            return Err(Error::config("flash partition map is empty"));
        }
        let mut sorted: Vec<&PartitionSpec> = partitions.iter().collect();
        sorted.sort_by_key(|p| p.offset);
        for pair in sorted.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            if prev.offset + prev.size > next.offset {
                return Err(Error::config(format!(
                    "partitions {} and {} overlap",
                    prev.label, next.label
                )));
            }
        }
        for partition in &partitions {
            if partition.size == 0 {
                return Err(Error::config(format!(
                    "partition {} has zero size",
                    partition.label
                )));
            }
        }
        let span = sorted
            .last()
            .map(|p| p.offset + p.size)
            .unwrap_or_default();

        let image = image.as_ref().to_path_buf();
        let device = image.to_string_lossy().to_string();
        ensure_image(&image, span).map_err(|err| {
            Error::config(format!("cannot prepare flash image {device}: {err}"))
        })?;

        Ok(Self {
            image,
            device,
            partitions,
        })
    }
}

/// Create or grow the image file so it covers the partition map
fn ensure_image(image: &Path, span: u64) -> io::Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(image)?;
    let current = file.metadata()?.len();
    if current < span {
        file.set_len(span)?;
        file.sync_all()?;
        info!(
            image = %image.display(),
            bytes = span,
            "sized flash image to cover partition map"
        );
    }
    Ok(())
}

impl RegionProvider for FlashMapProvider {
    fn resolve(&self, id: &RegionId) -> Result<StorageRegion> {
        let RegionId::Partition(label) = id else {
            return Err(Error::region_not_found(id));
        };
        let partition = self
            .partitions
            .iter()
            .find(|p| &p.label == label)
            .ok_or_else(|| Error::region_not_found(id))?;
        Ok(StorageRegion::new(
            id.clone(),
            partition.offset,
            partition.size,
            self.device.clone(),
        ))
    }

    fn open(&self, region: &StorageRegion) -> io::Result<RegionFile> {
        let file = OpenOptions::new().read(true).write(true).open(&self.image)?;
        let len = file.metadata()?.len();
        if region.offset() + region.size() > len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "region {} extends past the {len}-byte image",
                    region.id()
                ),
            ));
        }
        Ok(RegionFile::new(file, region.offset(), region.size()))
    }

    fn default_mount_point(&self, _region: &StorageRegion) -> String {
        DEFAULT_FLASH_MOUNT_POINT.to_string()
    }
}
