//! Storage region identity and windowed raw I/O
//!
//! A `StorageRegion` names the byte range a filesystem lives on. A
//! `RegionFile` is a `Read + Write + Seek` window over that range: every
//! access is clamped to the window so the filesystem driver on top can
//! never touch bytes outside its region.

use fsprobe_common::Result;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Identifier for a storage region, matching the backing strategy
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegionId {
    /// Flash partition label
    Partition(String),
    /// Disk volume name
    Volume(String),
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partition(label) => write!(f, "partition {label}"),
            Self::Volume(name) => write!(f, "volume {name}"),
        }
    }
}

/// A resolved storage region: identifier, byte range, and device name
///
/// Immutable once resolved; the run operates on a copy of this
/// descriptor from start to finish.
#[derive(Clone, Debug)]
pub struct StorageRegion {
    id: RegionId,
    offset: u64,
    size: u64,
    device: String,
}

impl StorageRegion {
    pub fn new(id: RegionId, offset: u64, size: u64, device: impl Into<String>) -> Self {
        Self {
            id,
            offset,
            size,
            device: device.into(),
        }
    }

    pub fn id(&self) -> &RegionId {
        &self.id
    }

    /// Byte offset of the region on its device
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Region size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Name of the device carrying the region
    pub fn device(&self) -> &str {
        &self.device
    }

    /// One-line description for the resolution report
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "Area {} at {:#x} on {} for {} bytes",
            self.id, self.offset, self.device, self.size
        )
    }
}

/// Strategy interface for locating and opening storage regions
///
/// Implementations are selected at runtime from configuration; the rest
/// of the system only sees this trait.
pub trait RegionProvider {
    /// Resolve an identifier to a concrete region descriptor
    fn resolve(&self, id: &RegionId) -> Result<StorageRegion>;

    /// Open the device window backing a resolved region
    fn open(&self, region: &StorageRegion) -> io::Result<RegionFile>;

    /// Mount point this strategy uses when no override is configured
    fn default_mount_point(&self, region: &StorageRegion) -> String;

    /// Whether mounts over this strategy go through the disk access layer
    fn uses_disk_access(&self) -> bool {
        false
    }
}

/// Windowed raw handle over one storage region
///
/// Reads and writes are clamped to the window; seeking past the end is
/// allowed (subsequent reads return 0, writes accept 0 bytes). Clones
/// share the backing file but keep independent positions.
#[derive(Debug)]
pub struct RegionFile {
    file: File,
    base: u64,
    len: u64,
    pos: u64,
}

impl RegionFile {
    pub fn new(file: File, base: u64, len: u64) -> Self {
        Self {
            file,
            base,
            len,
            pos: 0,
        }
    }

    /// Window size in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clone the handle with an independent position at the window start
    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            file: self.file.try_clone()?,
            base: self.base,
            len: self.len,
            pos: 0,
        })
    }

    /// Flush file contents and metadata to the backing device
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    fn remaining(&self) -> usize {
        usize::try_from(self.len.saturating_sub(self.pos)).unwrap_or(usize::MAX)
    }
}

impl Read for RegionFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = buf.len().min(self.remaining());
        if want == 0 {
            return Ok(0);
        }
        self.file.seek(SeekFrom::Start(self.base + self.pos))?;
        let count = self.file.read(&mut buf[..want])?;
        self.pos += count as u64;
        Ok(count)
    }
}

impl Write for RegionFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let want = buf.len().min(self.remaining());
        if want == 0 {
            // Window exhausted: callers using write_all see WriteZero.
            return Ok(0);
        }
        self.file.seek(SeekFrom::Start(self.base + self.pos))?;
        let count = self.file.write(&buf[..want])?;
        self.pos += count as u64;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for RegionFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::End(delta) => i128::from(self.len) + i128::from(delta),
            SeekFrom::Current(delta) => i128::from(self.pos) + i128::from(delta),
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of region",
            ));
        }
        self.pos = u64::try_from(target)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek offset overflow"))?;
        Ok(self.pos)
    }
}
