//! Volume and driver seams
//!
//! The mounted-filesystem collaborator stays opaque behind these traits:
//! a `FsDriver` turns a raw region window into a `Volume`, a `Volume`
//! binds/unbinds and opens files, and a `VolumeFile` is consumed by
//! exactly one read-or-write-then-close sequence. All methods speak
//! `io::Error`; callers wrap them into the step-specific error taxonomy.

use fsprobe_storage::RegionFile;
use std::io;

/// Longest path accepted by the file layer, matching the filesystem
/// name limit.
pub const MAX_PATH_LEN: usize = 255;

/// How a file is opened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing file for reading
    Read,
    /// Create or truncate, then write
    Write,
}

/// Mount behavior switches
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MountFlags {
    /// Volume is bound when the driver prepares it; mount() only records
    /// the state transition
    pub automount: bool,
    /// Mount goes through the disk access layer (set by disk-volume
    /// providers)
    pub use_disk_access: bool,
    /// Fail the bind instead of formatting when no filesystem is found
    pub no_format: bool,
}

/// Filesystem usage snapshot, statvfs-style
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VfsStats {
    /// Transfer block size
    pub block_size: u32,
    /// Allocation unit size
    pub frag_size: u32,
    /// Total allocation units on the volume
    pub blocks: u64,
    /// Free allocation units
    pub blocks_free: u64,
}

/// An open file on a mounted volume
///
/// Closing consumes the handle, so a file can never be used after close.
pub trait VolumeFile {
    /// Read up to `buf.len()` bytes from the current position
    ///
    /// Returns the number of bytes read; 0 means end of file.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write bytes at the current position, returning how many were
    /// accepted
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Flush and release the handle
    fn close(self) -> io::Result<()>;
}

/// A filesystem instance over one storage region
pub trait Volume {
    /// File handle type, borrowing the volume while open
    type File<'v>: VolumeFile
    where
        Self: 'v;

    /// Bind the filesystem to its region device
    fn bind(&mut self) -> io::Result<()>;

    /// Whether the filesystem is currently bound
    fn is_bound(&self) -> bool;

    /// Usage snapshot of the bound filesystem
    fn statvfs(&self) -> io::Result<VfsStats>;

    /// Open a file by volume-relative path
    fn open<'v>(&'v self, path: &str, mode: OpenMode) -> io::Result<Self::File<'v>>;

    /// Release the filesystem, flushing pending state
    fn unbind(&mut self) -> io::Result<()>;
}

/// Builds volumes over raw region devices
pub trait FsDriver {
    type Volume: Volume;

    /// Construct a volume over `device`; with `automount` set the volume
    /// comes back already bound
    fn prepare(&self, device: RegionFile, flags: &MountFlags) -> io::Result<Self::Volume>;
}
