//! Error types for fsprobe
//!
//! Every lifecycle step has its own variant so a failed run can report
//! exactly which operation broke and with which errno-style code.

use std::io;
use thiserror::Error;

/// Common result type for fsprobe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for fsprobe
#[derive(Debug, Error)]
pub enum Error {
    // Region errors
    #[error("storage region not found: {0}")]
    RegionNotFound(String),

    #[error("erase failed on {region}: {source}")]
    EraseFailed {
        region: String,
        #[source]
        source: io::Error,
    },

    // Mount lifecycle errors
    #[error("mount failed at {mount_point}: {source}")]
    MountFailed {
        mount_point: String,
        #[source]
        source: io::Error,
    },

    #[error("statvfs failed at {mount_point}: {source}")]
    QueryFailed {
        mount_point: String,
        #[source]
        source: io::Error,
    },

    #[error("unmount failed at {mount_point}: {source}")]
    UnmountFailed {
        mount_point: String,
        #[source]
        source: io::Error,
    },

    // File I/O errors
    #[error("cannot open file {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot write to file {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot read from file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot close file {path}: {source}")]
    CloseFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    // Startup errors
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a region not found error
    pub fn region_not_found(id: impl ToString) -> Self {
        Self::RegionNotFound(id.to_string())
    }

    /// Create an erase error
    pub fn erase_failed(region: impl Into<String>, source: io::Error) -> Self {
        Self::EraseFailed {
            region: region.into(),
            source,
        }
    }

    /// Create a mount error
    pub fn mount_failed(mount_point: impl Into<String>, source: io::Error) -> Self {
        Self::MountFailed {
            mount_point: mount_point.into(),
            source,
        }
    }

    /// Create a statvfs error
    pub fn query_failed(mount_point: impl Into<String>, source: io::Error) -> Self {
        Self::QueryFailed {
            mount_point: mount_point.into(),
            source,
        }
    }

    /// Create an unmount error
    pub fn unmount_failed(mount_point: impl Into<String>, source: io::Error) -> Self {
        Self::UnmountFailed {
            mount_point: mount_point.into(),
            source,
        }
    }

    /// Create a file open error
    pub fn open_failed(path: impl Into<String>, source: io::Error) -> Self {
        Self::OpenFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a file write error
    pub fn write_failed(path: impl Into<String>, source: io::Error) -> Self {
        Self::WriteFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a file read error
    pub fn read_failed(path: impl Into<String>, source: io::Error) -> Self {
        Self::ReadFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a file close error
    pub fn close_failed(path: impl Into<String>, source: io::Error) -> Self {
        Self::CloseFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Name of the lifecycle step this error belongs to
    #[must_use]
    pub fn step(&self) -> &'static str {
        match self {
            Self::RegionNotFound(_) => "resolve",
            Self::EraseFailed { .. } => "erase",
            Self::MountFailed { .. } => "mount",
            Self::QueryFailed { .. } => "statvfs",
            Self::UnmountFailed { .. } => "unmount",
            Self::OpenFailed { .. } => "open",
            Self::WriteFailed { .. } => "write",
            Self::ReadFailed { .. } => "read",
            Self::CloseFailed { .. } => "close",
            Self::Config(_) => "config",
        }
    }

    /// Negative errno-style code for diagnostic lines
    ///
    /// Uses the raw OS error when the underlying I/O error carries one,
    /// otherwise falls back to an `ErrorKind` mapping. Unknown kinds
    /// report as -5 (EIO).
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::RegionNotFound(_) => -2,
            Self::Config(_) => -22,
            Self::EraseFailed { source, .. }
            | Self::MountFailed { source, .. }
            | Self::QueryFailed { source, .. }
            | Self::UnmountFailed { source, .. }
            | Self::OpenFailed { source, .. }
            | Self::WriteFailed { source, .. }
            | Self::ReadFailed { source, .. }
            | Self::CloseFailed { source, .. } => io_code(source),
        }
    }

    /// Check if this error aborts the run before any file I/O
    #[must_use]
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            Self::RegionNotFound(_)
                | Self::EraseFailed { .. }
                | Self::MountFailed { .. }
                | Self::Config(_)
        )
    }
}

/// Map an `io::Error` to a negative errno-style code
fn io_code(err: &io::Error) -> i32 {
    if let Some(code) = err.raw_os_error() {
        return -code.abs();
    }
    match err.kind() {
        io::ErrorKind::NotFound => -2,
        io::ErrorKind::PermissionDenied => -13,
        io::ErrorKind::AlreadyExists => -17,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => -22,
        io::ErrorKind::StorageFull | io::ErrorKind::WriteZero => -28,
        _ => -5,
    }
}
