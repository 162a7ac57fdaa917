//! fsprobe VFS - Mount lifecycle and instrumented file I/O
//!
//! Owns everything between a raw storage region and the run report: the
//! volume/driver seams, the FAT driver bound over a region window, the
//! mount state machine, scoped file operations, and the orchestrator
//! that sequences a whole probe run.

pub mod fat;
pub mod file_io;
pub mod manager;
pub mod orchestrator;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;

pub use fat::FatDriver;
pub use manager::{MountManager, MountState};
pub use orchestrator::{Orchestrator, ProbeContext, RunReport};
pub use volume::{FsDriver, MAX_PATH_LEN, MountFlags, OpenMode, VfsStats, Volume, VolumeFile};
