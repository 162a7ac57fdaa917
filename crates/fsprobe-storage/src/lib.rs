//! fsprobe Storage - Region resolution and raw region I/O
//!
//! Locates the physical byte range backing a probe run (a flash partition
//! inside an image, or a named disk volume), hands out windowed file
//! handles over it, and supports wiping it back to the erased state.

pub mod disk;
pub mod erase;
pub mod flash;
pub mod region;

pub use disk::DiskVolumeProvider;
pub use erase::RegionEraser;
pub use flash::FlashMapProvider;
pub use region::{RegionFile, RegionId, RegionProvider, StorageRegion};
