//! Region eraser
//!
//! Destructively wipes a region back to the NOR-flash erased state: every
//! byte set to 0xFF, written in bounded chunks, synced at the end.
//! Strictly opt-in and only ever run before a mount.

use crate::region::RegionFile;
use std::io::{self, Seek, SeekFrom, Write};
use tracing::debug;

/// Byte value of erased NOR flash
pub const ERASED_BYTE: u8 = 0xFF;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Chunked 0xFF filler for storage regions
pub struct RegionEraser {
    chunk_size: usize,
}

impl Default for RegionEraser {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl RegionEraser {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Fill the whole window with 0xFF and sync; returns bytes wiped
    ///
    /// Idempotent: erasing an already-erased region rewrites the same
    /// bytes.
    pub fn erase(&self, device: &mut RegionFile) -> io::Result<u64> {
        let total = device.len();
        device.seek(SeekFrom::Start(0))?;

        let chunk_len = self
            .chunk_size
            .min(usize::try_from(total).unwrap_or(self.chunk_size));
        let chunk = vec![ERASED_BYTE; chunk_len.max(1)];

        let mut remaining = total;
        while remaining > 0 {
            let step = usize::try_from(remaining.min(chunk.len() as u64)).unwrap_or(chunk.len());
            device.write_all(&chunk[..step])?;
            remaining -= step as u64;
        }
        device.sync()?;
        debug!(bytes = total, "region erased");
        Ok(total)
    }
}
