//! Scoped file operations
//!
//! Each operation opens, transfers, and closes in one call. The close
//! happens on every exit path: when the transfer fails the handle is
//! still closed before the error propagates (that close's own outcome is
//! logged, not surfaced, so the transfer error wins).

use crate::manager::MountManager;
use crate::volume::{OpenMode, Volume, VolumeFile};
use fsprobe_common::{Error, Result};
use std::io;
use tracing::{debug, warn};

/// Create or truncate `path` and write the whole payload
///
/// A short write is an error. Returns the number of bytes written.
pub fn write_file<V: Volume>(
    manager: &MountManager<V>,
    path: &str,
    payload: &[u8],
) -> Result<usize> {
    let mut file = manager.open(path, OpenMode::Write)?;
    let accepted = match file.write(payload) {
        Ok(accepted) => accepted,
        Err(err) => {
            close_quietly(file, path);
            return Err(Error::write_failed(path, err));
        }
    };
    if accepted < payload.len() {
        close_quietly(file, path);
        return Err(Error::write_failed(
            path,
            io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {accepted} of {} bytes", payload.len()),
            ),
        ));
    }
    file.close()
        .map_err(|err| Error::close_failed(path, err))?;
    debug!(path, bytes = accepted, "wrote file");
    Ok(accepted)
}

/// Read up to `buf.len()` bytes from `path`
///
/// Returns the number of bytes read; zero is a valid result for an
/// empty file, not an error.
pub fn read_file<V: Volume>(
    manager: &MountManager<V>,
    path: &str,
    buf: &mut [u8],
) -> Result<usize> {
    let mut file = manager.open(path, OpenMode::Read)?;
    let count = match file.read(buf) {
        Ok(count) => count,
        Err(err) => {
            close_quietly(file, path);
            return Err(Error::read_failed(path, err));
        }
    };
    file.close()
        .map_err(|err| Error::close_failed(path, err))?;
    debug!(path, bytes = count, "read file");
    Ok(count)
}

/// Close after a failed transfer; the transfer error is the one that
/// propagates.
fn close_quietly<F: VolumeFile>(file: F, path: &str) {
    if let Err(err) = file.close() {
        warn!(path, error = %err, "close after failed transfer also failed");
    }
}
