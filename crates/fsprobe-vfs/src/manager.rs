//! Mount state machine
//!
//! One `MountManager` owns one volume and its mount point for the whole
//! run. States move Unmounted -> Mounted -> Unmounted; statvfs and file
//! opens are gated on Mounted, unmount is idempotent, and dropping a
//! still-mounted manager unbinds the volume so no exit path leaks a
//! mounted handle.

use crate::volume::{MAX_PATH_LEN, MountFlags, OpenMode, VfsStats, Volume};
use fsprobe_common::{Error, Result};
use std::io;
use tracing::{info, warn};

/// Mount lifecycle states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountState {
    Unmounted,
    Mounted,
}

/// Owns the Unmounted -> Mounted -> Unmounted transitions for one volume
pub struct MountManager<V: Volume> {
    mount_point: String,
    flags: MountFlags,
    volume: V,
    state: MountState,
}

impl<V: Volume> MountManager<V> {
    pub fn new(volume: V, mount_point: impl Into<String>, flags: MountFlags) -> Self {
        Self {
            mount_point: mount_point.into(),
            flags,
            volume,
            state: MountState::Unmounted,
        }
    }

    pub fn state(&self) -> MountState {
        self.state
    }

    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// Transition to Mounted
    ///
    /// With the automount flag the volume was already bound when the
    /// driver prepared it, so only the state transition is recorded.
    pub fn mount(&mut self) -> Result<()> {
        if self.state == MountState::Mounted {
            return Err(Error::mount_failed(
                &self.mount_point,
                io::Error::new(io::ErrorKind::InvalidInput, "already mounted"),
            ));
        }
        if self.flags.automount {
            if !self.volume.is_bound() {
                return Err(Error::mount_failed(
                    &self.mount_point,
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "automount set but volume is not bound",
                    ),
                ));
            }
            info!("{} automounted", self.mount_point);
        } else {
            self.volume
                .bind()
                .map_err(|err| Error::mount_failed(&self.mount_point, err))?;
            info!("{} mounted", self.mount_point);
        }
        self.state = MountState::Mounted;
        Ok(())
    }

    /// Usage snapshot; only valid while Mounted
    pub fn statvfs(&self) -> Result<VfsStats> {
        if self.state != MountState::Mounted {
            return Err(Error::query_failed(
                &self.mount_point,
                io::Error::new(io::ErrorKind::InvalidInput, "volume not mounted"),
            ));
        }
        self.volume
            .statvfs()
            .map_err(|err| Error::query_failed(&self.mount_point, err))
    }

    /// Open a file under the mount point; only valid while Mounted
    ///
    /// The path must stay within `MAX_PATH_LEN` bytes and begin with the
    /// mount point prefix.
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<V::File<'_>> {
        if self.state != MountState::Mounted {
            return Err(Error::open_failed(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "volume not mounted"),
            ));
        }
        let relative = self
            .relative_path(path)
            .map_err(|err| Error::open_failed(path, err))?;
        self.volume
            .open(relative, mode)
            .map_err(|err| Error::open_failed(path, err))
    }

    /// Transition to Unmounted
    ///
    /// Unmounting an already-unmounted manager is reported and succeeds.
    /// The attempt consumes the mounted state even when the volume
    /// refuses to unbind, so unmount is only ever attempted once.
    pub fn unmount(&mut self) -> Result<()> {
        if self.state == MountState::Unmounted {
            info!("{} already unmounted", self.mount_point);
            return Ok(());
        }
        self.state = MountState::Unmounted;
        self.volume
            .unbind()
            .map_err(|err| Error::unmount_failed(&self.mount_point, err))?;
        info!("{} unmounted", self.mount_point);
        Ok(())
    }

    fn relative_path<'p>(&self, path: &'p str) -> io::Result<&'p str> {
        if path.len() > MAX_PATH_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path exceeds {MAX_PATH_LEN} bytes"),
            ));
        }
        let relative = path.strip_prefix(self.mount_point.as_str()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is outside mount point {}", self.mount_point),
            )
        })?;
        let relative = relative.strip_prefix('/').unwrap_or(relative);
        if relative.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path names the mount point itself",
            ));
        }
        Ok(relative)
    }
}

impl<V: Volume> Drop for MountManager<V> {
    fn drop(&mut self) {
        if self.state == MountState::Mounted {
            if let Err(err) = self.volume.unbind() {
                warn!(
                    mount_point = %self.mount_point,
                    error = %err,
                    "unbind of still-mounted volume failed during drop"
                );
            }
        }
    }
}
