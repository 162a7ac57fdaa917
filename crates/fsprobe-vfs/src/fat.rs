//! FAT driver
//!
//! Binds a FAT filesystem over a region window. When the first bind
//! finds no valid filesystem the region is formatted and the bind
//! retried once, unless the no-format flag is set. The volume keeps a
//! spare handle to its device so format and retry can run even after a
//! failed bind consumed the working handle.

use crate::volume::{FsDriver, MountFlags, OpenMode, VfsStats, Volume, VolumeFile};
use fatfs::{FormatVolumeOptions, FsOptions};
use fsprobe_storage::RegionFile;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::{debug, warn};

/// FAT transfer block size
const SECTOR_SIZE: u32 = 512;

type FatFs = fatfs::FileSystem<RegionFile>;

/// Driver producing FAT volumes over region devices
#[derive(Clone, Copy, Debug, Default)]
pub struct FatDriver;

impl FsDriver for FatDriver {
    type Volume = FatVolume;

    fn prepare(&self, device: RegionFile, flags: &MountFlags) -> io::Result<FatVolume> {
        let mut volume = FatVolume::new(device, flags.no_format);
        if flags.automount {
            volume.bind()?;
        }
        Ok(volume)
    }
}

/// A FAT filesystem instance over one region device
pub struct FatVolume {
    device: RegionFile,
    no_format: bool,
    fs: Option<FatFs>,
}

impl FatVolume {
    fn new(device: RegionFile, no_format: bool) -> Self {
        Self {
            device,
            no_format,
            fs: None,
        }
    }

    fn device_window(&self) -> io::Result<RegionFile> {
        let mut window = self.device.try_clone()?;
        window.seek(SeekFrom::Start(0))?;
        Ok(window)
    }

    fn format(&self) -> io::Result<()> {
        let mut window = self.device_window()?;
        fatfs::format_volume(
            &mut window,
            FormatVolumeOptions::new().volume_label(*b"FSPROBE    "),
        )?;
        window.sync()
    }

    fn bound_fs(&self) -> io::Result<&FatFs> {
        self.fs
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "volume not bound"))
    }
}

impl Volume for FatVolume {
    type File<'v>
        = FatFile<'v>
    where
        Self: 'v;

    fn bind(&mut self) -> io::Result<()> {
        if self.fs.is_some() {
            return Ok(());
        }
        match FatFs::new(self.device_window()?, FsOptions::new()) {
            Ok(fs) => {
                self.fs = Some(fs);
                Ok(())
            }
            Err(err) if !self.no_format => {
                warn!(error = %err, "no usable filesystem on region, formatting");
                self.format()?;
                let fs = FatFs::new(self.device_window()?, FsOptions::new())?;
                self.fs = Some(fs);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn is_bound(&self) -> bool {
        self.fs.is_some()
    }

    fn statvfs(&self) -> io::Result<VfsStats> {
        let stats = self.bound_fs()?.stats()?;
        Ok(VfsStats {
            block_size: SECTOR_SIZE,
            frag_size: stats.cluster_size(),
            blocks: u64::from(stats.total_clusters()),
            blocks_free: u64::from(stats.free_clusters()),
        })
    }

    fn open<'v>(&'v self, path: &str, mode: OpenMode) -> io::Result<FatFile<'v>> {
        let root = self.bound_fs()?.root_dir();
        let inner = match mode {
            OpenMode::Read => root.open_file(path)?,
            OpenMode::Write => {
                let mut file = root.create_file(path)?;
                file.truncate()?;
                file
            }
        };
        debug!(path, ?mode, "file opened");
        Ok(FatFile { inner })
    }

    fn unbind(&mut self) -> io::Result<()> {
        match self.fs.take() {
            Some(fs) => fs.unmount(),
            None => Ok(()),
        }
    }
}

/// An open file on a FAT volume
pub struct FatFile<'v> {
    inner: fatfs::File<'v, RegionFile>,
}

// Manual impl: fatfs::File does not implement Debug.
impl fmt::Debug for FatFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FatFile").finish_non_exhaustive()
    }
}

impl VolumeFile for FatFile<'_> {
    /// Reads until the buffer is full or the file ends, so a single call
    /// behaves like the flat read the callers expect.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let count = self.inner.read(&mut buf[filled..])?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        Ok(filled)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_all(buf)?;
        Ok(buf.len())
    }

    fn close(mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    const REGION_SIZE: u64 = 8 * 1024 * 1024;

    fn blank_device() -> (TempDir, RegionFile) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("region.img");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .unwrap();
        file.set_len(REGION_SIZE).unwrap();
        (dir, RegionFile::new(file, 0, REGION_SIZE))
    }

    fn bound_volume() -> (TempDir, FatVolume) {
        let (dir, device) = blank_device();
        let mut volume = FatDriver
            .prepare(device, &MountFlags::default())
            .unwrap();
        volume.bind().unwrap();
        (dir, volume)
    }

    #[test]
    fn test_bind_formats_blank_region() {
        let (_dir, volume) = bound_volume();
        assert!(volume.is_bound());
    }

    #[test]
    fn test_no_format_rejects_blank_region() {
        let (_dir, device) = blank_device();
        let mut volume = FatDriver
            .prepare(
                device,
                &MountFlags {
                    no_format: true,
                    ..MountFlags::default()
                },
            )
            .unwrap();
        assert!(volume.bind().is_err());
        assert!(!volume.is_bound());
    }

    #[test]
    fn test_automount_prepare_binds() {
        let (_dir, device) = blank_device();
        let volume = FatDriver
            .prepare(
                device,
                &MountFlags {
                    automount: true,
                    ..MountFlags::default()
                },
            )
            .unwrap();
        assert!(volume.is_bound());
    }

    #[test]
    fn test_write_read_round_trip() {
        let (_dir, volume) = bound_volume();

        let mut file = volume.open("myfile.txt", OpenMode::Write).unwrap();
        assert_eq!(file.write(b"Hello, LittleFS!\0").unwrap(), 17);
        file.close().unwrap();

        let mut file = volume.open("myfile.txt", OpenMode::Read).unwrap();
        let mut buf = [0_u8; 64];
        let count = file.read(&mut buf).unwrap();
        file.close().unwrap();
        assert_eq!(count, 17);
        assert_eq!(&buf[..17], b"Hello, LittleFS!\0");
    }

    #[test]
    fn test_write_truncates_previous_contents() {
        let (_dir, volume) = bound_volume();

        let mut file = volume.open("note.txt", OpenMode::Write).unwrap();
        file.write(b"a much longer payload").unwrap();
        file.close().unwrap();

        let mut file = volume.open("note.txt", OpenMode::Write).unwrap();
        file.write(b"short").unwrap();
        file.close().unwrap();

        let mut file = volume.open("note.txt", OpenMode::Read).unwrap();
        let mut buf = [0_u8; 64];
        let count = file.read(&mut buf).unwrap();
        file.close().unwrap();
        assert_eq!(&buf[..count], b"short");
    }

    #[test]
    fn test_empty_file_reads_zero_bytes() {
        let (_dir, volume) = bound_volume();

        let file = volume.open("empty.txt", OpenMode::Write).unwrap();
        file.close().unwrap();

        let mut file = volume.open("empty.txt", OpenMode::Read).unwrap();
        let mut buf = [0_u8; 64];
        assert_eq!(file.read(&mut buf).unwrap(), 0);
        file.close().unwrap();
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let (_dir, volume) = bound_volume();
        let err = volume.open("nope.txt", OpenMode::Read).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_unbound_volume_rejects_operations() {
        let (_dir, device) = blank_device();
        let volume = FatDriver
            .prepare(device, &MountFlags::default())
            .unwrap();
        assert!(!volume.is_bound());
        assert!(volume.statvfs().is_err());
        assert!(volume.open("x.txt", OpenMode::Read).is_err());
    }

    #[test]
    fn test_rebind_preserves_filesystem() {
        let (_dir, device) = blank_device();
        let mut volume = FatDriver
            .prepare(device, &MountFlags::default())
            .unwrap();
        volume.bind().unwrap();
        let mut file = volume.open("keep.txt", OpenMode::Write).unwrap();
        file.write(b"survives remount").unwrap();
        file.close().unwrap();
        volume.unbind().unwrap();

        // Second bind must find the existing filesystem, not format.
        volume.bind().unwrap();
        let mut file = volume.open("keep.txt", OpenMode::Read).unwrap();
        let mut buf = [0_u8; 64];
        let count = file.read(&mut buf).unwrap();
        file.close().unwrap();
        assert_eq!(&buf[..count], b"survives remount");
    }

    #[test]
    fn test_statvfs_reports_geometry() {
        let (_dir, volume) = bound_volume();
        let stats = volume.statvfs().unwrap();
        assert_eq!(stats.block_size, SECTOR_SIZE);
        assert!(stats.frag_size >= SECTOR_SIZE);
        assert!(stats.blocks > 0);
        assert!(stats.blocks_free <= stats.blocks);
    }

    #[test]
    fn test_large_random_payload_round_trip() {
        let (_dir, volume) = bound_volume();
        let mut payload = vec![0_u8; 4096];
        rand::thread_rng().fill_bytes(&mut payload);

        let mut file = volume.open("pattern.bin", OpenMode::Write).unwrap();
        assert_eq!(file.write(&payload).unwrap(), payload.len());
        file.close().unwrap();

        let mut file = volume.open("pattern.bin", OpenMode::Read).unwrap();
        let mut buf = vec![0_u8; 8192];
        let count = file.read(&mut buf).unwrap();
        file.close().unwrap();
        assert_eq!(count, payload.len());
        assert_eq!(&buf[..count], payload.as_slice());
    }

    #[test]
    fn test_unbind_then_statvfs_fails() {
        let (_dir, mut volume) = bound_volume();
        volume.unbind().unwrap();
        assert!(!volume.is_bound());
        let err = volume.statvfs().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
