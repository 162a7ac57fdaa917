//! Call-recording mocks shared by the vfs tests
//!
//! The journal records every provider/driver/volume call in order so
//! tests can assert lifecycle sequencing (erase before mount, mount
//! before file I/O, unmount exactly once). `FailPlan` injects an
//! errno-style failure at any single step.

use crate::volume::{FsDriver, MountFlags, OpenMode, VfsStats, Volume, VolumeFile};
use fsprobe_common::{Error, Result};
use fsprobe_storage::{RegionFile, RegionId, RegionProvider, StorageRegion};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One observed call against a mock
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Resolve(String),
    OpenDevice,
    Prepare(MountFlags),
    Bind,
    Statvfs,
    Open(String, OpenMode),
    FileWrite(String),
    FileRead(String),
    FileClose(String),
    Unbind,
}

/// Shared, ordered call log
#[derive(Clone, Debug, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    pub(crate) fn push(&self, call: Call) {
        self.0.lock().push(call);
    }

    pub(crate) fn snapshot(&self) -> Vec<Call> {
        self.0.lock().clone()
    }
}

/// Failure injection: positive errno per step, `None` for success
#[derive(Clone, Debug, Default)]
pub(crate) struct FailPlan {
    pub resolve: bool,
    pub open_device: Option<i32>,
    pub prepare: Option<i32>,
    pub bind: Option<i32>,
    pub statvfs: Option<i32>,
    pub open: Option<i32>,
    pub write: Option<i32>,
    pub read: Option<i32>,
    pub close: Option<i32>,
    pub unbind: Option<i32>,
    /// Accept only this many bytes per write instead of failing
    pub short_write: Option<usize>,
}

fn fail(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

/// Region provider over a zero-filled image file in a caller-owned
/// directory, so tests can inspect the image after the run.
pub(crate) struct MockProvider {
    journal: Journal,
    plan: FailPlan,
    image: PathBuf,
    size: u64,
    mount_point: String,
    disk_access: bool,
}

impl MockProvider {
    pub(crate) fn new(dir: &Path, size: u64, journal: Journal, plan: FailPlan) -> Self {
        let image = dir.join("region.img");
        let file = std::fs::File::create(&image).unwrap();
        file.set_len(size).unwrap();
        Self {
            journal,
            plan,
            image,
            size,
            mount_point: "/lfs1".to_string(),
            disk_access: false,
        }
    }

    pub(crate) fn with_mount_point(mut self, mount_point: &str) -> Self {
        self.mount_point = mount_point.to_string();
        self
    }

    pub(crate) fn with_disk_access(mut self) -> Self {
        self.disk_access = true;
        self
    }

    pub(crate) fn image_path(&self) -> &Path {
        &self.image
    }
}

impl RegionProvider for MockProvider {
    fn resolve(&self, id: &RegionId) -> Result<StorageRegion> {
        self.journal.push(Call::Resolve(id.to_string()));
        if self.plan.resolve {
            return Err(Error::region_not_found(id));
        }
        Ok(StorageRegion::new(
            id.clone(),
            0,
            self.size,
            self.image.to_string_lossy(),
        ))
    }

    fn open(&self, region: &StorageRegion) -> io::Result<RegionFile> {
        self.journal.push(Call::OpenDevice);
        if let Some(code) = self.plan.open_device {
            return Err(fail(code));
        }
        let file = OpenOptions::new().read(true).write(true).open(&self.image)?;
        Ok(RegionFile::new(file, region.offset(), region.size()))
    }

    fn default_mount_point(&self, _region: &StorageRegion) -> String {
        self.mount_point.clone()
    }

    fn uses_disk_access(&self) -> bool {
        self.disk_access
    }
}

/// Driver handing out in-memory mock volumes
pub(crate) struct RecordingDriver {
    journal: Journal,
    plan: FailPlan,
}

impl RecordingDriver {
    pub(crate) fn new(journal: Journal, plan: FailPlan) -> Self {
        Self { journal, plan }
    }
}

impl FsDriver for RecordingDriver {
    type Volume = MockVolume;

    fn prepare(&self, _device: RegionFile, flags: &MountFlags) -> io::Result<MockVolume> {
        self.journal.push(Call::Prepare(*flags));
        if let Some(code) = self.plan.prepare {
            return Err(fail(code));
        }
        // With automount the volume comes back bound without a Bind call
        // on the journal, like a filesystem mounted before the app ran.
        Ok(MockVolume::new(
            self.journal.clone(),
            self.plan.clone(),
            flags.automount,
        ))
    }
}

/// In-memory volume with a name -> contents map behind it
#[derive(Debug)]
pub(crate) struct MockVolume {
    journal: Journal,
    plan: FailPlan,
    bound: bool,
    files: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl MockVolume {
    pub(crate) fn new(journal: Journal, plan: FailPlan, bound: bool) -> Self {
        Self {
            journal,
            plan,
            bound,
            files: RefCell::new(BTreeMap::new()),
        }
    }
}

impl Volume for MockVolume {
    type File<'v>
        = MockFile<'v>
    where
        Self: 'v;

    fn bind(&mut self) -> io::Result<()> {
        self.journal.push(Call::Bind);
        if let Some(code) = self.plan.bind {
            return Err(fail(code));
        }
        self.bound = true;
        Ok(())
    }

    fn is_bound(&self) -> bool {
        self.bound
    }

    fn statvfs(&self) -> io::Result<VfsStats> {
        self.journal.push(Call::Statvfs);
        if let Some(code) = self.plan.statvfs {
            return Err(fail(code));
        }
        Ok(VfsStats {
            block_size: 512,
            frag_size: 4096,
            blocks: 1024,
            blocks_free: 1000,
        })
    }

    fn open<'v>(&'v self, path: &str, mode: OpenMode) -> io::Result<MockFile<'v>> {
        self.journal.push(Call::Open(path.to_string(), mode));
        if let Some(code) = self.plan.open {
            return Err(fail(code));
        }
        match mode {
            OpenMode::Write => {
                self.files.borrow_mut().insert(path.to_string(), Vec::new());
            }
            OpenMode::Read => {
                if !self.files.borrow().contains_key(path) {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        "no such file or directory",
                    ));
                }
            }
        }
        Ok(MockFile {
            volume: self,
            name: path.to_string(),
            pos: 0,
        })
    }

    fn unbind(&mut self) -> io::Result<()> {
        self.journal.push(Call::Unbind);
        if let Some(code) = self.plan.unbind {
            return Err(fail(code));
        }
        self.bound = false;
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct MockFile<'v> {
    volume: &'v MockVolume,
    name: String,
    pos: usize,
}

impl VolumeFile for MockFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.volume.journal.push(Call::FileRead(self.name.clone()));
        if let Some(code) = self.volume.plan.read {
            return Err(fail(code));
        }
        let files = self.volume.files.borrow();
        let data = files.get(&self.name).map(Vec::as_slice).unwrap_or_default();
        let available = data.len().saturating_sub(self.pos);
        let count = buf.len().min(available);
        buf[..count].copy_from_slice(&data[self.pos..self.pos + count]);
        self.pos += count;
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.volume.journal.push(Call::FileWrite(self.name.clone()));
        if let Some(code) = self.volume.plan.write {
            return Err(fail(code));
        }
        let accepted = self.volume.plan.short_write.unwrap_or(buf.len()).min(buf.len());
        self.volume
            .files
            .borrow_mut()
            .entry(self.name.clone())
            .or_default()
            .extend_from_slice(&buf[..accepted]);
        Ok(accepted)
    }

    fn close(self) -> io::Result<()> {
        self.volume.journal.push(Call::FileClose(self.name.clone()));
        if let Some(code) = self.volume.plan.close {
            return Err(fail(code));
        }
        Ok(())
    }
}
