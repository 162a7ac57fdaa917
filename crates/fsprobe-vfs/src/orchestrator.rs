//! End-to-end probe run over one storage region.
//!
//! A run walks the device lifecycle in a fixed order: resolve the
//! region, optionally wipe it, mount, query usage, push each configured
//! payload through a timed write/read pair, and unmount exactly once.
//! Every outcome lands in a [`RunReport`] so the caller can print a
//! summary without re-running anything.

use fsprobe_common::config::FileSpec;
use fsprobe_common::timing::time_call;
use fsprobe_common::{Error, Result};
use fsprobe_storage::{RegionEraser, RegionFile, RegionId, RegionProvider, StorageRegion};
use tracing::{error, info, warn};

use crate::file_io;
use crate::manager::MountManager;
use crate::volume::{FsDriver, MountFlags, VfsStats, Volume};

/// Everything one probe run needs to know, assembled by the caller.
#[derive(Clone, Debug)]
pub struct ProbeContext {
    /// Region to probe, by partition label or volume name.
    pub target: RegionId,
    /// Wipe the region to the erased state before mounting.
    pub wipe: bool,
    /// Mount point override; `None` asks the provider for its default.
    pub mount_point: Option<String>,
    /// Flags forwarded to the filesystem driver.
    pub flags: MountFlags,
    /// Payloads to round-trip, in order.
    pub files: Vec<FileSpec>,
    /// Read-back buffer size in bytes.
    pub read_capacity: usize,
}

/// One timed read or write that actually ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpOutcome {
    /// Bytes transferred, 0 when the operation failed.
    pub bytes: usize,
    /// Wall-clock duration in whole microseconds.
    pub elapsed_us: u128,
    /// 0 on success, otherwise the negative errno-style code.
    pub code: i32,
}

/// Write/read pair outcome for a single file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundTrip {
    /// Absolute path under the mount point.
    pub path: String,
    pub write: OpOutcome,
    /// `None` when the write failed and the read never ran.
    pub read: Option<OpOutcome>,
    /// Whether the read-back matched the written payload.
    pub matched: bool,
}

/// First failure of a run, by lifecycle step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Failure {
    pub step: &'static str,
    pub code: i32,
}

impl Failure {
    fn from_error(err: &Error) -> Self {
        Self {
            step: err.step(),
            code: err.code(),
        }
    }
}

/// What a probe run did and where it stopped.
///
/// Fields stay `None` for steps the run never reached, so the report
/// doubles as a record of how far the lifecycle got.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Resolved region, present once resolution succeeded.
    pub region: Option<StorageRegion>,
    /// Usage snapshot; `None` when the query failed or never ran.
    pub statvfs: Option<VfsStats>,
    /// Completed or partially completed round trips, in run order.
    pub rounds: Vec<RoundTrip>,
    /// `Some(false)` records an unmount that was attempted and failed.
    pub unmounted: Option<bool>,
    /// First error the run hit, if any.
    pub failure: Option<Failure>,
}

impl RunReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Drives one probe run from region resolution through unmount.
pub struct Orchestrator<D: FsDriver> {
    provider: Box<dyn RegionProvider>,
    driver: D,
    context: ProbeContext,
}

impl<D: FsDriver> Orchestrator<D> {
    pub fn new(provider: Box<dyn RegionProvider>, driver: D, context: ProbeContext) -> Self {
        Self {
            provider,
            driver,
            context,
        }
    }

    /// Run the full lifecycle once.
    ///
    /// Failures before the mount abort the run outright. Once mounted,
    /// a failed round trip skips the remaining files but the unmount
    /// still happens, exactly once. A failed usage query is logged and
    /// otherwise ignored.
    pub fn run(&self) -> RunReport {
        let mut report = RunReport::default();

        let region = match self.provider.resolve(&self.context.target) {
            Ok(region) => region,
            Err(err) => return Self::abort(report, &err),
        };
        info!("{}", region.describe());
        report.region = Some(region.clone());

        if self.context.wipe {
            if let Err(err) = self.erase(&region) {
                return Self::abort(report, &err);
            }
        }

        let mount_point = self
            .context
            .mount_point
            .clone()
            .unwrap_or_else(|| self.provider.default_mount_point(&region));
        let mut flags = self.context.flags;
        if self.provider.uses_disk_access() {
            flags.use_disk_access = true;
        }

        let mut manager = match self.mount(&region, &mount_point, flags) {
            Ok(manager) => manager,
            Err(err) => return Self::abort(report, &err),
        };

        match manager.statvfs() {
            Ok(stats) => {
                info!(
                    "{}: bsize = {} ; frsize = {} ; blocks = {} ; bfree = {}",
                    mount_point, stats.block_size, stats.frag_size, stats.blocks, stats.blocks_free
                );
                report.statvfs = Some(stats);
            }
            // Usage is diagnostic only; the round trips still run.
            Err(err) => warn!("{err}"),
        }

        for spec in &self.context.files {
            let path = format!("{}/{}", mount_point, spec.name);
            let (round, failure) = self.round_trip(&manager, &path, spec.payload.as_bytes());
            report.rounds.push(round);
            if let Some(failure) = failure {
                report.failure = Some(failure);
                break;
            }
        }

        match manager.unmount() {
            Ok(()) => report.unmounted = Some(true),
            Err(err) => {
                error!("{err}");
                report.unmounted = Some(false);
                if report.failure.is_none() {
                    report.failure = Some(Failure::from_error(&err));
                }
            }
        }
        report
    }

    fn abort(mut report: RunReport, err: &Error) -> RunReport {
        error!("{err}");
        report.failure = Some(Failure::from_error(err));
        report
    }

    fn erase(&self, region: &StorageRegion) -> Result<()> {
        let mut device = self.open_device(region, |err| {
            Error::erase_failed(region.id().to_string(), err)
        })?;
        let wiped = RegionEraser::default()
            .erase(&mut device)
            .map_err(|err| Error::erase_failed(region.id().to_string(), err))?;
        info!("Erased {wiped} bytes from {}", region.id());
        Ok(())
    }

    fn mount(
        &self,
        region: &StorageRegion,
        mount_point: &str,
        flags: MountFlags,
    ) -> Result<MountManager<D::Volume>> {
        let device = self.open_device(region, |err| Error::mount_failed(mount_point, err))?;
        let volume = self
            .driver
            .prepare(device, &flags)
            .map_err(|err| Error::mount_failed(mount_point, err))?;
        let mut manager = MountManager::new(volume, mount_point, flags);
        manager.mount()?;
        Ok(manager)
    }

    fn open_device(
        &self,
        region: &StorageRegion,
        wrap: impl FnOnce(std::io::Error) -> Error,
    ) -> Result<RegionFile> {
        self.provider.open(region).map_err(wrap)
    }

    fn round_trip<V: Volume>(
        &self,
        manager: &MountManager<V>,
        path: &str,
        payload: &[u8],
    ) -> (RoundTrip, Option<Failure>) {
        let timed = time_call(|| file_io::write_file(manager, path, payload));
        let elapsed_us = timed.elapsed_us();
        info!("Time taken to write: {elapsed_us} microseconds");
        let write = match timed.value {
            Ok(bytes) => {
                info!("Wrote {bytes} bytes to {path}");
                OpOutcome {
                    bytes,
                    elapsed_us,
                    code: 0,
                }
            }
            Err(err) => {
                error!("{err}");
                let round = RoundTrip {
                    path: path.to_string(),
                    write: OpOutcome {
                        bytes: 0,
                        elapsed_us,
                        code: err.code(),
                    },
                    read: None,
                    matched: false,
                };
                return (round, Some(Failure::from_error(&err)));
            }
        };

        let mut buf = vec![0_u8; self.context.read_capacity];
        let timed = time_call(|| file_io::read_file(manager, path, &mut buf));
        let elapsed_us = timed.elapsed_us();
        info!("Time taken to read: {elapsed_us} microseconds");
        match timed.value {
            Ok(bytes) => {
                info!("Read {bytes} bytes from {path}");
                let matched = bytes >= payload.len() && &buf[..payload.len()] == payload;
                if !matched {
                    warn!("read-back of {path} does not match what was written");
                }
                let round = RoundTrip {
                    path: path.to_string(),
                    write,
                    read: Some(OpOutcome {
                        bytes,
                        elapsed_us,
                        code: 0,
                    }),
                    matched,
                };
                (round, None)
            }
            Err(err) => {
                error!("{err}");
                let round = RoundTrip {
                    path: path.to_string(),
                    write,
                    read: Some(OpOutcome {
                        bytes: 0,
                        elapsed_us,
                        code: err.code(),
                    }),
                    matched: false,
                };
                (round, Some(Failure::from_error(&err)))
            }
        }
    }
}
