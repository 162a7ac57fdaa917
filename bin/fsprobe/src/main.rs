//! fsprobe - Filesystem lifecycle probe
//!
//! This binary exercises one storage region end to end: optional erase,
//! mount, usage query, timed write/read round trips, and unmount.

use anyhow::Result;
use clap::Parser;
use fsprobe_common::config::{Backing, ProbeConfig};
use fsprobe_storage::{DiskVolumeProvider, FlashMapProvider, RegionId, RegionProvider};
use fsprobe_vfs::{FatDriver, MountFlags, Orchestrator, ProbeContext, RunReport};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "fsprobe")]
#[command(about = "Filesystem lifecycle probe for flash and disk regions")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/fsprobe/fsprobe.toml")]
    config: String,

    /// Backing strategy: flash or disk
    #[arg(long)]
    backing: Option<String>,

    /// Erase the region before mounting (destructive)
    #[arg(long)]
    wipe: bool,

    /// Flash image path
    #[arg(long)]
    image: Option<String>,

    /// Flash partition label to probe
    #[arg(long)]
    partition: Option<String>,

    /// Disk volume name to probe
    #[arg(long)]
    volume: Option<String>,

    /// Mount point override
    #[arg(long)]
    mount_point: Option<String>,

    /// Treat the volume as mounted by the driver, skipping the explicit bind
    #[arg(long)]
    automount: bool,

    /// Fail instead of formatting when no filesystem is found
    #[arg(long)]
    no_format: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load config file if it exists
    let mut config: ProbeConfig = if std::path::Path::new(&args.config).exists() {
        let config_str = std::fs::read_to_string(&args.config)?;
        toml::from_str(&config_str).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse config file: {e}");
            ProbeConfig::default()
        })
    } else {
        ProbeConfig::default()
    };

    // Merge CLI args with config file (CLI takes precedence)
    if let Some(backing) = &args.backing {
        config.storage.backing = match backing.as_str() {
            "flash" => Backing::Flash,
            "disk" => Backing::Disk,
            other => {
                eprintln!("Unknown backing {other:?}, expected flash or disk");
                std::process::exit(1);
            }
        };
    }
    if args.wipe {
        config.storage.wipe = true;
    }
    if let Some(image) = args.image {
        config.storage.image = image.into();
    }
    if let Some(partition) = args.partition {
        config.storage.partition = partition;
    }
    if let Some(volume) = args.volume {
        config.storage.volume = volume;
    }
    if args.mount_point.is_some() {
        config.mount.mount_point = args.mount_point;
    }
    if args.automount {
        config.mount.automount = true;
    }
    if args.no_format {
        config.mount.no_format = true;
    }
    let log_level = if args.log_level == "info" {
        config.logging.level.clone()
    } else {
        args.log_level.clone()
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fsprobe");
    info!("Config file: {}", args.config);

    if let Err(err) = config.validate() {
        error!("{err}");
        std::process::exit(1);
    }

    let (provider, target) = match build_provider(&config) {
        Ok(pair) => pair,
        Err(err) => {
            error!("Failed to set up storage backing: {err}");
            std::process::exit(1);
        }
    };

    let context = ProbeContext {
        target,
        wipe: config.storage.wipe,
        mount_point: config.mount.mount_point.clone(),
        flags: MountFlags {
            automount: config.mount.automount,
            use_disk_access: false,
            no_format: config.mount.no_format,
        },
        files: config.run.files.clone(),
        read_capacity: config.run.read_capacity,
    };

    let report = Orchestrator::new(provider, FatDriver, context).run();
    summarize(&report);

    // Probe failures are reported above; the exit code stays neutral.
    Ok(())
}

/// Build the region provider and target identifier for the configured
/// backing strategy.
fn build_provider(
    config: &ProbeConfig,
) -> fsprobe_common::Result<(Box<dyn RegionProvider>, RegionId)> {
    match config.storage.backing {
        Backing::Flash => {
            let provider = FlashMapProvider::new(
                &config.storage.image,
                config.storage.partitions.clone(),
            )?;
            Ok((
                Box::new(provider),
                RegionId::Partition(config.storage.partition.clone()),
            ))
        }
        Backing::Disk => {
            let provider = DiskVolumeProvider::new(config.storage.volumes.clone());
            Ok((
                Box::new(provider),
                RegionId::Volume(config.storage.volume.clone()),
            ))
        }
    }
}

fn summarize(report: &RunReport) {
    let verified = report.rounds.iter().filter(|round| round.matched).count();
    if report.succeeded() {
        info!(
            "Probe complete: {verified} of {} round trips verified",
            report.rounds.len()
        );
    } else if let Some(failure) = report.failure {
        warn!("Probe failed at {} (code {})", failure.step, failure.code);
    }
}
