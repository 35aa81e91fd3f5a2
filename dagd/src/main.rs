//! `dagd` entry point (spec.md §6 "CLI surface"; `dagd.c`'s `main`).

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;

use dagd::algo::Algorithm;
use dagd::config::{parse_mqtt_addr, parse_size, CliArgs, Settings};
use dagd::control::ControlState;
use dagd::csum_tool::generate_checksums;
use dagd::error::DaemonError;
use dagd::host_loop::HostLoop;
use dagd::mqtt_bus::MqttBus;
use dagd::registry::EpochRegistry;
use dagd::sizes::{EPOCH_MAX, EPOCH_MIN};
use dagd::templates::PathTemplate;

fn check_epoch_range(epoch: u32) -> Result<(), DaemonError> {
    if epoch < EPOCH_MIN || epoch > EPOCH_MAX {
        Err(DaemonError::EpochOutOfRange(epoch, EPOCH_MIN, EPOCH_MAX))
    } else {
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = CliArgs::parse();
    let settings = Settings::resolve(cli)?;
    init_logging(settings.debug_level);

    let algo = match &settings.algo {
        Some(name) => Algorithm::from_str(name)?,
        None => Algorithm::default(),
    };

    if let Some(epoch) = settings.epoch {
        check_epoch_range(epoch)?;
    }

    // `-g <epoch>`: standalone checksum generator, out of the daemon's core
    // loop entirely (spec.md §6).
    if let Some(epoch) = settings.generate {
        check_epoch_range(epoch)?;
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        generate_checksums(algo, epoch, &mut handle).context("checksum generation failed")?;
        return Ok(());
    }

    let dag_template =
        PathTemplate::parse(&settings.dag_fmt).context("invalid dag-fmt path template")?;
    let csum_template = match &settings.csum_fmt {
        Some(fmt) => Some(PathTemplate::parse(fmt).context("invalid csum-fmt path template")?),
        None => None,
    };

    let block_size = block_size_for(&dag_template);

    let max_cache = match &settings.size {
        Some(spec) => parse_size(spec)?.resolve_bytes(),
        None => dagd::control::NO_BUDGET,
    };

    let mut control = ControlState::new(dag_template.clone(), csum_template.clone());
    control.curr_algo = settings.algo.as_deref().map(|_| algo);
    control.curr_epoch = settings.epoch;
    control.alt_epoch = settings.alt_epoch;
    control.max_cache = max_cache;
    control.etchash_activation_epoch = settings.etchash_activation;
    let control = Arc::new(Mutex::new(control));

    let registry = EpochRegistry::new(dag_template, csum_template, block_size);

    let bus = match &settings.mqtt {
        Some(addr) => {
            let (host, port) = parse_mqtt_addr(addr);
            Some(MqttBus::connect(&host, port, "dagd").context("event bus connect failed")?)
        }
        None => None,
    };

    let mut host_loop = HostLoop::new(registry, control, bus);
    if settings.status_in_one_shot {
        host_loop.enable_one_shot_status();
    }

    match settings.one_shot {
        0 => host_loop.run_loop(),
        1 => host_loop.run_one_shot(false),
        _ => host_loop.run_one_shot(true),
    }

    Ok(())
}

fn init_logging(debug_level: u8) {
    let filter = match debug_level {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(filter)
        .init();
}

/// Block size of the filesystem backing the DAG path template, via
/// `MetadataExt::blksize` on a dummy-substituted path's parent directory;
/// falls back to 4096 if the directory cannot be created or queried.
fn block_size_for(template: &PathTemplate) -> u64 {
    use std::os::unix::fs::MetadataExt;

    let sample = template.format("ethash", 0);
    let dir = Path::new(&sample).parent().unwrap_or_else(|| Path::new("."));
    let _ = std::fs::create_dir_all(dir);
    std::fs::metadata(dir).map(|m| m.blksize()).unwrap_or(4096)
}
