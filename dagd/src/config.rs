//! CLI + optional TOML configuration (spec.md §6 "CLI surface"; SPEC_FULL.md
//! "AMBIENT STACK ADDITIONS / Configuration").
//!
//! CLI flags take precedence over a `--config <path>` TOML file, which in
//! turn supplies defaults; omitting `--config` reproduces CLI-only behavior.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use sysinfo::Disks;

use crate::error::DaemonError;

#[derive(Parser, Debug)]
#[command(
    name = "dagd",
    version,
    about = "DAG generation and cache management daemon for Ethash-family PoW miners"
)]
pub struct CliArgs {
    /// One-shot mode; repeat (`-1 -1`) to verify/generate a single epoch only.
    #[arg(short = '1', action = clap::ArgAction::Count)]
    pub one_shot: u8,

    /// Algorithm (ethash, etchash, ubqhash).
    #[arg(short = 'a', long = "algo")]
    pub algo: Option<String>,

    /// Increase debug verbosity; repeatable.
    #[arg(short = 'd', action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Starting epoch.
    #[arg(short = 'e', long = "epoch")]
    pub epoch: Option<u32>,

    /// Generate checksum stream on stdout for this epoch and exit.
    #[arg(short = 'g', long = "generate")]
    pub generate: Option<u32>,

    /// Event bus host[:port].
    #[arg(short = 'm', long = "mqtt")]
    pub mqtt: Option<String>,

    /// Enable status publication on the bus in one-shot mode.
    #[arg(short = 'M')]
    pub status_in_one_shot: bool,

    /// Size budget: `<n>[k|M|G]`, `unlimited`, or `<path>-<reserve>`.
    #[arg(short = 's', long = "size")]
    pub size: Option<String>,

    /// etchash activation epoch (default 390).
    #[arg(long = "etchash")]
    pub etchash_activation: Option<u32>,

    /// Epoch announcements naming this value are ignored.
    #[arg(long = "alt-epoch")]
    pub alt_epoch: Option<u32>,

    /// Optional TOML config file providing defaults for the above.
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// DAG path template, e.g. `/var/cache/dag/%s-%u.dag`.
    pub dag_fmt: Option<String>,

    /// Optional checksum path template.
    pub csum_fmt: Option<String>,
}

/// On-disk defaults (`--config <path>`), overridden by any CLI flag present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub algo: Option<String>,
    pub epoch: Option<u32>,
    pub mqtt: Option<String>,
    pub size: Option<String>,
    pub etchash_activation: Option<u32>,
    pub alt_epoch: Option<u32>,
    pub dag_fmt: Option<String>,
    pub csum_fmt: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, DaemonError> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| DaemonError::InvalidTemplate(format!("{}: {}", path.display(), err)))?;
        toml::from_str(&text)
            .map_err(|err| DaemonError::InvalidTemplate(format!("{}: {}", path.display(), err)))
    }
}

/// Fully resolved settings: CLI flags layered over an optional file config.
pub struct Settings {
    pub one_shot: u8,
    pub algo: Option<String>,
    pub debug_level: u8,
    pub epoch: Option<u32>,
    pub generate: Option<u32>,
    pub mqtt: Option<String>,
    pub status_in_one_shot: bool,
    pub size: Option<String>,
    pub etchash_activation: u32,
    pub alt_epoch: Option<u32>,
    pub dag_fmt: String,
    pub csum_fmt: Option<String>,
}

impl Settings {
    pub fn resolve(cli: CliArgs) -> Result<Self, DaemonError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let dag_fmt = cli
            .dag_fmt
            .clone()
            .or(file.dag_fmt)
            .ok_or_else(|| DaemonError::InvalidTemplate("dag-fmt is required".to_string()))?;

        Ok(Settings {
            one_shot: cli.one_shot,
            algo: cli.algo.or(file.algo),
            debug_level: cli.debug,
            epoch: cli.epoch.or(file.epoch),
            generate: cli.generate,
            mqtt: cli.mqtt.or(file.mqtt),
            status_in_one_shot: cli.status_in_one_shot,
            size: cli.size.or(file.size),
            etchash_activation: cli.etchash_activation.or(file.etchash_activation).unwrap_or(390),
            alt_epoch: cli.alt_epoch.or(file.alt_epoch),
            dag_fmt,
            csum_fmt: cli.csum_fmt.or(file.csum_fmt),
        })
    }
}

/// Split `host[:port]` (§6 `-m host[:port]`), defaulting to MQTT's standard port.
pub fn parse_mqtt_addr(s: &str) -> (String, u16) {
    match s.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(p) => (host.to_string(), p),
            Err(_) => (s.to_string(), 1883),
        },
        None => (s.to_string(), 1883),
    }
}

/// A resolved size budget (§6 `-s <space>|<path>-<reserve>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeBudget {
    /// A fixed byte budget (possibly `u64::MAX` for "unlimited").
    Bytes(u64),
    /// Computed from filesystem free space at `path`, less `reserve` bytes.
    PathReserve { path: PathBuf, reserve: u64 },
}

impl SizeBudget {
    /// Resolve to an absolute byte budget, querying free space for the
    /// `PathReserve` form via `sysinfo` (matches the teacher's `sysinfo`
    /// dependency, repurposed here for disk free space instead of process
    /// stats — see DESIGN.md).
    pub fn resolve_bytes(&self) -> u64 {
        match self {
            SizeBudget::Bytes(n) => *n,
            SizeBudget::PathReserve { path, reserve } => {
                let free = free_space_at(path).unwrap_or(0);
                free.saturating_sub(*reserve)
            }
        }
    }
}

fn free_space_at(path: &Path) -> Option<u64> {
    let canon = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .filter(|d| canon.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .map(|d| d.available_space())
}

/// Parse a suffixed byte count: digits optionally followed by `k`/`M`/`G`
/// (binary multiples, case-insensitive on the unit letter).
fn parse_byte_count(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (digits, multiplier) = match s.chars().last()? {
        'k' | 'K' => (&s[..s.len() - 1], 1024u64),
        'M' | 'm' => (&s[..s.len() - 1], 1024 * 1024),
        'G' | 'g' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    digits.trim().parse::<u64>().ok().map(|n| n * multiplier)
}

/// Parse `-s`'s argument: `unlimited`, a plain suffixed byte count, or
/// `<path>-<reserve>` (disk-free-space form, §6).
pub fn parse_size(s: &str) -> Result<SizeBudget, DaemonError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("unlimited") {
        return Ok(SizeBudget::Bytes(u64::MAX));
    }
    if let Some(bytes) = parse_byte_count(s) {
        return Ok(SizeBudget::Bytes(bytes));
    }
    if let Some((path_part, reserve_part)) = s.rsplit_once('-') {
        if let Some(reserve) = parse_byte_count(reserve_part) {
            if !path_part.is_empty() {
                return Ok(SizeBudget::PathReserve {
                    path: PathBuf::from(path_part),
                    reserve,
                });
            }
        }
    }
    Err(DaemonError::InvalidSize(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_suffixed_bytes() {
        assert_eq!(parse_size("1024").unwrap(), SizeBudget::Bytes(1024));
        assert_eq!(parse_size("4k").unwrap(), SizeBudget::Bytes(4096));
        assert_eq!(parse_size("2M").unwrap(), SizeBudget::Bytes(2 * 1024 * 1024));
        assert_eq!(parse_size("1G").unwrap(), SizeBudget::Bytes(1024 * 1024 * 1024));
    }

    #[test]
    fn unlimited_is_max() {
        assert_eq!(parse_size("unlimited").unwrap(), SizeBudget::Bytes(u64::MAX));
    }

    #[test]
    fn parses_path_reserve_form() {
        let budget = parse_size("/var/cache/dag-10G").unwrap();
        match budget {
            SizeBudget::PathReserve { path, reserve } => {
                assert_eq!(path, PathBuf::from("/var/cache/dag"));
                assert_eq!(reserve, 10 * 1024 * 1024 * 1024);
            }
            _ => panic!("expected PathReserve"),
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_size("not-a-size-at-all-x").is_err());
    }

    #[test]
    fn mqtt_addr_defaults_port() {
        assert_eq!(parse_mqtt_addr("broker.local"), ("broker.local".to_string(), 1883));
        assert_eq!(parse_mqtt_addr("broker.local:8883"), ("broker.local".to_string(), 8883));
    }
}
