//! Error types for the DAG I/O boundary and top-level fatal conditions.

use std::path::PathBuf;

use thiserror::Error;

/// Failures from the disk-I/O collaborator (§6 DAG/checksum file layout).
///
/// Verify-path errors (short checksum read, missing checksum file) are
/// caught by the chunk engine and folded into a checksum mismatch — they
/// never reach the scheduler as `Err`. Create/write-path errors propagate.
#[derive(Debug, Error)]
pub enum DagIoError {
    #[error("open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal, process-level conditions (§7). Printed and exit(1) by `main`.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("unknown algorithm \"{0}\"")]
    UnknownAlgorithm(String),

    #[error("invalid path template \"{0}\" (must accept algorithm name and epoch number)")]
    InvalidTemplate(String),

    #[error("invalid size \"{0}\"")]
    InvalidSize(String),

    #[error("epoch {0} out of supported range [{1}, {2}]")]
    EpochOutOfRange(u32, u32, u32),

    #[error("event bus connection failed: {0}")]
    BusConnect(String),
}
