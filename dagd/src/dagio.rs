//! DAG/checksum file I/O (spec.md §6). The numeric kernels and crypto
//! primitives are out of scope per §1; this is the sibling disk-I/O
//! collaborator, also named out of scope there but given a concrete
//! filesystem implementation here since there is no external process to
//! delegate it to.

use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::error::DagIoError;
use crate::sizes::DAG_LINE_BYTES;

/// A handle to an open DAG file, sized in whole lines.
pub struct DagHandle {
    file: File,
    path: PathBuf,
}

impl DagHandle {
    /// Open an existing DAG file read-write. Returns `None` (never an
    /// error) if the file does not exist or cannot be opened — per §7,
    /// a failure to open during scan is "not present", not fatal.
    pub fn open_existing(path: &Path) -> Option<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path).ok()?;
        Some(DagHandle {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Create (or truncate) the DAG file and pre-size it to `lines` worth
    /// of logical length (sparse).
    pub fn create_truncated(path: &Path, lines: u32) -> Result<Self, DagIoError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = fs::create_dir_all(parent);
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| DagIoError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        file.set_len(lines as u64 * DAG_LINE_BYTES)
            .map_err(|source| DagIoError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(DagHandle {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Current logical length in bytes.
    pub fn bytes(&self) -> Result<u64, DagIoError> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|source| DagIoError::Read {
                path: self.path.clone(),
                source,
            })
    }

    /// Read `want_lines` lines starting at `line_offset` into `buf`
    /// (`buf.len() == want_lines * DAG_LINE_BYTES`).
    pub fn pread(&self, buf: &mut [u8], line_offset: u32) -> Result<(), DagIoError> {
        let offset = line_offset as u64 * DAG_LINE_BYTES;
        self.file
            .read_exact_at(buf, offset)
            .map_err(|source| DagIoError::Read {
                path: self.path.clone(),
                source,
            })
    }

    /// Write `buf` (whole lines) at `line_offset`.
    pub fn pwrite(&self, buf: &[u8], line_offset: u32) -> Result<(), DagIoError> {
        let offset = line_offset as u64 * DAG_LINE_BYTES;
        self.file
            .write_all_at(buf, offset)
            .map_err(|source| DagIoError::Write {
                path: self.path.clone(),
                source,
            })
    }

    pub fn close_and_delete(self) -> Result<(), DagIoError> {
        let path = self.path.clone();
        drop(self.file);
        fs::remove_file(&path).map_err(|source| DagIoError::Delete { path, source })
    }
}

/// A handle to a read-only checksum file (§6 "Checksum file layout").
pub struct CsumHandle {
    file: File,
    path: PathBuf,
}

impl CsumHandle {
    /// Missing checksum file is not an error (§4.3): returns `None`.
    pub fn open(path: &Path) -> Option<Self> {
        let file = OpenOptions::new().read(true).open(path).ok()?;
        Some(CsumHandle {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Read exactly `buf.len()` bytes at `offset`. Short reads and I/O
    /// errors are surfaced as `DagIoError` for the caller to fold into a
    /// checksum mismatch (§7) rather than treat as fatal.
    pub fn pread(&self, buf: &mut [u8], offset: u64) -> Result<(), DagIoError> {
        self.file
            .read_exact_at(buf, offset)
            .map_err(|source| DagIoError::Read {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_reopen_round_trips_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("epoch.dag");
        {
            let handle = DagHandle::create_truncated(&path, 4).unwrap();
            assert_eq!(handle.bytes().unwrap(), 4 * DAG_LINE_BYTES);
            let data = vec![0xABu8; 2 * DAG_LINE_BYTES as usize];
            handle.pwrite(&data, 1).unwrap();
        }
        let reopened = DagHandle::open_existing(&path).unwrap();
        let mut buf = vec![0u8; 2 * DAG_LINE_BYTES as usize];
        reopened.pread(&mut buf, 1).unwrap();
        assert!(buf.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn open_existing_missing_file_returns_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("does-not-exist.dag");
        assert!(DagHandle::open_existing(&path).is_none());
    }

    #[test]
    fn close_and_delete_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("epoch.dag");
        let handle = DagHandle::create_truncated(&path, 1).unwrap();
        handle.close_and_delete().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn csum_open_missing_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.csum");
        assert!(CsumHandle::open(&path).is_none());
    }
}
