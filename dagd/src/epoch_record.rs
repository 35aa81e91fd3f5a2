//! EpochRecord — per-(algo, epoch) metadata and lifecycle (spec.md §4.3).
//!
//! Grounded on `epoch.c`'s `epoch_new`/`epoch_open`/`free_epoch`/`wipe_epoch`.

use std::path::PathBuf;

use crate::algo::Algorithm;
use crate::cache_stage::CacheStage;
use crate::dagio::{CsumHandle, DagHandle};
use crate::sizes::{lines as lines_for_epoch, round_to_block};
use crate::templates::PathTemplate;

pub struct EpochRecord {
    pub algo: Algorithm,
    pub num: u32,
    pub path: PathBuf,
    pub(crate) dag_handle: Option<DagHandle>,
    pub(crate) csum_handle: Option<CsumHandle>,
    pub pos: u32,
    pub nominal: u32,
    pub lines: u32,
    pub size: u64,
    pub final_size: u64,
    pub cache: CacheStage,
    pub(crate) chunk: Option<Vec<u8>>,
}

impl EpochRecord {
    /// `epoch_new`: fresh bookkeeping for an epoch not yet known to be on
    /// disk (counters all zero, no handles).
    pub fn new(
        algo: Algorithm,
        num: u32,
        dag_template: &PathTemplate,
        block_size: u64,
    ) -> Self {
        let lines = lines_for_epoch(num);
        let path = PathBuf::from(dag_template.format(algo.name(), num));
        let final_size = round_to_block(lines as u64 * crate::sizes::DAG_LINE_BYTES, block_size);
        EpochRecord {
            algo,
            num,
            path,
            dag_handle: None,
            csum_handle: None,
            pos: 0,
            nominal: 0,
            lines,
            size: 0,
            final_size,
            cache: CacheStage::init(algo, num),
            chunk: None,
        }
    }

    /// `epoch_open`: read back on-disk state for an epoch discovered during
    /// a scan. Returns `None` if the DAG file cannot be opened (§7: "not
    /// present", not an error).
    pub fn open(
        algo: Algorithm,
        num: u32,
        dag_template: &PathTemplate,
        csum_template: Option<&PathTemplate>,
        block_size: u64,
    ) -> Option<Self> {
        let mut record = EpochRecord::new(algo, num, dag_template, block_size);
        let handle = DagHandle::open_existing(&record.path)?;
        let bytes = handle.bytes().ok()?;
        record.nominal = (bytes / crate::sizes::DAG_LINE_BYTES) as u32;
        record.size = round_to_block(bytes, block_size);
        record.dag_handle = Some(handle);
        if let Some(csum_template) = csum_template {
            let csum_path = PathBuf::from(csum_template.format(algo.name(), num));
            record.csum_handle = CsumHandle::open(&csum_path);
        }
        Some(record)
    }

    pub fn has_dag_handle(&self) -> bool {
        self.dag_handle.is_some()
    }

    pub fn dag_handle(&self) -> Option<&DagHandle> {
        self.dag_handle.as_ref()
    }

    pub fn csum_handle(&self) -> Option<&CsumHandle> {
        self.csum_handle.as_ref()
    }

    /// Create (or truncate) the backing DAG file on demand.
    pub fn create_dag(&mut self) -> Result<(), crate::error::DagIoError> {
        debug_assert!(self.dag_handle.is_none());
        let handle = DagHandle::create_truncated(&self.path, self.lines)?;
        self.dag_handle = Some(handle);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.pos == self.lines
    }

    /// Release the chunk buffer and cache-stage buffers once the artifact
    /// is complete, to reclaim memory while keeping the on-disk file
    /// (spec.md §5 "Resource policy").
    pub fn release_buffers(&mut self) {
        self.chunk = None;
        self.cache.release();
    }

    /// Refresh `size` from the handle's current on-disk length.
    pub fn refresh_size(&mut self, block_size: u64) -> Result<(), crate::error::DagIoError> {
        if let Some(handle) = &self.dag_handle {
            let bytes = handle.bytes()?;
            self.size = round_to_block(bytes, block_size);
        }
        Ok(())
    }

    /// Wipe the backing file (eviction) and drop the handle.
    pub fn wipe(&mut self) {
        if let Some(handle) = self.dag_handle.take() {
            if let Err(err) = handle.close_and_delete() {
                log::warn!("wipe {}: {}", self.path.display(), err);
            }
        }
    }
}

impl Drop for EpochRecord {
    fn drop(&mut self) {
        self.chunk = None;
        self.cache.release();
    }
}
