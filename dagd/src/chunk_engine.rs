//! ChunkEngine — verify or generate a single chunk (spec.md §4.2).
//!
//! Grounded on `dag.c`'s `generate_chunk`/`check_chunk`/`work_on`, including
//! the "first mismatch stops verifying" policy (§9 open question, preserved
//! deliberately).

use sha3::{Digest, Sha3_256};

use crate::epoch_record::EpochRecord;
use crate::sizes::{CSUM_BYTES, DAG_LINE_BYTES, LINES_PER_CHUNK};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Work was done and progress advanced by one chunk (or less, at EOF).
    Advanced,
    /// The cache stage isn't ready yet; caller should step it and retry.
    NeedCache,
    /// A chunk generate/write failed fatally.
    WriteFailed,
}

pub struct ChunkEngine;

impl ChunkEngine {
    /// Perform at most one chunk of work on `record`. Caller guarantees
    /// `record.pos < record.lines` and that a DAG handle already exists.
    pub fn step(record: &mut EpochRecord) -> ChunkOutcome {
        assert!(record.pos < record.lines, "work_on called on complete epoch");

        let want = LINES_PER_CHUNK.min(record.lines - record.pos);
        let generate =
            record.pos + LINES_PER_CHUNK > record.nominal && record.nominal != record.lines;

        if generate {
            Self::generate_chunk(record, want)
        } else {
            Self::verify_chunk(record, want)
        }
    }

    /// Allocate the chunk buffer if it isn't already present. Kept separate
    /// from the field access below so the allocation step doesn't hold a
    /// whole-record reborrow across the later disjoint-field borrows.
    fn ensure_chunk_buf(record: &mut EpochRecord) {
        if record.chunk.is_none() {
            record.chunk = Some(vec![0u8; LINES_PER_CHUNK as usize * DAG_LINE_BYTES as usize]);
        }
    }

    fn generate_chunk(record: &mut EpochRecord, want: u32) -> ChunkOutcome {
        let cache = match record.cache.cache() {
            Some(cache) => cache.to_vec(),
            None => return ChunkOutcome::NeedCache,
        };
        let kernels = crate::kernels::kernels_for(record.algo);
        let cur_pos = record.pos;
        let chunk_bytes = want as usize * DAG_LINE_BYTES as usize;
        Self::ensure_chunk_buf(record);

        // Borrow `chunk`, `dag_handle`, `pos` and `nominal` as disjoint
        // fields so the chunk-buffer borrow and the handle borrow don't
        // overlap (a method that re-borrows the whole record would conflict
        // at the `pwrite` call below).
        let EpochRecord {
            chunk,
            dag_handle,
            pos,
            nominal,
            ..
        } = record;
        let out = &mut chunk.as_mut().expect("ensured above")[..chunk_bytes];
        kernels.calc_dataset_range(out, cur_pos, want, &cache);

        let wrote = match dag_handle {
            Some(handle) => handle.pwrite(out, cur_pos),
            None => return ChunkOutcome::WriteFailed,
        };
        if let Err(err) = wrote {
            log::warn!("generate chunk write failed: {}", err);
            return ChunkOutcome::WriteFailed;
        }

        *pos += want;
        *nominal = (*nominal).max(*pos);
        ChunkOutcome::Advanced
    }

    fn verify_chunk(record: &mut EpochRecord, want: u32) -> ChunkOutcome {
        let chunk_index = record.pos / LINES_PER_CHUNK;
        let csum_ok = Self::check_checksum(record, chunk_index, want);

        if csum_ok {
            record.pos += want;
            record.nominal = record.nominal.max(record.pos);
        } else {
            // Truncate progress to the enclosing chunk boundary; the next
            // tick re-enters at the Generate path from here (§4.2).
            record.pos -= record.pos % LINES_PER_CHUNK;
            record.nominal = record.pos;
        }
        ChunkOutcome::Advanced
    }

    fn check_checksum(record: &mut EpochRecord, chunk_index: u32, want: u32) -> bool {
        let mut reference = [0u8; CSUM_BYTES];
        let offset = chunk_index as u64 * CSUM_BYTES as u64;
        match &record.csum_handle {
            Some(csum) => {
                if csum.pread(&mut reference, offset).is_err() {
                    return false;
                }
            }
            None => return false,
        }

        let pos = record.pos;
        let chunk_bytes = want as usize * DAG_LINE_BYTES as usize;
        Self::ensure_chunk_buf(record);

        let EpochRecord { chunk, dag_handle, .. } = record;
        let out = &mut chunk.as_mut().expect("ensured above")[..chunk_bytes];
        match dag_handle {
            Some(handle) => {
                if handle.pread(out, pos).is_err() {
                    return false;
                }
            }
            None => return false,
        }

        let digest = Sha3_256::digest(&out[..]);
        digest[..CSUM_BYTES] == reference
    }
}
