//! Standalone checksum generator (spec.md §6 "Standalone checksum generator").
//!
//! For a given `(algorithm, epoch)`: build the intermediate cache in one
//! shot, then for each chunk in order emit the first `CSUM_BYTES` of
//! SHA3-256 of the chunk's dataset content. Out of the daemon's core per
//! §1; exposed as `dagd -g <epoch>`.

use std::io::Write;

use sha3::{Digest, Sha3_256};

use crate::algo::Algorithm;
use crate::cache_stage::{CacheStage, StageProgress};
use crate::kernels::kernels_for;
use crate::sizes::{lines, CSUM_BYTES, DAG_LINE_BYTES, LINES_PER_CHUNK};

/// Write the checksum stream for `(algo, epoch)` to `out`, one `CSUM_BYTES`
/// record per chunk, in order.
pub fn generate_checksums<W: Write>(algo: Algorithm, epoch: u32, out: &mut W) -> std::io::Result<()> {
    let mut stage = CacheStage::init(algo, epoch);
    while stage.step() != StageProgress::Done {}
    let cache = stage.cache().expect("cache stage reported Done");

    let kernels = kernels_for(algo);
    let total_lines = lines(epoch);
    let mut chunk_buf = vec![0u8; LINES_PER_CHUNK as usize * DAG_LINE_BYTES as usize];

    let mut pos = 0u32;
    while pos < total_lines {
        let want = LINES_PER_CHUNK.min(total_lines - pos);
        let chunk_bytes = want as usize * DAG_LINE_BYTES as usize;
        let buf = &mut chunk_buf[..chunk_bytes];
        kernels.calc_dataset_range(buf, pos, want, cache);

        let digest = Sha3_256::digest(&buf[..]);
        out.write_all(&digest[..CSUM_BYTES])?;

        pos += want;
    }
    Ok(())
}
