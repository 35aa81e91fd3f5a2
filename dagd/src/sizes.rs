//! Derived sizes — pure functions of epoch (spec.md §3 "Derived sizes").
//!
//! Mirrors the standard Ethash cache/dataset growth formulas: both grow
//! linearly with epoch and are then walked down to the nearest size whose
//! quotient by the relevant item width is prime, which keeps dataset
//! lookups from aliasing on short cycles. Grounded on the teacher's
//! `ethash` sub-crate dependency on `primal` for exactly this primality
//! search (see DESIGN.md).

/// A "line" — the fixed unit artifacts and chunks are measured in.
pub const DAG_LINE_BYTES: u64 = 64;

/// 1 MiB worth of lines; the unit of I/O and checksum coverage.
pub const LINES_PER_CHUNK: u32 = (1024 * 1024) / DAG_LINE_BYTES as u32;

/// First 8 bytes of a SHA3-256 digest, truncated, one per chunk.
pub const CSUM_BYTES: usize = 8;

/// Seed hash length.
pub const SEED_BYTES: usize = 32;

/// Intermediate-cache mixing passes (see DESIGN.md Open Questions).
pub const CACHE_ROUNDS: u8 = 3;

pub const EPOCH_MIN: u32 = 8;
pub const EPOCH_MAX: u32 = 1000;

const DATASET_INIT_BYTES: u64 = 1 << 30;
const DATASET_GROWTH_BYTES: u64 = 1 << 23;
const CACHE_INIT_BYTES: u64 = 1 << 24;
const CACHE_GROWTH_BYTES: u64 = 1 << 17;
const MIX_BYTES: u64 = 128;

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    primal::is_prime(n)
}

/// Largest size `<= upper_bound` whose division by `unit` is prime,
/// descending in steps of `2 * unit` from `upper_bound - unit`.
fn prime_adjusted(upper_bound: u64, unit: u64) -> u64 {
    let mut size = upper_bound - unit;
    while !is_prime(size / unit) {
        size -= 2 * unit;
    }
    size
}

/// Intermediate cache size in bytes for `epoch`.
pub fn cache_bytes(epoch: u32) -> u64 {
    let upper = CACHE_INIT_BYTES + CACHE_GROWTH_BYTES * epoch as u64;
    prime_adjusted(upper, DAG_LINE_BYTES)
}

/// Full dataset size in bytes for `epoch`.
fn dataset_bytes(epoch: u32) -> u64 {
    let upper = DATASET_INIT_BYTES + DATASET_GROWTH_BYTES * epoch as u64;
    prime_adjusted(upper, MIX_BYTES)
}

/// Total 64-byte lines in the artifact for `epoch`.
pub fn lines(epoch: u32) -> u32 {
    (dataset_bytes(epoch) / DAG_LINE_BYTES) as u32
}

/// Round `size` up to the next multiple of the filesystem block size.
pub fn round_to_block(size: u64, block_size: u64) -> u64 {
    if block_size == 0 {
        return size;
    }
    (size + block_size - 1) / block_size * block_size
}
