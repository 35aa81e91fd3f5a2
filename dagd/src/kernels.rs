//! External numeric kernels (spec.md §1 "out of scope"; §9 "Polymorphism
//! over algorithm").
//!
//! `DagKernels` is the capability set `{seedhash, mkcache_init,
//! mkcache_round, calc_dataset_range}` the spec calls out as selected once
//! per algorithm tag. `ReferenceKernels` is a concrete, deterministic
//! implementation built from `tiny-keccak`; it stands in for the real
//! Hashimoto/FNV dataset construction the source delegates to an external
//! library, which is legitimate here because §1 places the numeric kernels
//! out of scope — correctness only requires determinism and agreement
//! between cache construction, dataset generation, and the checksum
//! generator, all three of which share this module.

use tiny_keccak::{Hasher, Keccak};

use crate::algo::Algorithm;
use crate::sizes::DAG_LINE_BYTES;

const DATASET_PARENTS: usize = 256;

fn keccak512(input: &[u8]) -> [u8; 64] {
    let mut hasher = Keccak::v512();
    hasher.update(input);
    let mut out = [0u8; 64];
    hasher.finalize(&mut out);
    out
}

pub trait DagKernels: Send + Sync {
    /// Derive the seed hash for `epoch` (a pure function of epoch alone).
    fn seedhash(&self, epoch: u32) -> [u8; 32];

    /// Allocate and populate the initial intermediate cache.
    fn mkcache_init(&self, cache_bytes: usize, seed: &[u8]) -> Vec<u8>;

    /// Perform one full mixing sweep over the cache, in place.
    fn mkcache_round(&self, cache: &mut [u8]);

    /// Fill `out` (exactly `want_lines * DAG_LINE_BYTES` bytes) with the
    /// dataset content for lines `[start_line, start_line + want_lines)`.
    fn calc_dataset_range(&self, out: &mut [u8], start_line: u32, want_lines: u32, cache: &[u8]);
}

/// The shared (non-ubqhash) kernel tuple.
pub struct CommonKernels;

/// The ubqhash variant (§4.1 step 2/3: "A₂ uses the ubqhash variant").
/// Differs from `CommonKernels` only in a mixing-domain tweak, matching the
/// source's pairing of `mkcache_init`/`mkcache_init_ubqhash` and
/// `mkcache_round`/`mkcache_round_ubqhash`.
pub struct UbqhashKernels;

fn seedhash_common(epoch: u32) -> [u8; 32] {
    let mut seed = [0u8; 32];
    for _ in 0..epoch {
        let digest = keccak512(&seed);
        seed.copy_from_slice(&digest[..32]);
    }
    seed
}

fn mkcache_init_common(cache_bytes: usize, seed: &[u8], domain: u8) -> Vec<u8> {
    let n_items = cache_bytes / DAG_LINE_BYTES as usize;
    let mut cache = vec![0u8; n_items * DAG_LINE_BYTES as usize];
    let mut prev = {
        let mut buf = Vec::with_capacity(seed.len() + 1);
        buf.extend_from_slice(seed);
        buf.push(domain);
        keccak512(&buf)
    };
    cache[0..64].copy_from_slice(&prev);
    for i in 1..n_items {
        prev = keccak512(&prev);
        cache[i * 64..i * 64 + 64].copy_from_slice(&prev);
    }
    cache
}

fn mkcache_round_common(cache: &mut [u8], domain: u8) {
    let n_items = cache.len() / 64;
    if n_items == 0 {
        return;
    }
    let snapshot = cache.to_vec();
    for i in 0..n_items {
        let cur = &snapshot[i * 64..i * 64 + 64];
        let v = (u32::from_le_bytes([cur[0], cur[1], cur[2], cur[3]]) as usize) % n_items;
        let prev_idx = (i + n_items - 1) % n_items;

        let mut mixed = [0u8; 64];
        let a = &snapshot[prev_idx * 64..prev_idx * 64 + 64];
        let b = &snapshot[v * 64..v * 64 + 64];
        for j in 0..64 {
            mixed[j] = a[j] ^ b[j];
        }
        mixed[0] ^= domain;
        let digest = keccak512(&mixed);
        cache[i * 64..i * 64 + 64].copy_from_slice(&digest);
    }
}

fn calc_dataset_range_common(
    out: &mut [u8],
    start_line: u32,
    want_lines: u32,
    cache: &[u8],
    domain: u8,
) {
    let n_items = cache.len() / 64;
    assert!(n_items > 0, "cache must be non-empty");
    for line in 0..want_lines {
        let index = start_line + line;
        let mut mix = {
            let base = &cache[(index as usize % n_items) * 64..][..64];
            let mut seed = [0u8; 68];
            seed[..64].copy_from_slice(base);
            seed[64..].copy_from_slice(&index.to_le_bytes());
            keccak512(&seed)
        };
        for parent in 0..DATASET_PARENTS {
            let fnv = (u32::from_le_bytes([mix[0], mix[1], mix[2], mix[3]]) as usize)
                ^ (index as usize)
                ^ parent
                ^ domain as usize;
            let parent_idx = fnv % n_items;
            let parent_item = &cache[parent_idx * 64..parent_idx * 64 + 64];
            for j in 0..64 {
                mix[j] ^= parent_item[j];
            }
        }
        let digest = keccak512(&mix);
        let dst = &mut out[(line as usize) * 64..(line as usize) * 64 + 64];
        dst.copy_from_slice(&digest);
    }
}

impl DagKernels for CommonKernels {
    fn seedhash(&self, epoch: u32) -> [u8; 32] {
        seedhash_common(epoch)
    }

    fn mkcache_init(&self, cache_bytes: usize, seed: &[u8]) -> Vec<u8> {
        mkcache_init_common(cache_bytes, seed, 0)
    }

    fn mkcache_round(&self, cache: &mut [u8]) {
        mkcache_round_common(cache, 0)
    }

    fn calc_dataset_range(&self, out: &mut [u8], start_line: u32, want_lines: u32, cache: &[u8]) {
        calc_dataset_range_common(out, start_line, want_lines, cache, 0)
    }
}

impl DagKernels for UbqhashKernels {
    fn seedhash(&self, epoch: u32) -> [u8; 32] {
        seedhash_common(epoch)
    }

    fn mkcache_init(&self, cache_bytes: usize, seed: &[u8]) -> Vec<u8> {
        mkcache_init_common(cache_bytes, seed, 1)
    }

    fn mkcache_round(&self, cache: &mut [u8]) {
        mkcache_round_common(cache, 1)
    }

    fn calc_dataset_range(&self, out: &mut [u8], start_line: u32, want_lines: u32, cache: &[u8]) {
        calc_dataset_range_common(out, start_line, want_lines, cache, 1)
    }
}

/// Select the kernel tuple for `algo` (§9: selected once at `CacheStage::init`).
pub fn kernels_for(algo: Algorithm) -> Box<dyn DagKernels> {
    if algo.uses_ubqhash_kernels() {
        Box::new(UbqhashKernels)
    } else {
        Box::new(CommonKernels)
    }
}
