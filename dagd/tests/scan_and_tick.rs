//! Integration test driving a full `EpochRegistry` + `Scheduler` cycle
//! against a temp directory (SPEC_FULL.md "Test tooling"), exercising
//! spec.md §8 scenario 1 (cold start, unlimited budget) and scenario 5
//! (corruption recovery) without any event-bus dependency — `curr_algo`/
//! `curr_epoch` are set directly on `ControlState`.
//!
//! Records are built with a small synthetic `lines` count (rather than the
//! real `sizes::lines(epoch)`, which for any real epoch is large enough to
//! make a from-scratch generation run impractically slow) so the whole
//! cache-build + chunk pipeline runs to completion in milliseconds.

use std::sync::Arc;

use dagd::algo::Algorithm;
use dagd::control::ControlState;
use dagd::registry::EpochRegistry;
use dagd::scheduler::Scheduler;
use dagd::sizes::{round_to_block, DAG_LINE_BYTES, LINES_PER_CHUNK};
use dagd::templates::PathTemplate;
use parking_lot::Mutex;
use sha3::{Digest, Sha3_256};
use tempfile::tempdir;

const TEST_LINES: u32 = 40_000; // a little over two chunks, still milliseconds to build

fn shrink_to_test_size(registry: &mut EpochRegistry, algo: Algorithm, epoch: u32) {
    let idx = registry.find_index(algo, epoch).expect("record present");
    let rec = registry.get_mut(idx);
    rec.lines = TEST_LINES;
    rec.final_size = round_to_block(TEST_LINES as u64 * DAG_LINE_BYTES, registry.block_size());
}

/// Drive the scheduler in single-epoch (`just_one`) mode until idle. Step 5
/// of spec.md §4.5 requires `next == curr_epoch` under `just_one`, so once
/// the current epoch is complete the scheduler stops rather than
/// speculatively opening the next one — which matters here since the next
/// real epoch's un-shrunk size would otherwise make the test run forever.
fn run_to_idle(registry: &mut EpochRegistry, control: &Arc<Mutex<ControlState>>) {
    let mut guard = 0;
    while Scheduler::tick(registry, control, true) {
        guard += 1;
        assert!(guard < 100_000, "scheduler did not converge");
    }
}

#[test]
fn cold_start_unlimited_budget_completes_artifact() {
    let dir = tempdir().unwrap();
    let dag_tmpl = PathTemplate::parse(&format!("{}/%s-%u.dag", dir.path().display())).unwrap();

    let mut registry = EpochRegistry::new(dag_tmpl.clone(), None, 4096);
    let mut control = ControlState::new(dag_tmpl, None);
    control.curr_algo = Some(Algorithm::EthHash);
    control.curr_epoch = Some(100);
    let control = Arc::new(Mutex::new(control));

    // First tick opens the fresh record at (ethash, 100); shrink it before
    // the scheduler starts driving real generation.
    assert!(Scheduler::tick(&mut registry, &control, true));
    shrink_to_test_size(&mut registry, Algorithm::EthHash, 100);

    run_to_idle(&mut registry, &control);

    let idx = registry.find_index(Algorithm::EthHash, 100).unwrap();
    let rec = &registry.records()[idx];
    assert_eq!(rec.pos, TEST_LINES);
    assert_eq!(rec.nominal, TEST_LINES);
    assert!(rec.is_complete());

    let path = dag_tmpl_path(dir.path(), "ethash", 100);
    let bytes = std::fs::metadata(&path).unwrap().len();
    assert_eq!(bytes, TEST_LINES as u64 * DAG_LINE_BYTES);
}

#[test]
fn corruption_at_a_chunk_boundary_triggers_regeneration_of_the_suffix() {
    let dir = tempdir().unwrap();
    let dag_tmpl = PathTemplate::parse(&format!("{}/%s-%u.dag", dir.path().display())).unwrap();
    let csum_tmpl = PathTemplate::parse(&format!("{}/%s-%u.csum", dir.path().display())).unwrap();

    // Build a complete, valid artifact + checksum file first.
    {
        let mut registry = EpochRegistry::new(dag_tmpl.clone(), Some(csum_tmpl.clone()), 4096);
        let mut control = ControlState::new(dag_tmpl.clone(), Some(csum_tmpl.clone()));
        control.curr_algo = Some(Algorithm::EthHash);
        control.curr_epoch = Some(200);
        let control = Arc::new(Mutex::new(control));

        assert!(Scheduler::tick(&mut registry, &control, true));
        shrink_to_test_size(&mut registry, Algorithm::EthHash, 200);
        run_to_idle(&mut registry, &control);

        write_checksum_file(dir.path(), "ethash", 200, &dag_tmpl_path(dir.path(), "ethash", 200));
    }

    // Flip one byte inside chunk 0 and reopen via a fresh registry/scan.
    let dag_path = dag_tmpl_path(dir.path(), "ethash", 200);
    flip_byte(&dag_path, 0);

    let mut registry = EpochRegistry::new(dag_tmpl.clone(), Some(csum_tmpl.clone()), 4096);
    registry.scan();
    shrink_to_test_size(&mut registry, Algorithm::EthHash, 200);
    {
        let idx = registry.find_index(Algorithm::EthHash, 200).unwrap();
        let rec = registry.get_mut(idx);
        // A freshly-scanned record reports `nominal` from the on-disk byte
        // length; pretend the whole (now corrupted) file was previously
        // verified valid, as scenario 5 requires.
        rec.nominal = TEST_LINES;
    }

    let mut control = ControlState::new(dag_tmpl, Some(csum_tmpl));
    control.curr_algo = Some(Algorithm::EthHash);
    control.curr_epoch = Some(200);
    let control = Arc::new(Mutex::new(control));

    run_to_idle(&mut registry, &control);

    let idx = registry.find_index(Algorithm::EthHash, 200).unwrap();
    let rec = &registry.records()[idx];
    assert!(rec.is_complete());

    let bytes = std::fs::read(&dag_path).unwrap();
    assert_eq!(bytes.len() as u64, TEST_LINES as u64 * DAG_LINE_BYTES);

    // The regenerated content must match an independently-computed
    // reference for the same epoch (scenario 5: "byte-identical to the
    // original"), corrupted byte included in the comparison.
    let expected = reference_dataset(Algorithm::EthHash, 200, TEST_LINES);
    assert_eq!(bytes, expected);
}

fn reference_dataset(algo: Algorithm, epoch: u32, lines: u32) -> Vec<u8> {
    use dagd::cache_stage::{CacheStage, StageProgress};
    use dagd::kernels::kernels_for;

    let mut stage = CacheStage::init(algo, epoch);
    while stage.step() != StageProgress::Done {}
    let cache = stage.cache().unwrap();
    let kernels = kernels_for(algo);
    let mut out = vec![0u8; lines as usize * DAG_LINE_BYTES as usize];
    kernels.calc_dataset_range(&mut out, 0, lines, cache);
    out
}

fn dag_tmpl_path(dir: &std::path::Path, algo: &str, epoch: u32) -> std::path::PathBuf {
    dir.join(format!("{}-{}.dag", algo, epoch))
}

fn write_checksum_file(dir: &std::path::Path, algo: &str, epoch: u32, dag_path: &std::path::Path) {
    let content = std::fs::read(dag_path).unwrap();
    let csum_path = dir.join(format!("{}-{}.csum", algo, epoch));
    let mut out = Vec::new();
    let chunk_bytes = LINES_PER_CHUNK as usize * DAG_LINE_BYTES as usize;
    for chunk in content.chunks(chunk_bytes) {
        let digest = Sha3_256::digest(chunk);
        out.extend_from_slice(&digest[..8]);
    }
    std::fs::write(csum_path, out).unwrap();
}

fn flip_byte(path: &std::path::Path, offset: u64) {
    use std::os::unix::fs::FileExt;
    let file = std::fs::OpenOptions::new().write(true).read(true).open(path).unwrap();
    let mut byte = [0u8; 1];
    file.read_exact_at(&mut byte, offset).unwrap();
    byte[0] ^= 0xFF;
    file.write_all_at(&byte, offset).unwrap();
}

