//! EpochRegistry — ordered set of EpochRecords plus eviction (spec.md §4.4).
//!
//! Grounded on `epoch.c`'s intrusive singly-linked list; per §9 "Linked list
//! of records" the underlying requirement is ordered traversal, ordered
//! insertion, and mid-sequence removal, which a `Vec` kept sorted by
//! ascending `num` satisfies adequately at the registry's expected size
//! (a few dozen entries).

use crate::algo::Algorithm;
use crate::epoch_record::EpochRecord;
use crate::sizes::{lines, round_to_block, DAG_LINE_BYTES, EPOCH_MAX, EPOCH_MIN};
use crate::templates::PathTemplate;

pub struct EpochRegistry {
    records: Vec<EpochRecord>,
    dag_template: PathTemplate,
    csum_template: Option<PathTemplate>,
    block_size: u64,
}

impl EpochRegistry {
    pub fn new(dag_template: PathTemplate, csum_template: Option<PathTemplate>, block_size: u64) -> Self {
        EpochRegistry {
            records: Vec::new(),
            dag_template,
            csum_template,
            block_size,
        }
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut EpochRecord {
        &mut self.records[idx]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.records.iter().map(|r| r.size).sum()
    }

    /// Construct a fresh, empty-progress record for `(algo, num)`, sharing
    /// this registry's templates and block size.
    pub fn new_record(&self, algo: Algorithm, num: u32) -> EpochRecord {
        EpochRecord::new(algo, num, &self.dag_template, self.block_size)
    }

    /// `scan`: for every algorithm x every epoch in range, attempt to open
    /// an on-disk artifact and append it. Already-known pairs are skipped so
    /// repeated scans (the outer host-loop iteration) are idempotent.
    pub fn scan(&mut self) {
        for algo in Algorithm::ALL {
            for epoch in EPOCH_MIN..=EPOCH_MAX {
                if self.find_index(algo, epoch).is_some() {
                    continue;
                }
                if let Some(record) = EpochRecord::open(
                    algo,
                    epoch,
                    &self.dag_template,
                    self.csum_template.as_ref(),
                    self.block_size,
                ) {
                    self.append_sorted(record);
                }
            }
        }
    }

    /// Insert maintaining ascending order by `num`; ties preserve insertion
    /// order (§4.4).
    pub fn append_sorted(&mut self, record: EpochRecord) {
        let pos = self.records.partition_point(|r| r.num <= record.num);
        self.records.insert(pos, record);
    }

    pub fn find_index(&self, algo: Algorithm, num: u32) -> Option<usize> {
        self.records.iter().position(|r| r.algo == algo && r.num == num)
    }

    pub fn first_index_for_algo(&self, algo: Algorithm) -> Option<usize> {
        self.records.iter().position(|r| r.algo == algo)
    }

    /// Ascending indices of records matching `algo` (registry order is
    /// globally ascending by `num`, so this is ascending too).
    pub fn indices_for_algo(&self, algo: Algorithm) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.algo == algo)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// First record with `algo = curr_algo` and `num < curr_epoch` (§4.5
    /// "Maybe wipe" — purges stale lower epochs).
    pub fn find_stale(&self, algo: Algorithm, curr_epoch: u32) -> Option<usize> {
        self.records.iter().position(|r| r.algo == algo && r.num < curr_epoch)
    }

    /// The next record after `idx` in registry order, if any (the eviction
    /// target for growth admission, §4.5).
    pub fn successor(&self, idx: usize) -> Option<usize> {
        if idx + 1 < self.records.len() {
            Some(idx + 1)
        } else {
            None
        }
    }

    /// Excise the record at `idx`, wiping its on-disk file, and return the
    /// recomputed running sum of remaining records' sizes.
    pub fn remove(&mut self, idx: usize) -> u64 {
        let mut record = self.records.remove(idx);
        record.wipe();
        self.total_size()
    }

    /// Semicolon-separated status string, one entry per record (§4.4).
    pub fn report(&self) -> String {
        self.records
            .iter()
            .map(|r| {
                format!(
                    "{},{},{},{},{},{},{}",
                    r.algo.name(),
                    r.num,
                    r.pos,
                    r.nominal,
                    r.lines,
                    r.cache.round(),
                    crate::sizes::CACHE_ROUNDS,
                )
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    /// `may_add`: make room, by eviction, for a candidate `(algo, epoch)`
    /// under `max_cache`, updating `current_sum` in place. Returns whether
    /// room was made (or was already available).
    pub fn may_add(&mut self, algo: Algorithm, epoch: u32, current_sum: &mut u64, max_cache: u64) -> bool {
        let cand_size = round_to_block(lines(epoch) as u64 * DAG_LINE_BYTES, self.block_size);
        while *current_sum >= max_cache || *current_sum + cand_size >= max_cache {
            if self.records.is_empty() {
                return false;
            }
            let victim_idx = match self.pick_victim(algo) {
                Some(idx) => idx,
                None => return false,
            };
            let victim = &self.records[victim_idx];
            if victim.algo == algo && victim.num <= epoch {
                return false;
            }
            *current_sum = self.remove(victim_idx);
        }
        true
    }

    /// The first foreign-algorithm record (lowest epoch, since the registry
    /// is ascending) if one exists, else the highest-epoch same-algorithm
    /// record. Matches `epoch.c::may_add`'s list walk, which breaks at the
    /// *first* (lowest-epoch) foreign record it finds (spec.md scenario 3).
    fn pick_victim(&self, algo: Algorithm) -> Option<usize> {
        let foreign = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.algo != algo)
            .min_by_key(|(_, r)| r.num);
        if let Some((idx, _)) = foreign {
            return Some(idx);
        }
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.algo == algo)
            .max_by_key(|(_, r)| r.num)
            .map(|(idx, _)| idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn registry(dir: &std::path::Path) -> EpochRegistry {
        let dag = PathTemplate::parse(&format!("{}/%s-%u.dag", dir.display())).unwrap();
        EpochRegistry::new(dag, None, 4096)
    }

    #[test]
    fn append_sorted_maintains_ascending_order() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        reg.append_sorted(reg.new_record(Algorithm::EthHash, 100));
        reg.append_sorted(reg.new_record(Algorithm::EthHash, 50));
        reg.append_sorted(reg.new_record(Algorithm::EthHash, 75));
        let nums: Vec<u32> = reg.records().iter().map(|r| r.num).collect();
        assert_eq!(nums, vec![50, 75, 100]);
    }

    #[test]
    fn remove_wipes_file_and_recomputes_sum() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let mut record = reg.new_record(Algorithm::EthHash, 8);
        record.create_dag().unwrap();
        record.size = 4096;
        let path = record.path.clone();
        reg.append_sorted(record);
        assert!(path.exists());
        let sum = reg.remove(0);
        assert_eq!(sum, 0);
        assert!(!path.exists());
    }

    #[test]
    fn may_add_rejects_when_victim_is_same_algo_and_not_more_current() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let mut record = reg.new_record(Algorithm::EthHash, 200);
        record.size = 1000;
        reg.append_sorted(record);
        let cand_size = round_to_block(lines(300) as u64 * DAG_LINE_BYTES, 4096);
        let mut sum = 1000u64;
        let max_cache = cand_size + 500;
        assert!(!reg.may_add(Algorithm::EthHash, 300, &mut sum, max_cache));
    }

    #[test]
    fn may_add_evicts_foreign_algorithm_first() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let mut foreign = reg.new_record(Algorithm::EtcHash, 50);
        foreign.create_dag().unwrap();
        foreign.size = 1000;
        reg.append_sorted(foreign);
        let cand_size = round_to_block(lines(300) as u64 * DAG_LINE_BYTES, 4096);
        let mut sum = 1000u64;
        let max_cache = cand_size + 500;
        assert!(reg.may_add(Algorithm::EthHash, 300, &mut sum, max_cache));
        assert_eq!(sum, 0);
        assert!(reg.is_empty());
    }

    #[test]
    fn may_add_evicts_lowest_epoch_foreign_record_first() {
        // spec.md scenario 3: {A0:390, A0:391} on disk, candidate A1:391 ->
        // the *lower*-epoch foreign record (A0:390) is evicted first.
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let mut low = reg.new_record(Algorithm::EthHash, 390);
        low.create_dag().unwrap();
        low.size = 1000;
        let low_path = low.path.clone();
        reg.append_sorted(low);
        let mut high = reg.new_record(Algorithm::EthHash, 391);
        high.create_dag().unwrap();
        high.size = 1000;
        let high_path = high.path.clone();
        reg.append_sorted(high);

        let cand_size = round_to_block(lines(391) as u64 * DAG_LINE_BYTES, 4096);
        let mut sum = 2000u64;
        let max_cache = 2000 + cand_size - 500;
        assert!(reg.may_add(Algorithm::EtcHash, 391, &mut sum, max_cache));
        assert!(!low_path.exists());
        assert!(high_path.exists());
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.records()[0].num, 391);
    }

    #[test]
    fn report_formats_one_entry_per_record() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        reg.append_sorted(reg.new_record(Algorithm::EthHash, 8));
        let report = reg.report();
        assert!(report.starts_with("ethash,8,0,0,"));
    }
}
