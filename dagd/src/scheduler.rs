//! Scheduler — one quantum of progress (spec.md §4.5).
//!
//! Grounded on `dagd.c`'s `maybe_work`: a single ordered decision tree, one
//! branch taken and acted on per call, mirrored here as `Scheduler::tick`.

use crate::chunk_engine::{ChunkEngine, ChunkOutcome};
use crate::control::SharedControl;
use crate::registry::EpochRegistry;

pub struct Scheduler;

impl Scheduler {
    /// Perform one quantum of work. Returns `true` iff useful work was done
    /// and the caller should call again promptly; `false` when the daemon
    /// may idle until the next external event.
    pub fn tick(registry: &mut EpochRegistry, control: &SharedControl, just_one: bool) -> bool {
        let (curr_algo, curr_epoch, max_cache) = {
            let state = control.lock();
            match (state.curr_algo, state.curr_epoch) {
                (Some(a), Some(e)) => (a, e, state.max_cache),
                _ => return false,
            }
        };

        // 2. Maybe prepend.
        if let Some(idx) = registry.first_index_for_algo(curr_algo) {
            if registry.records()[idx].num > curr_epoch {
                let record = registry.new_record(curr_algo, curr_epoch);
                registry.append_sorted(record);
                return true;
            }
        }

        // 3. Maybe wipe (only outside one-shot mode).
        if !just_one {
            if let Some(idx) = registry.find_stale(curr_algo, curr_epoch) {
                registry.remove(idx);
                return true;
            }
        }

        // 4. Walk ascending from curr_epoch over this algorithm's records.
        let mut sum = registry.total_size();
        let mut next = curr_epoch;
        for idx in registry.indices_for_algo(curr_algo) {
            let num = registry.records()[idx].num;
            if num < next {
                continue;
            }
            if num > next {
                break;
            }

            if registry.records()[idx].is_complete() {
                registry.get_mut(idx).release_buffers();
                next += 1;
                continue;
            }

            // Growth admission: if this record's growth doesn't fit the
            // budget, evict exactly one successor and return `true` to
            // retry from a clean state next tick (§4.5 step 4); don't loop
            // evicting multiple successors within a single tick.
            if !just_one {
                let rec = &registry.records()[idx];
                let headroom_needed = sum > max_cache || sum + rec.final_size - rec.size > max_cache;
                if headroom_needed {
                    return match registry.successor(idx) {
                        Some(succ) => {
                            registry.remove(succ);
                            true
                        }
                        None => false,
                    };
                }
            }

            if !registry.records()[idx].has_dag_handle() {
                if let Err(err) = registry.get_mut(idx).create_dag() {
                    log::error!("create dag for epoch {}: {}", num, err);
                    return false;
                }
            }

            return match ChunkEngine::step(registry.get_mut(idx)) {
                ChunkOutcome::Advanced => {
                    let block_size = registry.block_size();
                    if let Err(err) = registry.get_mut(idx).refresh_size(block_size) {
                        log::warn!("refresh size for epoch {}: {}", num, err);
                    }
                    true
                }
                ChunkOutcome::NeedCache => {
                    registry.get_mut(idx).cache.step();
                    true
                }
                ChunkOutcome::WriteFailed => false,
            };
        }

        // 5. No in-registry work left at `next` — consider opening a new one.
        if just_one && next != curr_epoch {
            return false;
        }
        let mut sum2 = sum;
        if registry.may_add(curr_algo, next, &mut sum2, max_cache) {
            let record = registry.new_record(curr_algo, next);
            registry.append_sorted(record);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::Algorithm;
    use crate::control::ControlState;
    use crate::templates::PathTemplate;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn shared_control(dag_tmpl: &PathTemplate, algo: Algorithm, epoch: u32) -> SharedControl {
        let mut state = ControlState::new(dag_tmpl.clone(), None);
        state.curr_algo = Some(algo);
        state.curr_epoch = Some(epoch);
        Arc::new(Mutex::new(state))
    }

    #[test]
    fn unset_control_idles_immediately() {
        let dir = tempdir().unwrap();
        let tmpl = PathTemplate::parse(&format!("{}/%s-%u.dag", dir.path().display())).unwrap();
        let mut registry = EpochRegistry::new(tmpl.clone(), None, 4096);
        let state = ControlState::new(tmpl, None);
        let control = Arc::new(Mutex::new(state));
        assert!(!Scheduler::tick(&mut registry, &control, false));
    }

    #[test]
    fn prepend_inserts_record_at_front_when_curr_epoch_is_lower() {
        let dir = tempdir().unwrap();
        let tmpl = PathTemplate::parse(&format!("{}/%s-%u.dag", dir.path().display())).unwrap();
        let mut registry = EpochRegistry::new(tmpl.clone(), None, 4096);
        registry.append_sorted(registry.new_record(Algorithm::EthHash, 500));
        let control = shared_control(&tmpl, Algorithm::EthHash, 450);

        assert!(Scheduler::tick(&mut registry, &control, false));
        assert_eq!(registry.records()[0].num, 450);
    }

    #[test]
    fn wipe_purges_stale_lower_epoch_outside_one_shot() {
        let dir = tempdir().unwrap();
        let tmpl = PathTemplate::parse(&format!("{}/%s-%u.dag", dir.path().display())).unwrap();
        let mut registry = EpochRegistry::new(tmpl.clone(), None, 4096);
        let mut stale = registry.new_record(Algorithm::EthHash, 99);
        stale.create_dag().unwrap();
        let stale_path = stale.path.clone();
        registry.append_sorted(stale);
        registry.append_sorted(registry.new_record(Algorithm::EthHash, 101));
        let control = shared_control(&tmpl, Algorithm::EthHash, 101);

        assert!(Scheduler::tick(&mut registry, &control, false));
        assert!(!stale_path.exists());
        assert_eq!(registry.len(), 1);
    }
}
