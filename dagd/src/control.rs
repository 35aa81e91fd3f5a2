//! Process-wide control state (spec.md §3 "Control state"; §9 "Process-wide
//! control state").
//!
//! The source keeps these as globals shared between the event handler and
//! the scheduler, both on one logical thread. Grounded on the teacher's use
//! of `parking_lot::Mutex` to guard state shared across collaborators; here
//! the bus I/O thread only ever forwards raw messages, never touches this
//! state directly, but the mutex is kept for the same reason the teacher
//! keeps one around its own shared config/control records.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::algo::Algorithm;
use crate::templates::PathTemplate;

/// Sentinel for an unbounded cache budget.
pub const NO_BUDGET: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, Default)]
struct SlotState {
    running: bool,
    dag_frac: Option<f64>,
    algo_frac: Option<f64>,
}

impl SlotState {
    fn uploading(&self) -> bool {
        let between = |f: Option<f64>| matches!(f, Some(x) if x > 0.0 && x < 1.0);
        between(self.dag_frac) || between(self.algo_frac)
    }
}

pub struct ControlState {
    pub shutdown_pending: bool,
    pub hold: bool,
    pub curr_algo: Option<Algorithm>,
    pub curr_epoch: Option<u32>,
    pub alt_epoch: Option<u32>,
    pub max_cache: u64,
    pub dag_path_template: PathTemplate,
    pub csum_path_template: Option<PathTemplate>,
    pub etchash_activation_epoch: u32,
    slots: [SlotState; 2],
}

impl ControlState {
    pub fn new(dag_path_template: PathTemplate, csum_path_template: Option<PathTemplate>) -> Self {
        ControlState {
            shutdown_pending: false,
            hold: false,
            curr_algo: None,
            curr_epoch: None,
            alt_epoch: None,
            max_cache: NO_BUDGET,
            dag_path_template,
            csum_path_template,
            etchash_activation_epoch: 390,
            slots: [SlotState::default(); 2],
        }
    }

    /// Update a slot's `D:`/`A:` transfer fractions and recompute `hold`
    /// (§4.6). A `None` fraction leaves that component unchanged.
    pub fn set_slot_state(&mut self, slot: usize, dag_frac: Option<f64>, algo_frac: Option<f64>) {
        if slot >= self.slots.len() {
            return;
        }
        if let Some(f) = dag_frac {
            self.slots[slot].dag_frac = Some(f);
        }
        if let Some(f) = algo_frac {
            self.slots[slot].algo_frac = Some(f);
        }
        self.recompute_hold();
    }

    /// Update a slot's running flag. `slot = None` is the wildcard topic
    /// that updates both slots at once.
    pub fn set_running(&mut self, slot: Option<usize>, running: bool) {
        match slot {
            Some(s) if s < self.slots.len() => self.slots[s].running = running,
            Some(_) => {}
            None => {
                for s in &mut self.slots {
                    s.running = running;
                }
            }
        }
        self.recompute_hold();
    }

    fn recompute_hold(&mut self) {
        self.hold = self.slots.iter().any(|s| s.running && s.uploading());
    }
}

pub type SharedControl = Arc<Mutex<ControlState>>;
