//! EventIngress — external control (spec.md §4.6).
//!
//! Grounded on `dagd.c`'s MQTT callback, which switches on topic suffix and
//! mutates the same global control variables the scheduler reads.

use std::str::FromStr;

use crate::algo::Algorithm;
use crate::control::SharedControl;

pub struct EventIngress;

impl EventIngress {
    /// Route a raw `(topic, payload)` pair to the matching handler.
    pub fn dispatch(control: &SharedControl, topic: &str, payload: &str) {
        let segments: Vec<&str> = topic.trim_start_matches('/').split('/').collect();
        match segments.as_slice() {
            ["mine", "epoch"] => Self::process_epoch(control, payload),
            ["mine", _slot, "epoch"] => Self::process_epoch(control, payload),
            ["sys", "shutdown"] => Self::process_shutdown(control, payload),
            ["mine", slot, "state"] => {
                if let Ok(idx) = slot.parse::<usize>() {
                    Self::process_slot_state(control, idx, payload);
                }
            }
            ["mine", "running"] => Self::process_running(control, None, payload),
            ["mine", slot, "running"] => {
                if let Ok(idx) = slot.parse::<usize>() {
                    Self::process_running(control, Some(idx), payload);
                }
            }
            _ => log::debug!("unhandled bus topic {:?}", topic),
        }
    }

    /// `/mine/epoch`, `/mine/<slot>/epoch` — payload `"<n>[ <algo>]"`.
    pub fn process_epoch(control: &SharedControl, payload: &str) {
        let mut parts = payload.split_whitespace();
        let n: u32 = match parts.next().and_then(|s| s.parse().ok()) {
            Some(n) => n,
            None => {
                log::warn!("malformed epoch announcement: {:?}", payload);
                return;
            }
        };
        let algo = match parts.next() {
            Some(name) => match Algorithm::from_str(name) {
                Ok(a) => a,
                Err(_) => {
                    log::warn!("malformed epoch announcement: {:?}", payload);
                    return;
                }
            },
            None => Algorithm::default(),
        };

        let mut state = control.lock();
        if state.alt_epoch == Some(n) {
            return;
        }
        if state.curr_algo != Some(algo) || state.curr_epoch != Some(n) {
            state.curr_algo = Some(algo);
            state.curr_epoch = Some(n);
        }
    }

    /// `/sys/shutdown` — payload `"0"` / `"1"`.
    pub fn process_shutdown(control: &SharedControl, payload: &str) {
        match payload.trim() {
            "1" => control.lock().shutdown_pending = true,
            "0" => control.lock().shutdown_pending = false,
            other => log::warn!("malformed shutdown payload: {:?}", other),
        }
    }

    /// `/mine/<slot>/state` — free-form tokens; `D:<f>`/`A:<f>` meaningful.
    pub fn process_slot_state(control: &SharedControl, slot: usize, payload: &str) {
        let mut dag_frac = None;
        let mut algo_frac = None;
        for token in payload.split_whitespace() {
            if let Some(rest) = token.strip_prefix("D:") {
                dag_frac = rest.parse().ok();
            } else if let Some(rest) = token.strip_prefix("A:") {
                algo_frac = rest.parse().ok();
            }
        }
        control.lock().set_slot_state(slot, dag_frac, algo_frac);
    }

    /// `/mine/running`, `/mine/<slot>/running`. `slot = None` is wildcard.
    pub fn process_running(control: &SharedControl, slot: Option<usize>, payload: &str) {
        match payload.trim() {
            "1" => control.lock().set_running(slot, true),
            "0" => control.lock().set_running(slot, false),
            other => log::warn!("malformed running payload: {:?}", other),
        }
    }
}
