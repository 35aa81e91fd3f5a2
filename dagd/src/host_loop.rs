//! Host loop (spec.md §4.7): alternates Scheduler ticks with EventIngress
//! polls and emits periodic status.
//!
//! Grounded on `dagd.c`'s `main` loop.

use std::time::{Duration, Instant};

use crate::control::SharedControl;
use crate::event_ingress::EventIngress;
use crate::mqtt_bus::MqttBus;
use crate::registry::EpochRegistry;
use crate::scheduler::Scheduler;

/// Bound on the blocking event-bus poll during idle periods (§5).
pub const POLL_WAIT_MS: u64 = 200;

/// Status publication is rate-limited to this cadence unless flushed (§5).
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

pub struct HostLoop {
    registry: EpochRegistry,
    control: SharedControl,
    bus: Option<MqttBus>,
    last_status: Option<Instant>,
    publish_status_in_one_shot: bool,
}

impl HostLoop {
    pub fn new(registry: EpochRegistry, control: SharedControl, bus: Option<MqttBus>) -> Self {
        HostLoop {
            registry,
            control,
            bus,
            last_status: None,
            publish_status_in_one_shot: false,
        }
    }

    pub fn enable_one_shot_status(&mut self) {
        self.publish_status_in_one_shot = true;
    }

    fn drain_one_event(&mut self, blocking: bool) {
        let Some(bus) = &self.bus else { return };
        let msg = if blocking {
            bus.recv_timeout(Duration::from_millis(POLL_WAIT_MS))
        } else {
            bus.try_recv()
        };
        if let Some(msg) = msg {
            EventIngress::dispatch(&self.control, &msg.topic, &msg.payload);
        }
    }

    fn maybe_publish_status(&mut self, force: bool) {
        let Some(bus) = &self.bus else { return };
        let due = force
            || self
                .last_status
                .map(|t| t.elapsed() >= STATUS_INTERVAL)
                .unwrap_or(true);
        if !due {
            return;
        }
        bus.publish_status(&self.registry.report());
        self.last_status = Some(Instant::now());
    }

    /// Continuous service mode (§4.7 pseudo-contract).
    pub fn run_loop(&mut self) {
        loop {
            if self.control.lock().shutdown_pending {
                break;
            }
            self.registry.scan();
            self.initialize_defaults_from_registry();

            let mut idle = false;
            loop {
                if self.control.lock().shutdown_pending {
                    break;
                }
                let holding = self.control.lock().hold;
                if holding || idle {
                    let before = {
                        let state = self.control.lock();
                        (state.curr_algo, state.curr_epoch)
                    };
                    self.drain_one_event(true);
                    let after = {
                        let state = self.control.lock();
                        (state.curr_algo, state.curr_epoch)
                    };
                    if before != after {
                        idle = false;
                    }
                } else {
                    let progressed = Scheduler::tick(&mut self.registry, &self.control, false);
                    idle = !progressed;
                    self.maybe_publish_status(false);
                    self.drain_one_event(false);
                }
            }
        }
        self.shutdown();
    }

    /// One-shot mode: ticks until no more work remains, without rescanning.
    ///
    /// `just_one` distinguishes `-1` (run to exhaustion against the real
    /// budget/admission policy) from `-1 -1` (additionally skip
    /// `maybe_wipe` and speculative growth — SPEC_FULL.md "One-shot mode
    /// nuances"), by forwarding directly to [`Scheduler::tick`]'s own
    /// `just_one` parameter.
    pub fn run_one_shot(&mut self, just_one: bool) {
        self.registry.scan();
        self.initialize_defaults_from_registry();
        loop {
            if self.control.lock().shutdown_pending {
                break;
            }
            if !Scheduler::tick(&mut self.registry, &self.control, just_one) {
                break;
            }
            if self.publish_status_in_one_shot {
                self.maybe_publish_status(false);
            }
        }
        if self.publish_status_in_one_shot {
            self.maybe_publish_status(true);
        }
        self.shutdown();
    }

    fn initialize_defaults_from_registry(&mut self) {
        let mut state = self.control.lock();
        if state.curr_algo.is_none() || state.curr_epoch.is_none() {
            if let Some(first) = self.registry.records().first() {
                state.curr_algo.get_or_insert(first.algo);
                state.curr_epoch.get_or_insert(first.num);
            }
        }
    }

    fn shutdown(&mut self) {
        log::info!("shutting down, {} epoch(s) tracked", self.registry.len());
    }
}
