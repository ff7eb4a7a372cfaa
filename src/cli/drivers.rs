/// Test drivers that sequence commands against one device.
///
/// They go through the same invoker/command path as MQTT traffic; only the
/// producer differs.
use std::{sync::atomic::AtomicBool, time::Duration};

use crate::{
    core::{Command, Invoker, Outcome, Report, SharedController, TimerBlock, Validation},
    utils::{all_coils, gen_coillist, sleep_while_running},
};

/// Timer presets for T1..T4 (off preset, on preset, resolution, mode 10).
pub const TIMER_PRESETS: [(u16, TimerBlock); 4] = [
    (0, [20, 0, 0, 10]),
    (4, [15, 0, 0, 10]),
    (8, [10, 0, 0, 10]),
    (12, [5, 0, 0, 10]),
];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub rounds: u32,
    pub consistent: u32,
    pub diverged: u32,
    pub unknown: u32,
    pub failed_writes: u32,
}

impl CycleSummary {
    fn record(&mut self, reports: &[Report]) {
        for report in reports {
            match &report.outcome {
                Outcome::Validated(Validation::Consistent { .. }) => self.consistent += 1,
                Outcome::Validated(Validation::Diverged { .. }) => self.diverged += 1,
                Outcome::Validated(Validation::Unknown { .. }) => self.unknown += 1,
                Outcome::Failed(_) => self.failed_writes += 1,
                _ => {}
            }
        }
    }
}

/// Switch everything off, then alternate random "on" and "off" selections,
/// validating after each. `rounds == 0` keeps going until `running` clears.
pub fn coil_cycle(
    invoker: &Invoker,
    plc: &SharedController,
    delay: Duration,
    rounds: u32,
    running: &AtomicBool,
) -> CycleSummary {
    let num_coils = plc.lock().num_coils();
    let mut rng = rand::rng();
    let mut summary = CycleSummary::default();

    log::info!("Turning off all coils {:?}", all_coils(num_coils));
    invoker.enqueue(Command::coils_off(Some(plc.clone()), all_coils(num_coils)));
    summary.record(&invoker.drain());
    if !sleep_while_running(delay, running) {
        return summary;
    }

    while rounds == 0 || summary.rounds < rounds {
        for on in [true, false] {
            let coils = gen_coillist(&mut rng, num_coils);
            let target = Some(plc.clone());
            if on {
                log::info!("Turning on random coil(s) {coils:?}");
                invoker.enqueue(Command::coils_on(target, coils));
            } else {
                log::info!("Turning off random coil(s) {coils:?}");
                invoker.enqueue(Command::coils_off(target, coils));
            }
            log::info!("Test coil status");
            invoker.enqueue(Command::validate(Some(plc.clone())));
            summary.record(&invoker.drain());

            if !sleep_while_running(delay, running) {
                return summary;
            }
        }
        summary.rounds += 1;
    }

    summary
}

/// Program T1..T4 with [`TIMER_PRESETS`], optionally restoring them afterwards.
pub fn timer_program(invoker: &Invoker, plc: &SharedController, reset: bool) -> Vec<Report> {
    log::info!("Set timers T1, T2, T3, T4 in mode 10");
    for (start_address, values) in TIMER_PRESETS {
        invoker.enqueue(Command::timer_set(Some(plc.clone()), start_address, values));
    }
    if reset {
        log::info!("Restore timers T1, T2, T3, T4");
        invoker.enqueue(Command::reset_timers(Some(plc.clone())));
    }
    invoker.drain()
}

/// Run a single validate round.
pub fn validate_once(invoker: &Invoker, plc: &SharedController) -> Validation {
    invoker.enqueue(Command::validate(Some(plc.clone())));
    invoker
        .drain()
        .into_iter()
        .find_map(|report| match report.outcome {
            Outcome::Validated(result) => Some(result),
            _ => None,
        })
        .unwrap_or(Validation::Unknown {
            reason: "validate did not run".to_string(),
        })
}
