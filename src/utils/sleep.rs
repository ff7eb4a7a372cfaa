//! Sleep utilities

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

/// Sleep for up to `total`, waking early once `running` goes false.
///
/// Returns whether the caller should keep going.
pub fn sleep_while_running(total: Duration, running: &AtomicBool) -> bool {
    const STEP: Duration = Duration::from_millis(100);
    let mut remaining = total;
    while !remaining.is_zero() {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let step = remaining.min(STEP);
        std::thread::sleep(step);
        remaining -= step;
    }
    running.load(Ordering::SeqCst)
}
