//! Shared utilities

pub mod coils;
pub mod sleep;

pub use coils::{all_coils, gen_coillist};
pub use sleep::sleep_while_running;
