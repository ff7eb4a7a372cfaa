//! MQTT to MODBUS-RTU gateway
//!
//! Field controllers on a serial line are driven by commands published to an
//! MQTT broker. Each controller keeps a shadow of its coil bank and snapshots
//! of timer register blocks so they can be validated and restored.
//!
//! The `core` module holds the controller, command, invoker and router; the
//! `protocol` module speaks MODBUS-RTU over a serial port; `cli` wires both
//! to the broker and to the bundled test drivers.

pub mod api;
#[doc(hidden)]
pub mod boot;
pub mod cli;
pub mod core;
pub mod protocol;
#[doc(hidden)]
pub mod testing;
pub mod utils;

pub use api::*;
