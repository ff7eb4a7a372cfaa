/// Device capability - the field device primitives the controller is built on
///
/// Every call is synchronous and blocks until the device answers or the
/// transport timeout elapses. Implementations own the wire format (RTU framing,
/// CRC, exception decoding); callers only see values or an error.
use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;

/// Serial line shared by every station attached to the same RS-485 bus.
pub type SharedPort = Arc<Mutex<Box<dyn serialport::SerialPort>>>;

/// Atomic primitives exposed by a MODBUS field device.
pub trait Device: Send {
    /// Identifier used in audit logs (station address, mock name, ...).
    fn address(&self) -> String;

    /// Read a block of coils starting at `start` (function code 01).
    fn read_bits(&mut self, start: u16, count: u16) -> Result<Vec<bool>>;

    /// Write a single coil (function code 05).
    fn write_bit(&mut self, address: u16, value: bool) -> Result<()>;

    /// Write a contiguous block of coils starting at `start` (function code 0F).
    fn write_bits(&mut self, start: u16, values: &[bool]) -> Result<()>;

    /// Read a block of holding registers (function code 03).
    fn read_registers(&mut self, start: u16, count: u16) -> Result<Vec<u16>>;

    /// Write a block of holding registers (function code 16).
    fn write_registers(&mut self, start: u16, values: &[u16]) -> Result<()>;
}
