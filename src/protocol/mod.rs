pub mod modbus;
pub mod rtu;

pub use rtu::RtuDevice;
