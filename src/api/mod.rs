pub mod device;
pub mod utils;

pub use device::{Device, SharedPort};
pub use utils::{open_serial_port, open_shared_port};
