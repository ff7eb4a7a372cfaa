use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

use super::device::SharedPort;

/// Open a serial port with the requested timeout, enabling exclusive access on Unix systems.
pub fn open_serial_port(
    port: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<Box<dyn serialport::SerialPort>> {
    let builder = serialport::new(port, baud_rate).timeout(timeout);

    #[cfg(unix)]
    {
        let mut handle = builder
            .open_native()
            .map_err(|err| anyhow!("Failed to open port {port}: {err}"))?;
        handle
            .set_exclusive(true)
            .map_err(|err| anyhow!("Failed to acquire exclusive access to {port}: {err}"))?;
        Ok(Box::new(handle))
    }

    #[cfg(not(unix))]
    {
        builder
            .open()
            .map_err(|err| anyhow!("Failed to open port {port}: {err}"))
    }
}

/// Open a serial port and wrap it so several stations on the same line can share it.
pub fn open_shared_port(port: &str, baud_rate: u32, timeout: Duration) -> Result<SharedPort> {
    log::info!("Opening serial port {port} at {baud_rate} baud");
    let handle = open_serial_port(port, baud_rate, timeout)?;
    Ok(Arc::new(Mutex::new(handle)))
}
