use anyhow::{anyhow, Context, Result};
use std::io::{Read, Write};

use super::{parse_modbus_header, RESPONSE_HEADER_LEN};
use crate::api::SharedPort;

fn hex(buf: &[u8]) -> String {
    buf.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Read one complete RTU response frame from the line.
pub fn read_modbus_frame(port: &mut dyn serialport::SerialPort) -> Result<Vec<u8>> {
    let mut header_buf = [0u8; RESPONSE_HEADER_LEN];
    port.read_exact(&mut header_buf)
        .context("No response header received")?;

    let len = parse_modbus_header(header_buf)
        .map_err(|err| anyhow!("Failed to parse Modbus header {}: {err}", hex(&header_buf)))?;
    if len < RESPONSE_HEADER_LEN {
        return Err(anyhow!("Impossible Modbus frame length {len}"));
    }

    let mut full_buf = header_buf.to_vec();
    full_buf.resize(len, 0);
    port.read_exact(&mut full_buf[RESPONSE_HEADER_LEN..])
        .with_context(|| format!("Truncated Modbus response after {}", hex(&header_buf)))?;

    log::debug!("Received Modbus response: {}", hex(&full_buf));
    Ok(full_buf)
}

/// Send one request frame and wait for its response.
///
/// The port stays locked for the whole exchange so stations sharing the line
/// never interleave their frames.
pub fn transact(port: &SharedPort, request: &[u8]) -> Result<Vec<u8>> {
    let mut port = port.lock();

    // Drop stale bytes left behind by an earlier timed-out exchange.
    if let Err(err) = port.clear(serialport::ClearBuffer::Input) {
        log::warn!("Failed to clear serial input buffer: {err}");
    }

    log::debug!("Sending Modbus request: {}", hex(request));
    port.write_all(request)?;
    port.flush()?;

    read_modbus_frame(&mut **port)
}
