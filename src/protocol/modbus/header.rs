use anyhow::Result;

use rmodbus::{guess_response_frame_len, ModbusProto};

/// Bytes that must be on hand before the full RTU response length is known:
/// station id, function code and byte count (or first data byte).
pub const RESPONSE_HEADER_LEN: usize = 3;

/// Work out the total RTU response length (CRC included) from its first bytes.
pub fn parse_modbus_header(header: [u8; RESPONSE_HEADER_LEN]) -> Result<usize> {
    let mut buf = [0u8; 6];
    buf[..RESPONSE_HEADER_LEN].copy_from_slice(&header);
    Ok(guess_response_frame_len(&buf, ModbusProto::Rtu)? as usize)
}
