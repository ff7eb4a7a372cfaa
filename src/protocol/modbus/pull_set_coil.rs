use anyhow::Result;

use rmodbus::client::ModbusRequest;

/// Build a frame to force a single coil (function 0x05)
pub fn generate_pull_set_coil_request(
    id: u8,
    address: u16,
    value: bool,
) -> Result<(ModbusRequest, Vec<u8>)> {
    let mut request = ModbusRequest::new(id, rmodbus::ModbusProto::Rtu);
    let mut raw = Vec::with_capacity(8);
    request.generate_set_coil(address, value, &mut raw)?;
    Ok((request, raw))
}
