use anyhow::Result;

use rmodbus::client::ModbusRequest;

/// Build a frame to write a block of holding registers (function 0x10)
pub fn generate_pull_set_holdings_request(
    id: u8,
    start_address: u16,
    values: &[u16],
) -> Result<(ModbusRequest, Vec<u8>)> {
    let mut request = ModbusRequest::new(id, rmodbus::ModbusProto::Rtu);
    let mut raw = Vec::new();
    request.generate_set_holdings_bulk(start_address, values, &mut raw)?;
    Ok((request, raw))
}
