use anyhow::Result;

use rmodbus::client::ModbusRequest;

/// Build a frame to force a contiguous block of coils (function 0x0F)
pub fn generate_pull_set_coils_request(
    id: u8,
    start_address: u16,
    coils: &[bool],
) -> Result<(ModbusRequest, Vec<u8>)> {
    let mut request = ModbusRequest::new(id, rmodbus::ModbusProto::Rtu);
    let mut raw = Vec::new();
    request.generate_set_coils_bulk(start_address, coils, &mut raw)?;
    Ok((request, raw))
}

/// Check a write acknowledgement (FC05, FC0F and FC10 all echo the request header).
pub fn parse_pull_set_ack(request: &mut ModbusRequest, response: &[u8]) -> Result<()> {
    request.parse_ok(response)?;

    Ok(())
}
