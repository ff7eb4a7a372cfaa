use anyhow::{ensure, Result};

use rmodbus::client::ModbusRequest;

/// Build a read holding registers request (function 0x03)
pub fn generate_pull_get_holdings_request(
    id: u8,
    start_address: u16,
    count: u16,
) -> Result<(ModbusRequest, Vec<u8>)> {
    let mut request = ModbusRequest::new(id, rmodbus::ModbusProto::Rtu);
    let mut raw = Vec::with_capacity(8);
    request.generate_get_holdings(start_address, count, &mut raw)?;
    Ok((request, raw))
}

pub fn parse_pull_get_holdings(
    request: &mut ModbusRequest,
    response: &[u8],
    count: u16,
) -> Result<Vec<u16>> {
    request.parse_ok(response)?;

    let values = response[3..response.len() - 2]
        .chunks_exact(2)
        .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
        .collect::<Vec<_>>();
    ensure!(
        values.len() == count as usize,
        "Invalid number of holding registers in response"
    );
    log::debug!("Received holding registers: {values:?}");

    Ok(values)
}
