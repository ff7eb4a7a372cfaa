use anyhow::{Context, Result};

use super::modbus::{
    generate_pull_get_coils_request, generate_pull_get_holdings_request,
    generate_pull_set_coil_request, generate_pull_set_coils_request,
    generate_pull_set_holdings_request, parse_pull_get_coils, parse_pull_get_holdings,
    parse_pull_set_ack, transact,
};
use crate::api::{Device, SharedPort};

/// A MODBUS RTU station reached over a (possibly shared) serial line.
pub struct RtuDevice {
    port: SharedPort,
    port_name: String,
    station_id: u8,
}

impl RtuDevice {
    pub fn new(port: SharedPort, port_name: impl Into<String>, station_id: u8) -> Self {
        Self {
            port,
            port_name: port_name.into(),
            station_id,
        }
    }

    pub fn station_id(&self) -> u8 {
        self.station_id
    }
}

impl Device for RtuDevice {
    fn address(&self) -> String {
        format!("{}@{}", self.station_id, self.port_name)
    }

    fn read_bits(&mut self, start: u16, count: u16) -> Result<Vec<bool>> {
        let (mut request, raw) = generate_pull_get_coils_request(self.station_id, start, count)?;
        let response = transact(&self.port, &raw)
            .with_context(|| format!("FC01 read of {count} coils at {start} failed"))?;
        parse_pull_get_coils(&mut request, &response, count)
    }

    fn write_bit(&mut self, address: u16, value: bool) -> Result<()> {
        let (mut request, raw) = generate_pull_set_coil_request(self.station_id, address, value)?;
        let response = transact(&self.port, &raw)
            .with_context(|| format!("FC05 write of coil {address} failed"))?;
        parse_pull_set_ack(&mut request, &response)
    }

    fn write_bits(&mut self, start: u16, values: &[bool]) -> Result<()> {
        let (mut request, raw) = generate_pull_set_coils_request(self.station_id, start, values)?;
        let response = transact(&self.port, &raw)
            .with_context(|| format!("FC15 write of {} coils at {start} failed", values.len()))?;
        parse_pull_set_ack(&mut request, &response)
    }

    fn read_registers(&mut self, start: u16, count: u16) -> Result<Vec<u16>> {
        let (mut request, raw) =
            generate_pull_get_holdings_request(self.station_id, start, count)?;
        let response = transact(&self.port, &raw)
            .with_context(|| format!("FC03 read of {count} registers at {start} failed"))?;
        parse_pull_get_holdings(&mut request, &response, count)
    }

    fn write_registers(&mut self, start: u16, values: &[u16]) -> Result<()> {
        let (mut request, raw) =
            generate_pull_set_holdings_request(self.station_id, start, values)?;
        let response = transact(&self.port, &raw).with_context(|| {
            format!("FC16 write of {} registers at {start} failed", values.len())
        })?;
        parse_pull_set_ack(&mut request, &response)
    }
}
