//! In-memory field device for tests and dry runs.
//!
//! `MockDevice` clones share one simulated device, so a test can hand one
//! clone to a `Controller` and keep another to inspect the calls it made,
//! inject faults, or change the "physical" state behind the controller's back.
use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use crate::api::Device;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ReadBits { start: u16, count: u16 },
    WriteBit { address: u16, value: bool },
    WriteBits { start: u16, values: Vec<bool> },
    ReadRegisters { start: u16, count: u16 },
    WriteRegisters { start: u16, values: Vec<u16> },
}

impl Call {
    pub fn kind(&self) -> CallKind {
        match self {
            Call::ReadBits { .. } => CallKind::ReadBits,
            Call::WriteBit { .. } => CallKind::WriteBit,
            Call::WriteBits { .. } => CallKind::WriteBits,
            Call::ReadRegisters { .. } => CallKind::ReadRegisters,
            Call::WriteRegisters { .. } => CallKind::WriteRegisters,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    ReadBits,
    WriteBit,
    WriteBits,
    ReadRegisters,
    WriteRegisters,
}

/// Calls from several devices in the order they reached the "bus".
pub type Journal = Arc<Mutex<Vec<(String, Call)>>>;

#[derive(Default)]
struct MockState {
    coils: Vec<bool>,
    registers: BTreeMap<u16, u16>,
    calls: Vec<Call>,
    failing: HashSet<CallKind>,
}

#[derive(Clone)]
pub struct MockDevice {
    name: String,
    state: Arc<Mutex<MockState>>,
    journal: Option<Journal>,
}

impl MockDevice {
    pub fn new(name: impl Into<String>, num_coils: u16) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockState {
                coils: vec![false; num_coils as usize],
                ..Default::default()
            })),
            journal: None,
        }
    }

    /// Also record every call into a journal shared with other devices.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Make every following call of `kind` fail until [`MockDevice::recover`].
    pub fn fail(&self, kind: CallKind) {
        self.state.lock().failing.insert(kind);
    }

    pub fn recover(&self, kind: CallKind) {
        self.state.lock().failing.remove(&kind);
    }

    pub fn coils(&self) -> Vec<bool> {
        self.state.lock().coils.clone()
    }

    /// Change the simulated coil bank without going through the controller.
    pub fn set_coils(&self, coils: &[bool]) {
        self.state.lock().coils = coils.to_vec();
    }

    pub fn registers(&self, start: u16, count: u16) -> Vec<u16> {
        let state = self.state.lock();
        (start..start + count)
            .map(|address| state.registers.get(&address).copied().unwrap_or(0))
            .collect()
    }

    pub fn set_registers(&self, start: u16, values: &[u16]) {
        let mut state = self.state.lock();
        for (offset, value) in values.iter().enumerate() {
            state.registers.insert(start + offset as u16, *value);
        }
    }

    fn record(&self, call: Call) -> Result<()> {
        let kind = call.kind();
        if let Some(journal) = &self.journal {
            journal.lock().push((self.name.clone(), call.clone()));
        }
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.failing.contains(&kind) {
            return Err(anyhow!("simulated {kind:?} timeout on {}", self.name));
        }
        Ok(())
    }

    fn coil_range(&self, start: u16, count: usize) -> Result<std::ops::Range<usize>> {
        let len = self.state.lock().coils.len();
        let range = start as usize..start as usize + count;
        if range.end > len {
            return Err(anyhow!("Modbus exception: illegal data address {start}+{count}"));
        }
        Ok(range)
    }
}

impl Device for MockDevice {
    fn address(&self) -> String {
        self.name.clone()
    }

    fn read_bits(&mut self, start: u16, count: u16) -> Result<Vec<bool>> {
        self.record(Call::ReadBits { start, count })?;
        let range = self.coil_range(start, count as usize)?;
        Ok(self.state.lock().coils[range].to_vec())
    }

    fn write_bit(&mut self, address: u16, value: bool) -> Result<()> {
        self.record(Call::WriteBit { address, value })?;
        let range = self.coil_range(address, 1)?;
        self.state.lock().coils[range.start] = value;
        Ok(())
    }

    fn write_bits(&mut self, start: u16, values: &[bool]) -> Result<()> {
        self.record(Call::WriteBits {
            start,
            values: values.to_vec(),
        })?;
        let range = self.coil_range(start, values.len())?;
        self.state.lock().coils[range].copy_from_slice(values);
        Ok(())
    }

    fn read_registers(&mut self, start: u16, count: u16) -> Result<Vec<u16>> {
        self.record(Call::ReadRegisters { start, count })?;
        Ok(self.registers(start, count))
    }

    fn write_registers(&mut self, start: u16, values: &[u16]) -> Result<()> {
        self.record(Call::WriteRegisters {
            start,
            values: values.to_vec(),
        })?;
        self.set_registers(start, values);
        Ok(())
    }
}
