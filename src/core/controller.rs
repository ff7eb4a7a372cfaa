/// Per-device controller: coil shadow cache, timer snapshots and the MODBUS
/// write/read protocols built on top of a [`Device`].
///
/// The cache only ever holds values that were successfully written to, or
/// read from, the device. A failed write leaves it untouched, which also means
/// the physical state after a failed block write is unknown until the next
/// `validate`.
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};

use super::error::GatewayError;
use crate::api::Device;

/// Registers per timer configuration block (preset off, preset on, resolution, mode).
pub const TIMER_BLOCK_LEN: usize = 4;

pub type TimerBlock = [u16; TIMER_BLOCK_LEN];

/// Handle shared between the router table and queued commands. Only the
/// invoker's consumer locks it.
pub type SharedController = Arc<Mutex<Controller>>;

/// Result of comparing the device read-back against the shadow cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Consistent { coils: Vec<bool> },
    Diverged { device: Vec<bool>, cache: Vec<bool> },
    /// The read-back failed; nothing is known about the device.
    Unknown { reason: String },
}

impl Validation {
    pub fn is_consistent(&self) -> bool {
        matches!(self, Validation::Consistent { .. })
    }
}

/// Render coil states the way they appear in audit lines: `[0, 1, 1, 0]`.
pub fn format_coils(coils: &[bool]) -> String {
    let body = coils
        .iter()
        .map(|c| if *c { "1" } else { "0" })
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{body}]")
}

pub struct Controller {
    id: String,
    tag: String,
    device: Box<dyn Device>,
    coil_state: Vec<bool>,
    timer_snapshots: BTreeMap<u16, TimerBlock>,
}

impl Controller {
    /// All coils start OFF; nothing is read from the device here.
    pub fn new(id: impl Into<String>, device: Box<dyn Device>, num_coils: u16) -> Self {
        let id = id.into();
        let tag = format!("{id}({})", device.address());
        Self {
            id,
            tag,
            device,
            coil_state: vec![false; num_coils as usize],
            timer_snapshots: BTreeMap::new(),
        }
    }

    pub fn into_shared(self) -> SharedController {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn num_coils(&self) -> u16 {
        self.coil_state.len() as u16
    }

    pub fn coil_state(&self) -> &[bool] {
        &self.coil_state
    }

    pub fn timer_snapshots(&self) -> &BTreeMap<u16, TimerBlock> {
        &self.timer_snapshots
    }

    /// Turn on the coils in the list.
    pub fn coils_on(&mut self, coils: &[u16]) -> Result<(), GatewayError> {
        self.write_coils(coils, true)
    }

    /// Turn off the coils in the list.
    pub fn coils_off(&mut self, coils: &[u16]) -> Result<(), GatewayError> {
        self.write_coils(coils, false)
    }

    fn check_coils(&self, coils: &[u16]) -> Result<(), GatewayError> {
        let reject = |reason: String| GatewayError::InvalidCoils {
            device: self.id.clone(),
            reason,
        };

        if coils.is_empty() {
            return Err(reject("empty coil list".to_string()));
        }
        let mut seen = vec![false; self.coil_state.len()];
        for &coil in coils {
            let slot = seen.get_mut(coil as usize).ok_or_else(|| {
                reject(format!(
                    "coil {coil} out of range 0..{}",
                    self.coil_state.len()
                ))
            })?;
            if *slot {
                return Err(reject(format!("duplicate coil {coil}")));
            }
            *slot = true;
        }
        Ok(())
    }

    /// Write `state` to every coil in `coils`.
    ///
    /// One coil goes out as FC05 with just that coil. Two or more rewrite the
    /// whole bank from address 0 with FC0F, using the cache merged with the
    /// requested changes. The merged candidate replaces the cache only once
    /// the device has acknowledged the write.
    fn write_coils(&mut self, coils: &[u16], state: bool) -> Result<(), GatewayError> {
        self.check_coils(coils)?;

        let mut candidate = self.coil_state.clone();
        for &coil in coils {
            candidate[coil as usize] = state;
            log::debug!("{}, {}", coil, candidate[coil as usize] as u8);
        }

        let (code, operation, result) = if let [coil] = coils {
            ("FC05", "write_bit", self.device.write_bit(*coil, state))
        } else {
            ("FC15", "write_bits", self.device.write_bits(0, &candidate))
        };

        match result {
            Ok(()) => {
                log::info!(
                    "{code} {} {:?} {}",
                    self.tag,
                    coils,
                    format_coils(&candidate)
                );
                self.coil_state = candidate;
                Ok(())
            }
            Err(err) => {
                log::error!(
                    "{code} ERROR {}: {:?} {} left cache at {}: {err:#}",
                    self.tag,
                    coils,
                    format_coils(&candidate),
                    format_coils(&self.coil_state)
                );
                Err(GatewayError::transport(&self.id, operation, &err))
            }
        }
    }

    /// Read back the whole coil bank and compare it with the cache. Never
    /// touches the cache.
    pub fn validate(&mut self) -> Validation {
        let device = match self.device.read_bits(0, self.num_coils()) {
            Ok(coils) => coils,
            Err(err) => {
                log::error!("FC01 ERROR {}: {err:#}", self.tag);
                return Validation::Unknown {
                    reason: format!("{err:#}"),
                };
            }
        };
        log::info!("FC01 {} {}", self.tag, format_coils(&device));

        if device == self.coil_state {
            log::info!(
                "Plc {} coils valid {} {}",
                self.tag,
                format_coils(&device),
                format_coils(&self.coil_state)
            );
            Validation::Consistent { coils: device }
        } else {
            log::warn!(
                "Plc {} coils invalid {} {}",
                self.tag,
                format_coils(&device),
                format_coils(&self.coil_state)
            );
            Validation::Diverged {
                device,
                cache: self.coil_state.clone(),
            }
        }
    }

    /// Snapshot the timer block at `start_address`, then write `values` there.
    ///
    /// A failed snapshot read is logged and the write still goes ahead; the
    /// previous snapshot for the address (if any) is kept in that case.
    pub fn timer_set(&mut self, start_address: u16, values: TimerBlock) -> Result<(), GatewayError> {
        match self
            .device
            .read_registers(start_address, TIMER_BLOCK_LEN as u16)
        {
            Ok(block) => match TimerBlock::try_from(block.as_slice()) {
                Ok(block) => {
                    log::info!("FC03 {} @{} {:?}", self.tag, start_address, block);
                    self.timer_snapshots.insert(start_address, block);
                }
                Err(_) => log::warn!(
                    "FC03 {} @{} returned {} registers, snapshot skipped",
                    self.tag,
                    start_address,
                    block.len()
                ),
            },
            Err(err) => log::warn!(
                "FC03 ERROR {} @{}: snapshot skipped: {err:#}",
                self.tag,
                start_address
            ),
        }

        match self.device.write_registers(start_address, &values) {
            Ok(()) => {
                log::info!("FC16 {} @{} {:?}", self.tag, start_address, values);
                Ok(())
            }
            Err(err) => {
                log::error!(
                    "FC16 ERROR {} @{} {:?}: {err:#}",
                    self.tag,
                    start_address,
                    values
                );
                Err(GatewayError::transport(&self.id, "write_registers", &err))
            }
        }
    }

    /// Write every stored snapshot back to its address, lowest address first.
    ///
    /// Snapshots are kept afterwards. Every address is attempted even if an
    /// earlier one fails; the error lists the addresses that were not restored.
    pub fn reset_timers(&mut self) -> Result<usize, GatewayError> {
        let mut restored = 0;
        let mut failed = Vec::new();
        let mut last_error = None;

        for (&address, block) in &self.timer_snapshots {
            match self.device.write_registers(address, block) {
                Ok(()) => {
                    log::info!("FC16 {} @{} {:?} (restore)", self.tag, address, block);
                    restored += 1;
                }
                Err(err) => {
                    log::error!(
                        "FC16 ERROR {} @{} {:?} (restore): {err:#}",
                        self.tag,
                        address,
                        block
                    );
                    failed.push(address);
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            None => Ok(restored),
            Some(err) => Err(GatewayError::transport(
                &self.id,
                "reset_timers",
                &err.context(format!("timer blocks at {failed:?} not restored")),
            )),
        }
    }
}
