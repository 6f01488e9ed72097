//! Routes logical output writes to direct lines or shift-register banks.

use std::collections::{BTreeSet, HashMap};
use tracing::{error, info, warn};

use super::shift_register::ShiftRegister;
use crate::core::{is_truthy, InputSource, OutputDevice, PointRegistry};
use crate::error::{PinionError, PinionResult};
use crate::hardware::{OneWireBus, PinDriver, Pull};

/// Owns the pin driver and every shift-register bank.
///
/// Lines used as bank control lines are dedicated: generic point processing never
/// touches them.
pub struct IoRouter<D: PinDriver> {
    driver: D,
    banks: Vec<ShiftRegister>,
    bank_index: HashMap<String, usize>,
    dedicated: BTreeSet<u8>,
    one_wire: OneWireBus,
}

impl<D: PinDriver> IoRouter<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            banks: Vec::new(),
            bank_index: HashMap::new(),
            dedicated: BTreeSet::new(),
            one_wire: OneWireBus::default(),
        }
    }

    pub fn with_one_wire_bus(mut self, bus: OneWireBus) -> Self {
        self.one_wire = bus;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn one_wire(&self) -> &OneWireBus {
        &self.one_wire
    }

    pub fn setup_output(&mut self, pin: u8) -> PinionResult<()> {
        self.driver.setup_output(pin)
    }

    pub fn setup_input(&mut self, pin: u8, pull: Pull) -> PinionResult<()> {
        self.driver.setup_input(pin, pull)
    }

    /// Take ownership of a bank and reserve its control lines.
    pub fn add_bank(&mut self, bank: ShiftRegister) -> PinionResult<()> {
        if self.bank_index.contains_key(bank.key()) {
            return Err(PinionError::duplicate("Shift register", bank.key()));
        }

        self.dedicated.extend(bank.lines().pins());
        info!(
            "Added shift register '{}' ({} device(s), {} outputs)",
            bank.key(),
            bank.device_count(),
            bank.capacity()
        );
        self.bank_index.insert(bank.key().to_string(), self.banks.len());
        self.banks.push(bank);
        Ok(())
    }

    pub fn bank(&self, key: &str) -> PinionResult<&ShiftRegister> {
        self.bank_index
            .get(key)
            .map(|&i| &self.banks[i])
            .ok_or_else(|| PinionError::not_found("Shift register", key))
    }

    pub fn banks(&self) -> &[ShiftRegister] {
        &self.banks
    }

    pub fn is_dedicated(&self, pin: u8) -> bool {
        self.dedicated.contains(&pin)
    }

    pub fn dedicated_pins(&self) -> impl Iterator<Item = u8> + '_ {
        self.dedicated.iter().copied()
    }

    /// Resolve an output by key and apply `value` to it.
    pub fn write_output(&mut self, registry: &PointRegistry, key: &str, value: f64) -> PinionResult<()> {
        let output = registry
            .output(key)
            .map_err(|_| PinionError::UnknownKey(key.to_string()))?;
        self.write_device(&output.device, value)
    }

    /// Apply a value to an output device.
    ///
    /// Direct lines are written immediately; bank pins only update the bank buffer
    /// until [`IoRouter::flush_all_banks`].
    pub fn write_device(&mut self, device: &OutputDevice, value: f64) -> PinionResult<()> {
        match device {
            OutputDevice::Direct { pin } => self.driver.write(*pin, is_truthy(value)),
            OutputDevice::SerialBank { bank, pin } => {
                let index = *self
                    .bank_index
                    .get(bank)
                    .ok_or_else(|| PinionError::not_found("Shift register", bank.as_str()))?;
                self.banks[index].set_pin(*pin, is_truthy(value))
            }
        }
    }

    pub fn read_input(&mut self, source: &InputSource) -> PinionResult<f64> {
        match source {
            InputSource::Gpio { pin, .. } => {
                let high = self.driver.read(*pin)?;
                Ok(if high { 1.0 } else { 0.0 })
            }
            InputSource::OneWire { device } => Ok(self.one_wire.read_temperature(device)),
        }
    }

    /// Clear every bank and then enable its outputs.
    pub fn initialize_banks(&mut self) -> PinionResult<()> {
        for bank in &self.banks {
            bank.clear_all(&mut self.driver)?;
            bank.enable_outputs(&mut self.driver)?;
        }
        Ok(())
    }

    /// Shift every healthy bank's buffer out and latch it.
    ///
    /// A bank whose control lines fail is marked faulted and skipped from then on.
    /// The first failure of this call is returned after the remaining banks are flushed.
    pub fn flush_all_banks(&mut self) -> PinionResult<()> {
        let mut first_error = None;
        for bank in self.banks.iter_mut() {
            if bank.fault().is_some() {
                continue;
            }
            if let Err(e) = bank.flush(&mut self.driver) {
                error!("Shift register '{}' stopped: {}", bank.key(), e);
                bank.mark_faulted(e.to_string());
                first_error.get_or_insert(PinionError::BankFault {
                    bank: bank.key().to_string(),
                    message: e.to_string(),
                });
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Disable every bank's outputs and release the driver's lines.
    pub fn shutdown(&mut self) -> PinionResult<()> {
        for bank in &self.banks {
            if let Err(e) = bank.disable_outputs(&mut self.driver) {
                warn!("Could not disable outputs of '{}': {}", bank.key(), e);
            }
        }
        self.driver.release()
    }
}
