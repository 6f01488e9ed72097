use rppal::gpio::{Gpio, InputPin, Level, OutputPin};
use std::collections::HashMap;
use tracing::{debug, info};

use super::pin::{PinDriver, Pull};
use crate::error::{PinionError, PinionResult};

/// Raspberry Pi GPIO through `rppal`.
///
/// Configured lines are held until [`PinDriver::release`], which drops them and lets
/// rppal restore each line's original mode.
pub struct RppalPinDriver {
    gpio: Gpio,
    outputs: HashMap<u8, OutputPin>,
    inputs: HashMap<u8, InputPin>,
}

impl RppalPinDriver {
    pub fn new() -> PinionResult<Self> {
        let gpio = Gpio::new().map_err(|e| PinionError::config(format!("GPIO unavailable: {}", e)))?;
        info!("Opened Raspberry Pi GPIO");
        Ok(Self {
            gpio,
            outputs: HashMap::new(),
            inputs: HashMap::new(),
        })
    }
}

impl PinDriver for RppalPinDriver {
    fn setup_output(&mut self, pin: u8) -> PinionResult<()> {
        let line = self.gpio.get(pin).map_err(|e| PinionError::hardware(pin, e))?;
        self.inputs.remove(&pin);
        self.outputs.insert(pin, line.into_output_low());
        Ok(())
    }

    fn setup_input(&mut self, pin: u8, pull: Pull) -> PinionResult<()> {
        let line = self.gpio.get(pin).map_err(|e| PinionError::hardware(pin, e))?;
        let input = match pull {
            Pull::Off => line.into_input(),
            Pull::Up => line.into_input_pullup(),
            Pull::Down => line.into_input_pulldown(),
        };
        self.outputs.remove(&pin);
        self.inputs.insert(pin, input);
        Ok(())
    }

    fn read(&mut self, pin: u8) -> PinionResult<bool> {
        if let Some(input) = self.inputs.get(&pin) {
            return Ok(input.read() == Level::High);
        }
        if let Some(output) = self.outputs.get(&pin) {
            return Ok(output.is_set_high());
        }
        Err(PinionError::hardware(pin, "line not configured"))
    }

    fn write(&mut self, pin: u8, high: bool) -> PinionResult<()> {
        let output = self
            .outputs
            .get_mut(&pin)
            .ok_or_else(|| PinionError::hardware(pin, "line not configured as output"))?;
        output.write(if high { Level::High } else { Level::Low });
        Ok(())
    }

    fn release(&mut self) -> PinionResult<()> {
        debug!(
            "Releasing {} output and {} input lines",
            self.outputs.len(),
            self.inputs.len()
        );
        self.outputs.clear();
        self.inputs.clear();
        Ok(())
    }
}
