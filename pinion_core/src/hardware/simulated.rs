use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::pin::{PinDriver, PinMode, Pull};
use crate::error::{PinionError, PinionResult};

/// One recorded line write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinWrite {
    pub pin: u8,
    pub high: bool,
}

/// In-memory pin driver.
///
/// Records every write in order, serves input levels set by the caller and can be told
/// to fail writes on chosen lines. Used by `--simulate` and throughout the tests.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPinDriver {
    modes: BTreeMap<u8, PinMode>,
    levels: BTreeMap<u8, bool>,
    history: Vec<PinWrite>,
    failing: HashSet<u8>,
    released: bool,
}

impl SimulatedPinDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the level an input line will read.
    pub fn set_input_level(&mut self, pin: u8, high: bool) {
        self.levels.insert(pin, high);
    }

    /// Make every later write to `pin` fail.
    pub fn fail_writes_on(&mut self, pin: u8) {
        self.failing.insert(pin);
    }

    pub fn level(&self, pin: u8) -> Option<bool> {
        self.levels.get(&pin).copied()
    }

    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.modes.get(&pin).copied()
    }

    pub fn history(&self) -> &[PinWrite] {
        &self.history
    }

    /// Levels written to one line, oldest first.
    pub fn writes_to(&self, pin: u8) -> Vec<bool> {
        self.history
            .iter()
            .filter(|w| w.pin == pin)
            .map(|w| w.high)
            .collect()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl PinDriver for SimulatedPinDriver {
    fn setup_output(&mut self, pin: u8) -> PinionResult<()> {
        self.modes.insert(pin, PinMode::Output);
        self.levels.entry(pin).or_insert(false);
        Ok(())
    }

    fn setup_input(&mut self, pin: u8, pull: Pull) -> PinionResult<()> {
        self.modes.insert(pin, PinMode::Input(pull));
        self.levels.entry(pin).or_insert(pull == Pull::Up);
        Ok(())
    }

    fn read(&mut self, pin: u8) -> PinionResult<bool> {
        Ok(self.levels.get(&pin).copied().unwrap_or(false))
    }

    fn write(&mut self, pin: u8, high: bool) -> PinionResult<()> {
        if self.failing.contains(&pin) {
            return Err(PinionError::hardware(pin, "simulated write failure"));
        }
        self.levels.insert(pin, high);
        self.history.push(PinWrite { pin, high });
        Ok(())
    }

    fn release(&mut self) -> PinionResult<()> {
        debug!("Releasing {} simulated lines", self.modes.len());
        self.modes.clear();
        self.released = true;
        Ok(())
    }
}
