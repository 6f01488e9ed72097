//! Driver for daisy-chained 74HC595-style serial-in/parallel-out banks.

use tracing::debug;

use crate::error::{PinionError, PinionResult};
use crate::hardware::PinDriver;

/// Outputs per device when the manifest does not say.
pub const DEFAULT_BITS_PER_DEVICE: u8 = 8;

/// Widest device the byte-per-device buffer can represent.
pub const MAX_BITS_PER_DEVICE: u8 = 8;

/// Longest chain accepted on one set of control lines.
pub const MAX_DEVICES: usize = 256;

/// Control lines of one bank, as driver line numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlLines {
    pub data: u8,
    pub clock: u8,
    pub latch: u8,
    /// Active-low output enable.
    pub output_enable: Option<u8>,
    /// Active-low register clear.
    pub clear: Option<u8>,
}

impl ControlLines {
    pub fn new(data: u8, clock: u8, latch: u8) -> Self {
        Self {
            data,
            clock,
            latch,
            output_enable: None,
            clear: None,
        }
    }

    pub fn with_output_enable(mut self, pin: u8) -> Self {
        self.output_enable = Some(pin);
        self
    }

    pub fn with_clear(mut self, pin: u8) -> Self {
        self.clear = Some(pin);
        self
    }

    /// Every line this bank owns.
    pub fn pins(&self) -> Vec<u8> {
        let mut pins = vec![self.data, self.clock, self.latch];
        pins.extend(self.output_enable);
        pins.extend(self.clear);
        pins
    }
}

/// A chain of identical shift-register devices plus its canonical output buffer.
///
/// `output_values[0]` belongs to the device closest to the controller and holds
/// virtual pins `1..=bits_per_device`.
#[derive(Debug, Clone)]
pub struct ShiftRegister {
    key: String,
    lines: ControlLines,
    bits_per_device: u8,
    output_values: Box<[u8]>,
    fault: Option<String>,
}

impl ShiftRegister {
    pub fn new(
        key: impl Into<String>,
        lines: ControlLines,
        device_count: usize,
        bits_per_device: u8,
    ) -> PinionResult<Self> {
        let key = key.into();
        if device_count == 0 || device_count > MAX_DEVICES {
            return Err(PinionError::config(format!(
                "shift register '{}' supports 1..={} devices, got {}",
                key, MAX_DEVICES, device_count
            )));
        }
        if bits_per_device == 0 || bits_per_device > MAX_BITS_PER_DEVICE {
            return Err(PinionError::config(format!(
                "shift register '{}' supports 1..={} outputs per device, got {}",
                key, MAX_BITS_PER_DEVICE, bits_per_device
            )));
        }

        Ok(Self {
            key,
            lines,
            bits_per_device,
            output_values: vec![0u8; device_count].into_boxed_slice(),
            fault: None,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn lines(&self) -> &ControlLines {
        &self.lines
    }

    pub fn device_count(&self) -> usize {
        self.output_values.len()
    }

    pub fn bits_per_device(&self) -> u8 {
        self.bits_per_device
    }

    pub fn output_values(&self) -> &[u8] {
        &self.output_values
    }

    /// Number of addressable virtual pins.
    pub fn capacity(&self) -> u32 {
        u32::try_from(self.device_count())
            .ok()
            .and_then(|devices| devices.checked_mul(u32::from(self.bits_per_device)))
            .unwrap_or(u32::MAX)
    }

    /// Map a 1-based virtual pin to `(device_index, bit_index)`.
    pub fn locate(&self, pin: u32) -> Option<(usize, u8)> {
        if pin == 0 || pin > self.capacity() {
            return None;
        }
        let zero_based = pin - 1;
        let bits = u32::from(self.bits_per_device);
        Some(((zero_based / bits) as usize, (zero_based % bits) as u8))
    }

    /// Set or clear one virtual pin in the buffer. Hardware is untouched until a flush.
    pub fn set_pin(&mut self, pin: u32, on: bool) -> PinionResult<()> {
        let (device, bit) = self.locate(pin).ok_or_else(|| PinionError::PinOutOfRange {
            key: self.key.clone(),
            pin,
            min: 1,
            max: self.capacity(),
        })?;

        let mask = 1u8 << bit;
        if on {
            self.output_values[device] |= mask;
        } else {
            self.output_values[device] &= !mask;
        }
        Ok(())
    }

    pub fn pin_state(&self, pin: u32) -> Option<bool> {
        self.locate(pin)
            .map(|(device, bit)| self.output_values[device] & (1 << bit) != 0)
    }

    /// Why this bank stopped operating, if it did.
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub(crate) fn mark_faulted(&mut self, message: impl Into<String>) {
        self.fault = Some(message.into());
    }

    pub fn clear_latch<D: PinDriver + ?Sized>(&self, driver: &mut D) -> PinionResult<()> {
        driver.write(self.lines.latch, false)
    }

    pub fn set_latch<D: PinDriver + ?Sized>(&self, driver: &mut D) -> PinionResult<()> {
        driver.write(self.lines.latch, true)
    }

    /// Clock one byte into the chain, most significant bit first.
    pub fn shift_byte<D: PinDriver + ?Sized>(&self, driver: &mut D, byte: u8) -> PinionResult<()> {
        driver.write(self.lines.clock, false)?;
        for i in 0..8 {
            driver.write(self.lines.data, byte & (0x80 >> i) != 0)?;
            driver.write(self.lines.clock, true)?;
            driver.write(self.lines.clock, false)?;
        }
        Ok(())
    }

    /// Shift a full chain image and latch it onto the outputs.
    ///
    /// The last byte is shifted first so that `bytes[0]` settles in the nearest device.
    pub fn shift_and_latch<D: PinDriver + ?Sized>(&self, driver: &mut D, bytes: &[u8]) -> PinionResult<()> {
        self.clear_latch(driver)?;
        for &byte in bytes.iter().rev() {
            self.shift_byte(driver, byte)?;
        }
        self.set_latch(driver)
    }

    /// Push the canonical buffer to the hardware.
    pub fn flush<D: PinDriver + ?Sized>(&self, driver: &mut D) -> PinionResult<()> {
        self.shift_and_latch(driver, &self.output_values)
    }

    /// Clear every output, by pulsing the clear line or by shifting zeros.
    pub fn clear_all<D: PinDriver + ?Sized>(&self, driver: &mut D) -> PinionResult<()> {
        match self.lines.clear {
            Some(clear) => {
                debug!("Pulsing clear line of '{}'", self.key);
                driver.write(clear, false)?;
                driver.write(clear, true)
            }
            None => {
                let zeros = vec![0u8; self.device_count()];
                self.shift_and_latch(driver, &zeros)
            }
        }
    }

    /// Drive output-enable low. No-op without an OE line.
    pub fn enable_outputs<D: PinDriver + ?Sized>(&self, driver: &mut D) -> PinionResult<()> {
        match self.lines.output_enable {
            Some(oe) => driver.write(oe, false),
            None => Ok(()),
        }
    }

    /// Drive output-enable high. No-op without an OE line.
    pub fn disable_outputs<D: PinDriver + ?Sized>(&self, driver: &mut D) -> PinionResult<()> {
        match self.lines.output_enable {
            Some(oe) => driver.write(oe, true),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedPinDriver;

    const DATA: u8 = 22;
    const CLOCK: u8 = 23;
    const LATCH: u8 = 24;
    const OE: u8 = 25;
    const CLEAR: u8 = 26;

    fn bank(devices: usize) -> ShiftRegister {
        ShiftRegister::new("sr1", ControlLines::new(DATA, CLOCK, LATCH), devices, 8).unwrap()
    }

    /// Data-line levels sampled on every rising clock edge.
    fn clocked_bits(driver: &SimulatedPinDriver) -> Vec<bool> {
        let mut data = false;
        let mut bits = Vec::new();
        for write in driver.history() {
            if write.pin == DATA {
                data = write.high;
            } else if write.pin == CLOCK && write.high {
                bits.push(data);
            }
        }
        bits
    }

    fn bits_of(byte: u8) -> Vec<bool> {
        (0..8).map(|i| byte & (0x80 >> i) != 0).collect()
    }

    #[test]
    fn test_bit_placement() {
        let mut sr = bank(2);
        sr.set_pin(1, true).unwrap();
        assert_eq!(sr.output_values(), &[0x01, 0x00]);

        sr.set_pin(9, true).unwrap();
        assert_eq!(sr.output_values(), &[0x01, 0x01]);

        sr.set_pin(16, true).unwrap();
        assert_eq!(sr.output_values(), &[0x01, 0x81]);

        sr.set_pin(9, false).unwrap();
        assert_eq!(sr.output_values(), &[0x01, 0x80]);
        assert_eq!(sr.pin_state(16), Some(true));
        assert_eq!(sr.pin_state(9), Some(false));
    }

    #[test]
    fn test_pin_out_of_range() {
        let mut sr = bank(2);
        assert!(matches!(
            sr.set_pin(0, true),
            Err(PinionError::PinOutOfRange { pin: 0, max: 16, .. })
        ));
        assert!(sr.set_pin(17, true).is_err());
        assert_eq!(sr.locate(16), Some((1, 7)));
    }

    #[test]
    fn test_shift_byte_msb_first() {
        let sr = bank(1);
        let mut driver = SimulatedPinDriver::new();
        sr.shift_byte(&mut driver, 0b1000_0001).unwrap();
        assert_eq!(clocked_bits(&driver), bits_of(0b1000_0001));
        assert_eq!(driver.level(CLOCK), Some(false));
    }

    #[test]
    fn test_chain_order_last_device_first() {
        let sr = bank(2);
        let mut driver = SimulatedPinDriver::new();
        sr.shift_and_latch(&mut driver, &[0xAA, 0x55]).unwrap();

        let bits = clocked_bits(&driver);
        assert_eq!(bits.len(), 16);
        assert_eq!(&bits[..8], bits_of(0x55).as_slice());
        assert_eq!(&bits[8..], bits_of(0xAA).as_slice());

        // Latch goes low before shifting and high once after
        assert_eq!(driver.writes_to(LATCH), vec![false, true]);
        assert_eq!(driver.history().first().unwrap().pin, LATCH);
        assert_eq!(driver.history().last().unwrap().pin, LATCH);
    }

    #[test]
    fn test_clear_all_with_clear_line() {
        let sr = ShiftRegister::new(
            "sr1",
            ControlLines::new(DATA, CLOCK, LATCH).with_clear(CLEAR),
            2,
            8,
        )
        .unwrap();
        let mut driver = SimulatedPinDriver::new();
        sr.clear_all(&mut driver).unwrap();
        assert_eq!(driver.writes_to(CLEAR), vec![false, true]);
        assert!(driver.writes_to(CLOCK).is_empty());
    }

    #[test]
    fn test_clear_all_without_clear_line_shifts_zeros() {
        let sr = bank(3);
        let mut driver = SimulatedPinDriver::new();
        sr.clear_all(&mut driver).unwrap();
        let bits = clocked_bits(&driver);
        assert_eq!(bits.len(), 24);
        assert!(bits.iter().all(|&b| !b));
    }

    #[test]
    fn test_output_enable_polarity() {
        let sr = ShiftRegister::new(
            "sr1",
            ControlLines::new(DATA, CLOCK, LATCH).with_output_enable(OE),
            1,
            8,
        )
        .unwrap();
        let mut driver = SimulatedPinDriver::new();
        sr.enable_outputs(&mut driver).unwrap();
        sr.disable_outputs(&mut driver).unwrap();
        assert_eq!(driver.writes_to(OE), vec![false, true]);
    }

    #[test]
    fn test_output_enable_absent_is_noop() {
        let sr = bank(1);
        let mut driver = SimulatedPinDriver::new();
        sr.enable_outputs(&mut driver).unwrap();
        sr.disable_outputs(&mut driver).unwrap();
        assert!(driver.history().is_empty());
    }

    #[test]
    fn test_write_failure_propagates() {
        let sr = bank(1);
        let mut driver = SimulatedPinDriver::new();
        driver.fail_writes_on(CLOCK);
        assert!(matches!(
            sr.flush(&mut driver),
            Err(PinionError::Hardware { pin: CLOCK, .. })
        ));
        // Only the latch was touched before the failure
        assert_eq!(driver.writes_to(LATCH), vec![false]);
    }

    #[test]
    fn test_rejects_bad_geometry() {
        let lines = ControlLines::new(DATA, CLOCK, LATCH);
        assert!(ShiftRegister::new("a", lines.clone(), 0, 8).is_err());
        assert!(ShiftRegister::new("b", lines.clone(), 1, 9).is_err());
        assert!(ShiftRegister::new("c", lines.clone(), MAX_DEVICES + 1, 8).is_err());

        let longest = ShiftRegister::new("d", lines, MAX_DEVICES, 8).unwrap();
        assert_eq!(longest.capacity(), 2048);
        assert_eq!(longest.locate(2048), Some((MAX_DEVICES - 1, 7)));
        assert_eq!(longest.locate(2049), None);
    }
}
