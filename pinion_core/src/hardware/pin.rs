use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PinionResult;

/// Input pull resistor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Pull {
    #[default]
    #[serde(rename = "PUD_OFF", alias = "off")]
    Off,
    #[serde(rename = "PUD_UP", alias = "up")]
    Up,
    #[serde(rename = "PUD_DOWN", alias = "down")]
    Down,
}

/// Direction a line was configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input(Pull),
    Output,
}

/// Line-level access to GPIO hardware.
///
/// Pins are driver (BCM) line numbers. Implementations report failures instead of
/// retrying them.
pub trait PinDriver {
    /// Configure a line as an output.
    fn setup_output(&mut self, pin: u8) -> PinionResult<()>;

    /// Configure a line as an input with the given pull resistor.
    fn setup_input(&mut self, pin: u8, pull: Pull) -> PinionResult<()>;

    /// Read the level of a line; `true` is high.
    fn read(&mut self, pin: u8) -> PinionResult<bool>;

    /// Drive a line high (`true`) or low (`false`).
    fn write(&mut self, pin: u8, high: bool) -> PinionResult<()>;

    /// Return every configured line to its original state.
    fn release(&mut self) -> PinionResult<()> {
        Ok(())
    }
}

impl<D: PinDriver + ?Sized> PinDriver for Box<D> {
    fn setup_output(&mut self, pin: u8) -> PinionResult<()> {
        (**self).setup_output(pin)
    }

    fn setup_input(&mut self, pin: u8, pull: Pull) -> PinionResult<()> {
        (**self).setup_input(pin, pull)
    }

    fn read(&mut self, pin: u8) -> PinionResult<bool> {
        (**self).read(pin)
    }

    fn write(&mut self, pin: u8, high: bool) -> PinionResult<()> {
        (**self).write(pin, high)
    }

    fn release(&mut self) -> PinionResult<()> {
        (**self).release()
    }
}

/// Highest BCM line number exposed on the 40-pin header.
pub const MAX_BCM_PIN: u8 = 27;

/// (physical header pin, BCM line) for every header pin wired to a GPIO.
const BOARD_TO_BCM: [(u8, u8); 28] = [
    (3, 2),
    (5, 3),
    (7, 4),
    (8, 14),
    (10, 15),
    (11, 17),
    (12, 18),
    (13, 27),
    (15, 22),
    (16, 23),
    (18, 24),
    (19, 10),
    (21, 9),
    (22, 25),
    (23, 11),
    (24, 8),
    (26, 7),
    (27, 0),
    (28, 1),
    (29, 5),
    (31, 6),
    (32, 12),
    (33, 13),
    (35, 19),
    (36, 16),
    (37, 26),
    (38, 20),
    (40, 21),
];

/// How pin numbers in the configuration are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PinNumbering {
    /// Broadcom line numbers.
    #[default]
    #[serde(rename = "BCM")]
    Bcm,
    /// Physical header positions.
    #[serde(rename = "BOARD")]
    Board,
}

impl PinNumbering {
    /// Translate a configured pin to the driver's BCM line, if it names a GPIO.
    pub fn to_bcm(self, pin: u32) -> Option<u8> {
        match self {
            PinNumbering::Bcm => u8::try_from(pin).ok().filter(|&p| p <= MAX_BCM_PIN),
            PinNumbering::Board => BOARD_TO_BCM
                .iter()
                .find(|(board, _)| u32::from(*board) == pin)
                .map(|&(_, bcm)| bcm),
        }
    }
}

impl fmt::Display for PinNumbering {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PinNumbering::Bcm => write!(f, "BCM"),
            PinNumbering::Board => write!(f, "BOARD"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bcm_range() {
        assert_eq!(PinNumbering::Bcm.to_bcm(0), Some(0));
        assert_eq!(PinNumbering::Bcm.to_bcm(27), Some(27));
        assert_eq!(PinNumbering::Bcm.to_bcm(28), None);
        assert_eq!(PinNumbering::Bcm.to_bcm(300), None);
    }

    #[test]
    fn test_board_translation() {
        assert_eq!(PinNumbering::Board.to_bcm(11), Some(17));
        assert_eq!(PinNumbering::Board.to_bcm(40), Some(21));
        // Power and ground pins are not GPIOs
        assert_eq!(PinNumbering::Board.to_bcm(1), None);
        assert_eq!(PinNumbering::Board.to_bcm(6), None);
    }

    #[test]
    fn test_pull_names() {
        let pull: Pull = serde_json::from_str("\"PUD_UP\"").unwrap();
        assert_eq!(pull, Pull::Up);
        let numbering: PinNumbering = serde_json::from_str("\"BOARD\"").unwrap();
        assert_eq!(numbering, PinNumbering::Board);
    }
}
