//! # Hardware access
//!
//! - **PinDriver**: line-level GPIO trait implemented per platform
//! - **SimulatedPinDriver**: recording in-memory driver
//! - **RppalPinDriver**: Raspberry Pi GPIO (feature `raspberry-pi`)
//! - **OneWireBus**: temperature sensors on the kernel w1 bus

pub mod onewire;
pub mod pin;
pub mod simulated;

#[cfg(feature = "raspberry-pi")]
pub mod rppal_driver;

pub use onewire::{parse_w1_slave, OneWireBus, DEFAULT_W1_PATH, SENSOR_FAULT};
pub use pin::{PinDriver, PinMode, PinNumbering, Pull, MAX_BCM_PIN};
pub use simulated::{PinWrite, SimulatedPinDriver};

#[cfg(feature = "raspberry-pi")]
pub use rppal_driver::RppalPinDriver;
