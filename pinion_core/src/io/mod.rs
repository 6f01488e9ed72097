//! # Output routing
//!
//! - **ShiftRegister**: bit-banged driver for daisy-chained serial banks
//! - **IoRouter**: sends point writes to direct lines or bank buffers and flushes banks once per tick

pub mod router;
pub mod shift_register;

pub use router::IoRouter;
pub use shift_register::{ControlLines, ShiftRegister, DEFAULT_BITS_PER_DEVICE, MAX_BITS_PER_DEVICE, MAX_DEVICES};
