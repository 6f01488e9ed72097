//! # PINION control loop
//!
//! A single cooperative loop services every subsystem in a fixed order, sleeping a
//! configured interval between iterations:
//!
//! ```rust,ignore
//! use pinion_core::{AppConfig, ControlLoop, LoopbackGateway, PluginRegistry, SimulatedPinDriver};
//!
//! let config = AppConfig::load("config.json")?;
//! let mut control = ControlLoop::from_config(
//!     &config,
//!     SimulatedPinDriver::new(),
//!     LoopbackGateway::new(),
//!     &PluginRegistry::new(),
//! )?;
//! control.run()?; // until the stop handle is cleared
//! ```

pub mod builder;
pub mod control_loop;

pub use control_loop::{ControlLoop, LoopSettings, TickSummary};
