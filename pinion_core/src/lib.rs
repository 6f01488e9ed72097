//! # PINION Core
//!
//! Runtime for a digital I/O point controller on single-board computers.
//!
//! - **Points**: named Inputs, Outputs and Virtuals with per-point intervals
//! - **Hardware**: pin driver abstraction, one-wire sensors
//! - **I/O routing**: direct lines and daisy-chained shift-register banks
//! - **Plugins**: priority-ordered modules deriving behavior from point values
//! - **Messaging**: command/state topics through a broker gateway
//! - **Scheduling**: the single-threaded control loop tying it together

pub mod communication;
pub mod config;
pub mod core;
pub mod error;
pub mod hardware;
pub mod host;
pub mod io;
pub mod plugins;
pub mod scheduling;

// Re-export commonly used types for easy access
pub use communication::{InboundMessage, LoopbackGateway, MessageGateway, ValueEncoding};
pub use config::{AppConfig, ModuleConfig};
pub use core::{Input, Interval, Output, Point, PointCategory, PointRegistry, Virtual};
pub use error::{PinionError, PinionResult};
pub use hardware::{PinDriver, Pull, SimulatedPinDriver};
pub use io::{ControlLines, IoRouter, ShiftRegister};
pub use plugins::{ModuleState, Plugin, PluginRegistry, PluginRuntime, Snapshot};
pub use scheduling::{ControlLoop, LoopSettings, TickSummary};

#[cfg(feature = "mqtt")]
pub use communication::MqttGateway;

#[cfg(feature = "raspberry-pi")]
pub use hardware::RppalPinDriver;
