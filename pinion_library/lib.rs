//! # PINION Standard Library
//!
//! Built-in plugin modules for the PINION controller.
//!
//! ```rust,ignore
//! use pinion_library::builtin_plugins;
//!
//! let factories = builtin_plugins();
//! let control = ControlLoop::from_config(&config, driver, gateway, &factories)?;
//! ```

pub mod plugins;

pub use plugins::{
    builtin_plugins, register_builtin_plugins, SwitchMode, Thermostat, ThermostatConfig, Threshold,
    ToggleSwitch, ToggleSwitchConfig, HEATER, SWITCHES,
};
