//! PINION Built-in Plugins
//!
//! Ready-made plugin modules, registered under the manifest names below:
//!
//! - `switches` - [`ToggleSwitch`]: push button toggling (or latching) an output
//! - `heater` - [`Thermostat`]: two-point heater control with hysteresis

pub mod thermostat;
pub mod toggle_switch;

pub use thermostat::{Thermostat, ThermostatConfig, Threshold};
pub use toggle_switch::{SwitchMode, ToggleSwitch, ToggleSwitchConfig};

use pinion_core::error::PinionResult;
use pinion_core::plugins::{Plugin, PluginRegistry};
use tracing::warn;

pub const SWITCHES: &str = "switches";
pub const HEATER: &str = "heater";

/// Register every built-in plugin into an existing factory map.
pub fn register_builtin_plugins(registry: &mut PluginRegistry) -> PinionResult<()> {
    registry.register(SWITCHES, || Box::new(ToggleSwitch::new()) as Box<dyn Plugin>)?;
    registry.register(HEATER, || Box::new(Thermostat::new()) as Box<dyn Plugin>)?;
    Ok(())
}

/// A factory map holding only the built-in plugins.
pub fn builtin_plugins() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    if let Err(e) = register_builtin_plugins(&mut registry) {
        warn!("Built-in plugin registration incomplete: {}", e);
    }
    registry
}
