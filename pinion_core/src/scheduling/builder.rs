//! Assembles a ready-to-run control loop from a validated configuration.

use tracing::info;

use super::control_loop::{ControlLoop, LoopSettings};
use crate::communication::MessageGateway;
use crate::config::{AppConfig, InputDeviceType, OutputDeviceType};
use crate::core::{Input, Output, Point, PointRegistry, Virtual};
use crate::error::{PinionError, PinionResult};
use crate::hardware::{OneWireBus, PinDriver, PinNumbering};
use crate::host::HostMonitor;
use crate::io::{ControlLines, IoRouter, ShiftRegister};
use crate::plugins::{PluginRegistry, PluginRuntime};

fn point(key: &str, name: Option<&str>, description: Option<&str>, topic: Option<&str>, interval: Option<u32>) -> Point {
    let mut point = Point::new(key).with_interval(interval);
    if let Some(name) = name {
        point = point.with_name(name);
    }
    if let Some(description) = description {
        point = point.with_description(description);
    }
    if let Some(topic) = topic {
        point = point.with_topic(topic);
    }
    point
}

fn bcm_pin(numbering: PinNumbering, key: &str, pin: u32) -> PinionResult<u8> {
    numbering.to_bcm(pin).ok_or_else(|| {
        PinionError::config(format!("'{}': pin {} is not a GPIO in {} numbering", key, pin, numbering))
    })
}

impl<D: PinDriver, G: MessageGateway> ControlLoop<D, G> {
    /// Validate `config`, configure the hardware and load plugin modules.
    ///
    /// Banks are cleared and enabled before the loop is returned. Unknown plugin
    /// names and failed plugin inits are logged and skipped.
    pub fn from_config(
        config: &AppConfig,
        driver: D,
        gateway: G,
        factories: &PluginRegistry,
    ) -> PinionResult<Self> {
        config.validate()?;
        let numbering = config.io.gpio_pin_numbering_mode;

        let mut router =
            IoRouter::new(driver).with_one_wire_bus(OneWireBus::new(&config.io.one_wire_path));
        let mut registry = PointRegistry::new();

        // Outputs first: bank control lines refer to them
        for entry in &config.io.outputs {
            let point = point(
                &entry.key,
                entry.name.as_deref(),
                entry.description.as_deref(),
                entry.topic.as_deref(),
                entry.interval,
            )
            .with_value(entry.value);

            let output = match entry.device_type {
                OutputDeviceType::Direct => {
                    let pin = bcm_pin(numbering, &entry.key, entry.pin)?;
                    router.setup_output(pin)?;
                    Output::direct(point, pin)
                }
                OutputDeviceType::SerialBank => {
                    let bank = entry.shift_register_key.as_deref().ok_or_else(|| {
                        PinionError::config(format!("'{}': SR output needs shiftRegisterKey", entry.key))
                    })?;
                    Output::serial_bank(point, bank, entry.pin)
                }
            };
            registry.register(output)?;
        }

        for entry in &config.io.shift_registers {
            let line = |output_key: &str| -> PinionResult<u8> {
                registry
                    .output(output_key)?
                    .direct_pin()
                    .ok_or_else(|| PinionError::config(format!("'{}' is not a GPIO output", output_key)))
            };

            let mut lines = ControlLines::new(line(&entry.data)?, line(&entry.clock)?, line(&entry.latch)?);
            if let Some(oe) = &entry.output_enable {
                lines = lines.with_output_enable(line(oe)?);
            }
            if let Some(clear) = &entry.clear {
                lines = lines.with_clear(line(clear)?);
            }

            let bits = u8::try_from(entry.outputs_per_device)
                .map_err(|_| PinionError::config(format!("'{}': outputsPerDevice too large", entry.key)))?;
            router.add_bank(ShiftRegister::new(&entry.key, lines, entry.devices as usize, bits)?)?;
        }

        for entry in &config.io.inputs {
            let point = point(
                &entry.key,
                entry.name.as_deref(),
                entry.description.as_deref(),
                entry.topic.as_deref(),
                entry.interval,
            );

            let input = match entry.device_type {
                InputDeviceType::Gpio => {
                    let configured = entry
                        .pin
                        .ok_or_else(|| PinionError::config(format!("'{}': GPIO input needs a pin", entry.key)))?;
                    let pin = bcm_pin(numbering, &entry.key, configured)?;
                    router.setup_input(pin, entry.pud)?;
                    Input::gpio(point, pin, entry.pud)
                }
                InputDeviceType::OneWire => {
                    let device = entry.device.as_deref().ok_or_else(|| {
                        PinionError::config(format!("'{}': ONEWIRE input needs a device id", entry.key))
                    })?;
                    Input::one_wire(point, device)
                }
            };
            registry.register(input)?;
        }

        for entry in &config.io.virtuals {
            let point = point(
                &entry.key,
                entry.name.as_deref(),
                entry.description.as_deref(),
                entry.topic.as_deref(),
                entry.interval,
            )
            .with_value(entry.value);
            registry.register(Virtual::new(point))?;
        }

        router.initialize_banks()?;

        let mut plugins = PluginRuntime::new();
        plugins.load(&config.modules, factories);

        let monitors = config
            .io
            .monitors
            .iter()
            .map(HostMonitor::from_config)
            .collect::<PinionResult<Vec<_>>>()?;

        let settings = LoopSettings {
            sleep: config.loop_sleep(),
            pump_timeout: config.pump_timeout(),
            topic_host_name: config.topic_host_name(),
            output_encoding: config.mqtt.output_encoding,
        };
        info!(
            "Built control loop for '{}' with {} shift register(s) and {} monitor(s)",
            settings.topic_host_name,
            router.banks().len(),
            monitors.len()
        );

        Ok(ControlLoop::new(registry, router, plugins, gateway, settings).with_monitors(monitors))
    }
}
