//! Typed controller configuration.
//!
//! Loaded once at startup from JSON, YAML or TOML and validated as a whole: every
//! problem is collected into one [`PinionError::InvalidConfig`] report.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::communication::ValueEncoding;
use crate::error::{PinionError, PinionResult};
use crate::hardware::{PinNumbering, Pull, DEFAULT_W1_PATH};
use crate::io::{DEFAULT_BITS_PER_DEVICE, MAX_BITS_PER_DEVICE, MAX_DEVICES};

/// Shortest loop sleep accepted, in seconds.
pub const MIN_LOOP_SLEEP_SECS: f64 = 0.1;

pub const DEFAULT_MODULE_PRIORITY: u32 = 1000;
pub const DEFAULT_MODULE_INTERVAL: u32 = 10;

fn default_loop_sleep() -> f64 {
    0.2
}

fn default_pump_timeout_ms() -> u64 {
    10
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    60
}

fn default_bits_per_device() -> u32 {
    u32::from(DEFAULT_BITS_PER_DEVICE)
}

fn default_module_priority() -> u32 {
    DEFAULT_MODULE_PRIORITY
}

fn default_module_interval() -> u32 {
    DEFAULT_MODULE_INTERVAL
}

fn default_one_wire_path() -> String {
    DEFAULT_W1_PATH.to_string()
}

fn default_regex_group() -> usize {
    1
}

/// Whole controller configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub io: IoSection,
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSection {
    /// Seconds slept at the end of every loop iteration.
    #[serde(default = "default_loop_sleep")]
    pub loop_sleep_time: f64,
    /// Upper bound on time spent servicing the broker per iteration.
    #[serde(default = "default_pump_timeout_ms")]
    pub pump_timeout_ms: u64,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            loop_sleep_time: default_loop_sleep(),
            pump_timeout_ms: default_pump_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttSection {
    /// Value of `{topicHostName}`; the machine host name when absent.
    #[serde(default)]
    pub topic_host_name: Option<String>,
    #[serde(default)]
    pub output_encoding: ValueEncoding,
    /// No broker means the controller runs offline.
    #[serde(default)]
    pub broker: Option<BrokerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
    /// Keep-alive in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            keep_alive: default_keep_alive(),
            username: None,
            password: None,
            client_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoSection {
    #[serde(default)]
    pub gpio_pin_numbering_mode: PinNumbering,
    #[serde(default = "default_one_wire_path")]
    pub one_wire_path: String,
    #[serde(default)]
    pub inputs: Vec<InputConfig>,
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
    #[serde(default)]
    pub virtuals: Vec<VirtualConfig>,
    #[serde(default)]
    pub shift_registers: Vec<ShiftRegisterConfig>,
    #[serde(default)]
    pub monitors: Vec<MonitorConfig>,
}

impl Default for IoSection {
    fn default() -> Self {
        Self {
            gpio_pin_numbering_mode: PinNumbering::default(),
            one_wire_path: default_one_wire_path(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            virtuals: Vec::new(),
            shift_registers: Vec::new(),
            monitors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputDeviceType {
    #[default]
    #[serde(rename = "GPIO")]
    Gpio,
    #[serde(rename = "ONEWIRE")]
    OneWire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputDeviceType {
    #[default]
    #[serde(rename = "GPIO")]
    Direct,
    #[serde(rename = "SR")]
    SerialBank,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputConfig {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub device_type: InputDeviceType,
    #[serde(default)]
    pub pin: Option<u32>,
    #[serde(default)]
    pub pud: Pull,
    /// One-wire device id, e.g. `28-0000075a1c2b`.
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub interval: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub device_type: OutputDeviceType,
    pub pin: u32,
    #[serde(default)]
    pub shift_register_key: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub interval: Option<u32>,
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualConfig {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub interval: Option<u32>,
    #[serde(default)]
    pub value: f64,
}

/// A shift-register bank. Control lines name Direct outputs by key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftRegisterConfig {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    pub data: String,
    pub clock: String,
    pub latch: String,
    #[serde(default, alias = "oe")]
    pub output_enable: Option<String>,
    #[serde(default)]
    pub clear: Option<String>,
    pub devices: u32,
    #[serde(default = "default_bits_per_device")]
    pub outputs_per_device: u32,
}

impl ShiftRegisterConfig {
    /// `(role, output key)` for every control line.
    pub fn control_lines(&self) -> Vec<(&'static str, &str)> {
        let mut lines = vec![
            ("data", self.data.as_str()),
            ("clock", self.clock.as_str()),
            ("latch", self.latch.as_str()),
        ];
        if let Some(oe) = &self.output_enable {
            lines.push(("outputEnable", oe.as_str()));
        }
        if let Some(clear) = &self.clear {
            lines.push(("clear", clear.as_str()));
        }
        lines
    }
}

/// Manifest entry for one plugin module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConfig {
    pub key: String,
    /// Plugin implementation name, looked up in the plugin factory.
    pub name: String,
    #[serde(default = "default_module_priority")]
    pub priority: u32,
    #[serde(default = "default_module_interval")]
    pub interval: u32,
    /// Opaque settings handed to the plugin's `init`.
    #[serde(default)]
    pub init: Option<Value>,
}

impl ModuleConfig {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            priority: DEFAULT_MODULE_PRIORITY,
            interval: DEFAULT_MODULE_INTERVAL,
            init: None,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_init(mut self, init: Value) -> Self {
        self.init = Some(init);
        self
    }
}

/// A host metric published on its own interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    pub name: String,
    /// Program to run, or `[internal]` for built-in collectors.
    pub cmd: String,
    #[serde(default)]
    pub params: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub interval: Option<u32>,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default = "default_regex_group")]
    pub regex_group: usize,
}

impl AppConfig {
    /// Load a configuration file, choosing the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> PinionResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            PinionError::config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        debug!("Loading configuration from {}", path.display());

        match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            Some("toml") => Self::from_toml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }

    pub fn from_json_str(contents: &str) -> PinionResult<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn from_yaml_str(contents: &str) -> PinionResult<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_toml_str(contents: &str) -> PinionResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn loop_sleep(&self) -> Duration {
        let secs = self.app.loop_sleep_time;
        if secs.is_finite() {
            Duration::from_secs_f64(secs.max(MIN_LOOP_SLEEP_SECS))
        } else {
            Duration::from_secs_f64(MIN_LOOP_SLEEP_SECS)
        }
    }

    pub fn pump_timeout(&self) -> Duration {
        Duration::from_millis(self.app.pump_timeout_ms)
    }

    /// Value of `{topicHostName}`: configured, else the machine host name.
    pub fn topic_host_name(&self) -> String {
        if let Some(name) = &self.mqtt.topic_host_name {
            return name.clone();
        }
        match hostname::get() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                warn!("Cannot determine host name ({}), using 'localhost'", e);
                "localhost".to_string()
            }
        }
    }

    /// Check the whole configuration, reporting every problem at once.
    pub fn validate(&self) -> PinionResult<()> {
        let mut problems = Vec::new();
        let numbering = self.io.gpio_pin_numbering_mode;

        if !self.app.loop_sleep_time.is_finite() || self.app.loop_sleep_time < MIN_LOOP_SLEEP_SECS {
            problems.push(format!(
                "app.loopSleepTime must be a finite number >= {}, got {}",
                MIN_LOOP_SLEEP_SECS, self.app.loop_sleep_time
            ));
        }

        let mut bank_keys = HashSet::new();
        for (i, bank) in self.io.shift_registers.iter().enumerate() {
            let at = format!("shiftRegisters[{}] '{}'", i, bank.key);
            check_key(&mut problems, &at, &bank.key);
            if !bank.key.is_empty() && !bank_keys.insert(bank.key.as_str()) {
                problems.push(format!("{}: duplicate shift register key", at));
            }
            if bank.devices < 1 {
                problems.push(format!("{}: devices must be >= 1", at));
            } else if bank.devices as usize > MAX_DEVICES {
                problems.push(format!(
                    "{}: devices must be <= {}, got {}",
                    at, MAX_DEVICES, bank.devices
                ));
            }
            if bank.outputs_per_device < u32::from(DEFAULT_BITS_PER_DEVICE)
                || bank.outputs_per_device > u32::from(MAX_BITS_PER_DEVICE)
            {
                problems.push(format!(
                    "{}: outputsPerDevice must be {}, got {}",
                    at, MAX_BITS_PER_DEVICE, bank.outputs_per_device
                ));
            }
            for (role, output_key) in bank.control_lines() {
                let line = self
                    .io
                    .outputs
                    .iter()
                    .find(|o| o.key == output_key);
                match line {
                    None => problems.push(format!(
                        "{}: {} line '{}' is not a defined output",
                        at, role, output_key
                    )),
                    Some(o) if o.device_type != OutputDeviceType::Direct => problems.push(format!(
                        "{}: {} line '{}' must be a GPIO output",
                        at, role, output_key
                    )),
                    Some(_) => {}
                }
            }
        }

        let mut output_keys = HashSet::new();
        for (i, output) in self.io.outputs.iter().enumerate() {
            let at = format!("outputs[{}] '{}'", i, output.key);
            check_key(&mut problems, &at, &output.key);
            if !output.key.is_empty() && !output_keys.insert(output.key.as_str()) {
                problems.push(format!("{}: duplicate output key", at));
            }
            check_interval(&mut problems, &at, output.interval);

            match output.device_type {
                OutputDeviceType::Direct => check_direct_pin(&mut problems, &at, numbering, output.pin),
                OutputDeviceType::SerialBank => {
                    let bank = output
                        .shift_register_key
                        .as_deref()
                        .and_then(|key| self.io.shift_registers.iter().find(|b| b.key == key));
                    match (output.shift_register_key.as_deref(), bank) {
                        (None, _) => problems.push(format!("{}: SR output needs shiftRegisterKey", at)),
                        (Some(key), None) => {
                            problems.push(format!("{}: shift register '{}' is not defined", at, key))
                        }
                        (Some(_), Some(bank)) => match bank.devices.checked_mul(bank.outputs_per_device) {
                            Some(capacity) if output.pin < 1 || output.pin > capacity => {
                                problems.push(format!(
                                    "{}: pin {} outside 1..={} of shift register '{}'",
                                    at, output.pin, capacity, bank.key
                                ))
                            }
                            Some(_) => {}
                            None => problems.push(format!(
                                "{}: shift register '{}' has too many outputs to address",
                                at, bank.key
                            )),
                        },
                    }
                }
            }
        }

        let mut input_keys = HashSet::new();
        for (i, input) in self.io.inputs.iter().enumerate() {
            let at = format!("inputs[{}] '{}'", i, input.key);
            check_key(&mut problems, &at, &input.key);
            if !input.key.is_empty() && !input_keys.insert(input.key.as_str()) {
                problems.push(format!("{}: duplicate input key", at));
            }
            check_interval(&mut problems, &at, input.interval);

            match input.device_type {
                InputDeviceType::Gpio => match input.pin {
                    Some(pin) => check_direct_pin(&mut problems, &at, numbering, pin),
                    None => problems.push(format!("{}: GPIO input needs a pin", at)),
                },
                InputDeviceType::OneWire => {
                    if input.device.as_deref().map_or(true, str::is_empty) {
                        problems.push(format!("{}: ONEWIRE input needs a device id", at));
                    }
                }
            }
        }

        let mut virtual_keys = HashSet::new();
        for (i, virtual_point) in self.io.virtuals.iter().enumerate() {
            let at = format!("virtuals[{}] '{}'", i, virtual_point.key);
            check_key(&mut problems, &at, &virtual_point.key);
            if !virtual_point.key.is_empty() && !virtual_keys.insert(virtual_point.key.as_str()) {
                problems.push(format!("{}: duplicate virtual key", at));
            }
            check_interval(&mut problems, &at, virtual_point.interval);
        }

        let mut module_keys = HashSet::new();
        for (i, module) in self.modules.iter().enumerate() {
            let at = format!("modules[{}] '{}'", i, module.key);
            check_key(&mut problems, &at, &module.key);
            if !module.key.is_empty() && !module_keys.insert(module.key.as_str()) {
                problems.push(format!("{}: duplicate module key", at));
            }
            if module.name.is_empty() {
                problems.push(format!("{}: name must not be empty", at));
            }
            if module.priority < 1 {
                problems.push(format!("{}: priority must be >= 1", at));
            }
            if module.interval < 1 {
                problems.push(format!("{}: interval must be >= 1", at));
            }
        }

        for (i, monitor) in self.io.monitors.iter().enumerate() {
            let at = format!("monitors[{}] '{}'", i, monitor.name);
            check_key(&mut problems, &at, &monitor.name);
            check_interval(&mut problems, &at, monitor.interval);
            if let Some(pattern) = &monitor.regex {
                if let Err(e) = regex::Regex::new(pattern) {
                    problems.push(format!("{}: invalid regex: {}", at, e));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(PinionError::InvalidConfig(problems))
        }
    }
}

fn check_key(problems: &mut Vec<String>, at: &str, key: &str) {
    if key.trim().is_empty() {
        problems.push(format!("{}: key must not be empty", at));
    }
}

fn check_interval(problems: &mut Vec<String>, at: &str, interval: Option<u32>) {
    if interval == Some(0) {
        problems.push(format!("{}: interval must be >= 1", at));
    }
}

fn check_direct_pin(problems: &mut Vec<String>, at: &str, numbering: PinNumbering, pin: u32) {
    if numbering.to_bcm(pin).is_none() {
        problems.push(format!("{}: pin {} is not a GPIO in {} numbering", at, pin, numbering));
    }
}
