//! Host metrics published on their own interval.

use regex::Regex;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Command;
use sysinfo::{Disks, System};
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::core::{render_topic, Interval, TopicAction};
use crate::error::{PinionError, PinionResult};
use crate::hardware::OneWireBus;

/// `cmd` value selecting a built-in collector.
pub const INTERNAL_COMMAND: &str = "[internal]";

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorCommand {
    /// Run a program and publish its standard output.
    Program { program: String, args: Vec<String> },
    /// Total, used and free bytes of the filesystem holding a path.
    DiskUsage { path: PathBuf },
    /// Total, used and free memory in bytes.
    Memory,
    /// 1, 5 and 15 minute load averages.
    LoadAverage,
    /// Temperature of a one-wire sensor.
    OneWire { device: String },
}

impl MonitorCommand {
    pub fn parse(name: &str, cmd: &str, params: Option<&str>) -> PinionResult<Self> {
        let params = params.unwrap_or("").replace("{name}", name);
        let mut words = params.split_whitespace();

        if cmd != INTERNAL_COMMAND {
            return Ok(MonitorCommand::Program {
                program: cmd.to_string(),
                args: words.map(str::to_string).collect(),
            });
        }

        match words.next() {
            Some("diskusage") => Ok(MonitorCommand::DiskUsage {
                path: PathBuf::from(words.next().unwrap_or("/")),
            }),
            Some("memory") => Ok(MonitorCommand::Memory),
            Some("loadavg") => Ok(MonitorCommand::LoadAverage),
            Some("onewire") => match words.next() {
                Some(device) => Ok(MonitorCommand::OneWire {
                    device: device.to_string(),
                }),
                None => Err(PinionError::config(format!(
                    "monitor '{}': onewire needs a device id",
                    name
                ))),
            },
            other => Err(PinionError::config(format!(
                "monitor '{}': unknown internal command {:?}",
                name, other
            ))),
        }
    }
}

/// A published host metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorReading {
    pub name: String,
    pub topic: Option<String>,
    pub payload: String,
}

pub struct HostMonitor {
    name: String,
    command: MonitorCommand,
    topic: Option<String>,
    interval: Interval,
    pattern: Option<Regex>,
    group: usize,
}

impl HostMonitor {
    pub fn from_config(config: &MonitorConfig) -> PinionResult<Self> {
        let pattern = config
            .regex
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| PinionError::config(format!("monitor '{}': {}", config.name, e)))?;

        Ok(Self {
            name: config.name.clone(),
            command: MonitorCommand::parse(&config.name, &config.cmd, config.params.as_deref())?,
            topic: config.topic.clone(),
            interval: Interval::new(config.interval),
            pattern,
            group: config.regex_group,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &MonitorCommand {
        &self.command
    }

    /// Collect the metric when due. Collection failures are logged and yield nothing.
    pub fn tick(&mut self, host: &str, one_wire: &OneWireBus) -> Option<MonitorReading> {
        if !self.interval.expired() {
            return None;
        }

        let raw = match self.collect(one_wire) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Monitor '{}' failed: {}", self.name, e);
                return None;
            }
        };

        let payload = match &self.pattern {
            Some(pattern) => match pattern.captures(&raw).and_then(|c| c.get(self.group)) {
                Some(m) => m.as_str().to_string(),
                None => {
                    warn!("Monitor '{}': output did not match its regex", self.name);
                    return None;
                }
            },
            None => raw.trim().to_string(),
        };

        debug!("Monitor '{}' = {}", self.name, payload);
        Some(MonitorReading {
            name: self.name.clone(),
            topic: self
                .topic
                .as_deref()
                .map(|t| render_topic(t, &self.name, &self.name, TopicAction::State, host)),
            payload,
        })
    }

    fn collect(&self, one_wire: &OneWireBus) -> PinionResult<String> {
        match &self.command {
            MonitorCommand::Program { program, args } => {
                let output = Command::new(program).args(args).output()?;
                if !output.status.success() {
                    return Err(PinionError::config(format!(
                        "'{}' exited with {}",
                        program, output.status
                    )));
                }
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            MonitorCommand::DiskUsage { path } => disk_usage(path),
            MonitorCommand::Memory => {
                let mut system = System::new();
                system.refresh_memory();
                let total = system.total_memory();
                let used = system.used_memory();
                Ok(json!({ "total": total, "used": used, "free": total.saturating_sub(used) }).to_string())
            }
            MonitorCommand::LoadAverage => {
                let load = System::load_average();
                Ok(json!({ "one": load.one, "five": load.five, "fifteen": load.fifteen }).to_string())
            }
            MonitorCommand::OneWire { device } => Ok(one_wire.read_temperature(device).to_string()),
        }
    }
}

fn disk_usage(path: &Path) -> PinionResult<String> {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .ok_or_else(|| PinionError::config(format!("no filesystem mounted at {}", path.display())))?;

    let total = disk.total_space();
    let free = disk.available_space();
    Ok(json!({
        "path": path.display().to_string(),
        "total": total,
        "used": total.saturating_sub(free),
        "free": free,
    })
    .to_string())
}
