//! Host metric collection (disk, memory, load, one-wire, external programs).

pub mod monitor;

pub use monitor::{HostMonitor, MonitorCommand, MonitorReading, INTERNAL_COMMAND};
