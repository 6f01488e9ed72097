//! # Plugin modules
//!
//! Derived behavior (thermostats, toggle switches, interlocks) runs as plugin modules:
//!
//! - **Plugin**: `init` once, `tick` whenever the module's interval expires
//! - **PluginRegistry**: factory map from manifest names to constructors
//! - **PluginRuntime**: priority-ordered chain with short-circuit and failure isolation
//! - **Snapshot**: the point values a tick reads and writes, copied back afterwards

pub mod registry;
pub mod runtime;
pub mod snapshot;
pub mod traits;

pub use registry::PluginRegistry;
pub use runtime::{PluginRuntime, TickReport};
pub use snapshot::{Snapshot, SnapshotPoint};
pub use traits::{ModuleState, Plugin};
