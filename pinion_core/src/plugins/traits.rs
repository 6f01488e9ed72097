//! The contract every plugin module implements.

use serde_json::{Map, Value};

use super::snapshot::Snapshot;
use crate::error::PinionResult;

/// Per-module state that survives between ticks, owned by the runtime.
pub type ModuleState = Map<String, Value>;

/// A derived-behavior module run by the plugin runtime.
///
/// ## Lifecycle
///
/// 1. Created by the factory registered under its manifest `name`
/// 2. `init()` is called once with the module key and the manifest's `init` blob;
///    an error removes the module for the rest of the run
/// 3. `tick()` is called whenever the module's interval expires, in priority order
///
/// `tick` returning `Ok(false)` stops lower-priority modules from running this tick.
/// Values written to the snapshot reach the point registry after the whole chain ran.
pub trait Plugin {
    fn init(&mut self, key: &str, config: Option<&Value>) -> PinionResult<()>;

    fn tick(&mut self, snapshot: &mut Snapshot, state: &mut ModuleState) -> PinionResult<bool>;
}
