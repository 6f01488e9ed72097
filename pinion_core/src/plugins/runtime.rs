//! Priority-ordered execution of plugin modules over a shared snapshot.

use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

use super::registry::PluginRegistry;
use super::snapshot::Snapshot;
use super::traits::{ModuleState, Plugin};
use crate::config::ModuleConfig;
use crate::core::{Interval, PointRegistry};
use crate::error::{PinionError, PinionResult};

/// A loaded, initialized module.
struct ModuleInstance {
    key: String,
    plugin_name: String,
    priority: u32,
    interval: Interval,
    plugin: Box<dyn Plugin>,
    failures: u64,
}

/// What happened during one plugin phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Modules whose tick ran to completion, in execution order.
    pub invoked: Vec<String>,
    /// Modules whose tick returned an error or panicked.
    pub failed: Vec<String>,
    /// Module that returned `false` and ended the chain.
    pub stopped_by: Option<String>,
    /// Registry values changed by write-back.
    pub written_back: usize,
}

/// Loaded modules sorted by priority plus the persisted-state arena.
///
/// Lower priority numbers run first; equal priorities keep registration order.
#[derive(Default)]
pub struct PluginRuntime {
    modules: Vec<ModuleInstance>,
    states: HashMap<String, ModuleState>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl PluginRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate every manifest entry the factory knows.
    ///
    /// Unknown names and failed inits are logged and skipped. Returns the number of
    /// modules loaded.
    pub fn load(&mut self, manifest: &[ModuleConfig], factories: &PluginRegistry) -> usize {
        let mut loaded = 0;
        for entry in manifest {
            let Some(plugin) = factories.create(&entry.name) else {
                warn!(
                    "Skipping module '{}': no plugin named '{}'",
                    entry.key, entry.name
                );
                continue;
            };

            match self.add(entry, plugin) {
                Ok(()) => loaded += 1,
                Err(e) => error!("Skipping module '{}': {}", entry.key, e),
            }
        }

        info!(
            "Loaded {} of {} plugin module(s): [{}]",
            loaded,
            manifest.len(),
            self.module_keys().join(", ")
        );
        loaded
    }

    /// Initialize a module and place it in priority order.
    pub fn add(&mut self, entry: &ModuleConfig, mut plugin: Box<dyn Plugin>) -> PinionResult<()> {
        if self.modules.iter().any(|m| m.key == entry.key) {
            return Err(PinionError::duplicate("Module", entry.key.as_str()));
        }

        let init: Option<&Value> = entry.init.as_ref();
        match catch_unwind(AssertUnwindSafe(|| plugin.init(&entry.key, init))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(PinionError::plugin(entry.key.as_str(), format!("init failed: {}", e))),
            Err(panic) => {
                return Err(PinionError::plugin(
                    entry.key.as_str(),
                    format!("init panicked: {}", panic_message(panic.as_ref())),
                ))
            }
        }

        debug!(
            "Module '{}' ({}) ready: priority {}, every {} tick(s)",
            entry.key, entry.name, entry.priority, entry.interval
        );
        self.modules.push(ModuleInstance {
            key: entry.key.clone(),
            plugin_name: entry.name.clone(),
            priority: entry.priority,
            interval: Interval::new(Some(entry.interval)),
            plugin,
            failures: 0,
        });
        self.modules.sort_by_key(|m| m.priority);
        self.states.entry(entry.key.clone()).or_default();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Module keys in execution order.
    pub fn module_keys(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.key.as_str()).collect()
    }

    /// Manifest plugin name behind a module key.
    pub fn plugin_name(&self, key: &str) -> Option<&str> {
        self.modules
            .iter()
            .find(|m| m.key == key)
            .map(|m| m.plugin_name.as_str())
    }

    /// Total failed ticks of a module.
    pub fn failures(&self, key: &str) -> Option<u64> {
        self.modules.iter().find(|m| m.key == key).map(|m| m.failures)
    }

    pub fn state(&self, key: &str) -> Option<&ModuleState> {
        self.states.get(key)
    }

    /// Run the chain over an existing snapshot.
    ///
    /// A failing module is skipped for this tick and the chain continues; a module
    /// returning `false` ends the chain.
    pub fn execute(&mut self, snapshot: &mut Snapshot) -> TickReport {
        let mut report = TickReport::default();

        for module in self.modules.iter_mut() {
            if !module.interval.expired() {
                continue;
            }

            let state = self.states.entry(module.key.clone()).or_default();
            let plugin = &mut module.plugin;
            let outcome = catch_unwind(AssertUnwindSafe(|| plugin.tick(snapshot, state)));

            match outcome {
                Ok(Ok(true)) => report.invoked.push(module.key.clone()),
                Ok(Ok(false)) => {
                    debug!("Module '{}' stopped the plugin chain", module.key);
                    report.invoked.push(module.key.clone());
                    report.stopped_by = Some(module.key.clone());
                    break;
                }
                Ok(Err(e)) => {
                    module.failures += 1;
                    warn!("Module '{}' tick failed: {}", module.key, e);
                    report.failed.push(module.key.clone());
                }
                Err(panic) => {
                    module.failures += 1;
                    error!(
                        "Module '{}' panicked: {}",
                        module.key,
                        panic_message(panic.as_ref())
                    );
                    report.failed.push(module.key.clone());
                }
            }
        }

        report
    }

    /// Snapshot the registry, run the chain, then write Outputs and Virtuals back.
    pub fn tick(&mut self, registry: &mut PointRegistry) -> TickReport {
        let mut snapshot = Snapshot::capture(registry);
        let mut report = self.execute(&mut snapshot);
        report.written_back = snapshot.write_back(registry);
        report
    }
}
