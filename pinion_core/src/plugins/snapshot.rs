//! Per-tick view of every point, shared by the whole plugin chain.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::core::{is_truthy, PointCategory, PointRegistry};
use crate::error::{PinionError, PinionResult};

/// A point as seen by plugins.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPoint {
    pub key: String,
    pub name: String,
    pub value: f64,
}

/// Copy of every point value taken at the start of the plugin phase.
///
/// Plugins read all three categories and may write Outputs and Virtuals. Nothing
/// reaches the registry until [`Snapshot::write_back`]. The `variables` map is scratch
/// space shared by all modules of one tick.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    inputs: BTreeMap<String, SnapshotPoint>,
    outputs: BTreeMap<String, SnapshotPoint>,
    virtuals: BTreeMap<String, SnapshotPoint>,
    variables: Map<String, Value>,
}

impl Snapshot {
    pub fn capture(registry: &PointRegistry) -> Self {
        fn entry(key: &str, name: &str, value: f64) -> (String, SnapshotPoint) {
            (
                key.to_string(),
                SnapshotPoint {
                    key: key.to_string(),
                    name: name.to_string(),
                    value,
                },
            )
        }

        Self {
            inputs: registry
                .inputs()
                .map(|i| entry(&i.point.key, &i.point.name, i.point.value))
                .collect(),
            outputs: registry
                .outputs()
                .map(|o| entry(&o.point.key, &o.point.name, o.point.value))
                .collect(),
            virtuals: registry
                .virtuals()
                .map(|v| entry(&v.point.key, &v.point.name, v.point.value))
                .collect(),
            variables: Map::new(),
        }
    }

    fn table(&self, category: PointCategory) -> &BTreeMap<String, SnapshotPoint> {
        match category {
            PointCategory::Input => &self.inputs,
            PointCategory::Output => &self.outputs,
            PointCategory::Virtual => &self.virtuals,
        }
    }

    pub fn get(&self, category: PointCategory, key: &str) -> Option<&SnapshotPoint> {
        self.table(category).get(key)
    }

    pub fn value(&self, category: PointCategory, key: &str) -> Option<f64> {
        self.get(category, key).map(|p| p.value)
    }

    /// Value of an Input, Output or Virtual (searched in that order).
    pub fn find_value(&self, key: &str) -> Option<f64> {
        PointCategory::ALL
            .iter()
            .find_map(|&category| self.value(category, key))
    }

    pub fn input(&self, key: &str) -> Option<f64> {
        self.value(PointCategory::Input, key)
    }

    pub fn output(&self, key: &str) -> Option<f64> {
        self.value(PointCategory::Output, key)
    }

    pub fn virtual_value(&self, key: &str) -> Option<f64> {
        self.value(PointCategory::Virtual, key)
    }

    pub fn set_output(&mut self, key: &str, value: f64) -> PinionResult<()> {
        let point = self
            .outputs
            .get_mut(key)
            .ok_or_else(|| PinionError::not_found(PointCategory::Output, key))?;
        point.value = value;
        Ok(())
    }

    pub fn set_virtual(&mut self, key: &str, value: f64) -> PinionResult<()> {
        let point = self
            .virtuals
            .get_mut(key)
            .ok_or_else(|| PinionError::not_found(PointCategory::Virtual, key))?;
        point.value = value;
        Ok(())
    }

    /// Flip an output between 0 and 1, returning the new value.
    pub fn toggle_output(&mut self, key: &str) -> PinionResult<f64> {
        let current = self
            .output(key)
            .ok_or_else(|| PinionError::not_found(PointCategory::Output, key))?;
        let next = if is_truthy(current) { 0.0 } else { 1.0 };
        self.set_output(key, next)?;
        Ok(next)
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.variables
    }

    /// Copy Output and Virtual values back into the registry.
    ///
    /// Returns how many registry values changed. Inputs are never written back.
    pub fn write_back(&self, registry: &mut PointRegistry) -> usize {
        let mut changed = 0;
        for (category, table) in [
            (PointCategory::Output, &self.outputs),
            (PointCategory::Virtual, &self.virtuals),
        ] {
            for point in table.values() {
                if let Ok(current) = registry.get_mut(category, &point.key) {
                    if current.value != point.value {
                        current.value = point.value;
                        changed += 1;
                    }
                }
            }
        }
        changed
    }
}
