use pinion_core::core::is_truthy;
use pinion_core::error::{PinionError, PinionResult};
use pinion_core::plugins::{ModuleState, Plugin, Snapshot};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// What a press does to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchMode {
    /// Flip the output on every press.
    #[default]
    Toggle,
    /// Force the output on.
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToggleSwitchConfig {
    /// Input watched for rising edges.
    pub input: String,
    /// Output driven on a press.
    pub output: String,
    #[serde(default)]
    pub mode: SwitchMode,
}

/// Momentary push button acting on an output.
///
/// Manifest name `switches`. The last seen input level is kept in the module's
/// persisted state under `lastInput`, so only rising edges act.
///
/// ```json
/// { "key": "hall_light", "name": "switches", "priority": 10, "interval": 1,
///   "init": { "input": "hall_button", "output": "hall_lamp", "mode": "toggle" } }
/// ```
#[derive(Debug, Default)]
pub struct ToggleSwitch {
    key: String,
    config: Option<ToggleSwitchConfig>,
}

impl ToggleSwitch {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for ToggleSwitch {
    fn init(&mut self, key: &str, config: Option<&Value>) -> PinionResult<()> {
        let raw = config.ok_or_else(|| PinionError::plugin(key, "missing init settings"))?;
        let config: ToggleSwitchConfig =
            serde_json::from_value(raw.clone()).map_err(|e| PinionError::plugin(key, e))?;
        self.key = key.to_string();
        self.config = Some(config);
        Ok(())
    }

    fn tick(&mut self, snapshot: &mut Snapshot, state: &mut ModuleState) -> PinionResult<bool> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| PinionError::plugin(&self.key, "not initialized"))?;

        let level = snapshot
            .input(&config.input)
            .ok_or_else(|| PinionError::plugin(&self.key, format!("input '{}' not found", config.input)))?;
        let pressed = is_truthy(level);
        let was_pressed = state.get("lastInput").and_then(Value::as_bool).unwrap_or(false);
        state.insert("lastInput".to_string(), json!(pressed));

        if pressed && !was_pressed {
            let value = match config.mode {
                SwitchMode::Toggle => snapshot.toggle_output(&config.output)?,
                SwitchMode::Set => {
                    snapshot.set_output(&config.output, 1.0)?;
                    1.0
                }
            };
            debug!("Switch '{}' drove '{}' to {}", self.key, config.output, value);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinion_core::hardware::Pull;
    use pinion_core::{Input, Output, Point, PointCategory, PointRegistry};

    fn registry(button: f64) -> PointRegistry {
        let mut registry = PointRegistry::new();
        registry
            .register(Input::gpio(Point::new("button").with_value(button), 5, Pull::Down))
            .unwrap();
        registry.register(Output::direct(Point::new("lamp"), 17)).unwrap();
        registry
    }

    fn switch(mode: &str) -> ToggleSwitch {
        let mut switch = ToggleSwitch::new();
        switch
            .init(
                "hall",
                Some(&json!({ "input": "button", "output": "lamp", "mode": mode })),
            )
            .unwrap();
        switch
    }

    fn press(switch: &mut ToggleSwitch, registry: &mut PointRegistry, state: &mut ModuleState, level: f64) {
        registry.get_mut(PointCategory::Input, "button").unwrap().value = level;
        let mut snapshot = Snapshot::capture(registry);
        assert!(switch.tick(&mut snapshot, state).unwrap());
        snapshot.write_back(registry);
    }

    #[test]
    fn test_toggles_on_rising_edge_only() {
        let mut registry = registry(0.0);
        let mut state = ModuleState::new();
        let mut switch = switch("toggle");

        press(&mut switch, &mut registry, &mut state, 1.0);
        assert_eq!(registry.value(PointCategory::Output, "lamp").unwrap(), 1.0);

        // Holding the button does nothing
        press(&mut switch, &mut registry, &mut state, 1.0);
        assert_eq!(registry.value(PointCategory::Output, "lamp").unwrap(), 1.0);

        press(&mut switch, &mut registry, &mut state, 0.0);
        press(&mut switch, &mut registry, &mut state, 1.0);
        assert_eq!(registry.value(PointCategory::Output, "lamp").unwrap(), 0.0);
    }

    #[test]
    fn test_set_mode_latches_on() {
        let mut registry = registry(0.0);
        let mut state = ModuleState::new();
        let mut switch = switch("set");

        for level in [1.0, 0.0, 1.0] {
            press(&mut switch, &mut registry, &mut state, level);
        }
        assert_eq!(registry.value(PointCategory::Output, "lamp").unwrap(), 1.0);
        assert_eq!(state["lastInput"], json!(true));
    }

    #[test]
    fn test_init_rejects_bad_settings() {
        let mut switch = ToggleSwitch::new();
        assert!(switch.init("x", None).is_err());
        assert!(switch.init("x", Some(&json!({ "input": "button" }))).is_err());
        assert!(switch
            .init("x", Some(&json!({ "input": "b", "output": "o", "mode": "blink" })))
            .is_err());
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let mut switch = ToggleSwitch::new();
        switch
            .init("x", Some(&json!({ "input": "nope", "output": "lamp" })))
            .unwrap();
        let mut snapshot = Snapshot::capture(&registry(1.0));
        assert!(switch.tick(&mut snapshot, &mut ModuleState::new()).is_err());
    }
}
