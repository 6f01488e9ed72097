use pinion_core::error::{PinionError, PinionResult};
use pinion_core::hardware::SENSOR_FAULT;
use pinion_core::plugins::{ModuleState, Plugin, Snapshot};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// A threshold given either as a constant or as the key of a point to read.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Fixed(f64),
    Point(String),
}

impl Threshold {
    fn resolve(&self, snapshot: &Snapshot) -> Option<f64> {
        match self {
            Threshold::Fixed(value) => Some(*value),
            Threshold::Point(key) => snapshot.find_value(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThermostatConfig {
    /// Temperature points (Inputs or Virtuals) averaged into one reading.
    pub sensors: Vec<String>,
    pub setpoint: Threshold,
    /// Hysteresis above the setpoint before heating stops.
    pub band: Threshold,
    /// Output switching the heater.
    pub output: String,
}

/// Two-point heater control with hysteresis.
///
/// Manifest name `heater`. Heats while the averaged temperature is at or below the
/// setpoint and stops once it exceeds `setpoint + band`; in between the output keeps
/// its state. Sensors reporting the fault sentinel are ignored, and with no usable
/// sensor the heater is switched off.
#[derive(Debug, Default)]
pub struct Thermostat {
    key: String,
    config: Option<ThermostatConfig>,
}

impl Thermostat {
    pub fn new() -> Self {
        Self::default()
    }

    fn temperature(config: &ThermostatConfig, snapshot: &Snapshot) -> Option<f64> {
        let readings: Vec<f64> = config
            .sensors
            .iter()
            .filter_map(|key| snapshot.find_value(key))
            .filter(|&t| t > SENSOR_FAULT)
            .collect();
        if readings.is_empty() {
            return None;
        }
        Some(readings.iter().sum::<f64>() / readings.len() as f64)
    }
}

impl Plugin for Thermostat {
    fn init(&mut self, key: &str, config: Option<&Value>) -> PinionResult<()> {
        let raw = config.ok_or_else(|| PinionError::plugin(key, "missing init settings"))?;
        let config: ThermostatConfig =
            serde_json::from_value(raw.clone()).map_err(|e| PinionError::plugin(key, e))?;
        if config.sensors.is_empty() {
            return Err(PinionError::plugin(key, "at least one sensor is required"));
        }
        self.key = key.to_string();
        self.config = Some(config);
        Ok(())
    }

    fn tick(&mut self, snapshot: &mut Snapshot, state: &mut ModuleState) -> PinionResult<bool> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| PinionError::plugin(&self.key, "not initialized"))?;

        let setpoint = config
            .setpoint
            .resolve(snapshot)
            .ok_or_else(|| PinionError::plugin(&self.key, "setpoint point not found"))?;
        let band = config
            .band
            .resolve(snapshot)
            .ok_or_else(|| PinionError::plugin(&self.key, "band point not found"))?;

        let Some(temperature) = Self::temperature(config, snapshot) else {
            warn!("Thermostat '{}' has no valid sensor reading, heater off", self.key);
            snapshot.set_output(&config.output, 0.0)?;
            state.insert("temperature".to_string(), Value::Null);
            return Ok(true);
        };

        if temperature <= setpoint {
            snapshot.set_output(&config.output, 1.0)?;
        } else if temperature > setpoint + band {
            snapshot.set_output(&config.output, 0.0)?;
        }

        debug!(
            "Thermostat '{}': {:.2} (setpoint {:.2}, band {:.2})",
            self.key, temperature, setpoint, band
        );
        state.insert("temperature".to_string(), json!(temperature));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pinion_core::{Output, Point, PointCategory, PointRegistry, Virtual};

    fn registry(temperatures: &[f64]) -> PointRegistry {
        let mut registry = PointRegistry::new();
        for (i, &t) in temperatures.iter().enumerate() {
            registry
                .register(Virtual::new(Point::new(format!("t{}", i + 1)).with_value(t)))
                .unwrap();
        }
        registry
            .register(Virtual::new(Point::new("heater_setpoint").with_value(20.0)))
            .unwrap();
        registry.register(Output::direct(Point::new("heater"), 17)).unwrap();
        registry
    }

    fn thermostat(sensors: usize) -> Thermostat {
        let keys: Vec<String> = (1..=sensors).map(|i| format!("t{}", i)).collect();
        let mut thermostat = Thermostat::new();
        thermostat
            .init(
                "heat",
                Some(&json!({
                    "sensors": keys,
                    "setpoint": "heater_setpoint",
                    "band": 0.5,
                    "output": "heater"
                })),
            )
            .unwrap();
        thermostat
    }

    fn run(thermostat: &mut Thermostat, registry: &mut PointRegistry, state: &mut ModuleState) -> f64 {
        let mut snapshot = Snapshot::capture(registry);
        assert!(thermostat.tick(&mut snapshot, state).unwrap());
        snapshot.write_back(registry);
        registry.value(PointCategory::Output, "heater").unwrap()
    }

    fn set_temperature(registry: &mut PointRegistry, t: f64) {
        registry.set_value(PointCategory::Virtual, "t1", t).unwrap();
    }

    #[test]
    fn test_hysteresis() {
        let mut registry = registry(&[19.0]);
        let mut state = ModuleState::new();
        let mut thermostat = thermostat(1);

        assert_eq!(run(&mut thermostat, &mut registry, &mut state), 1.0);

        // Inside the band the heater keeps its state
        set_temperature(&mut registry, 20.3);
        assert_eq!(run(&mut thermostat, &mut registry, &mut state), 1.0);

        set_temperature(&mut registry, 20.6);
        assert_eq!(run(&mut thermostat, &mut registry, &mut state), 0.0);

        set_temperature(&mut registry, 20.2);
        assert_eq!(run(&mut thermostat, &mut registry, &mut state), 0.0);

        set_temperature(&mut registry, 20.0);
        assert_eq!(run(&mut thermostat, &mut registry, &mut state), 1.0);
    }

    #[test]
    fn test_faulty_sensor_ignored_in_average() {
        let mut registry = registry(&[19.0, SENSOR_FAULT, 21.0]);
        let mut state = ModuleState::new();
        let mut thermostat = thermostat(3);

        assert_eq!(run(&mut thermostat, &mut registry, &mut state), 1.0);
        assert_relative_eq!(state["temperature"].as_f64().unwrap(), 20.0);
    }

    #[test]
    fn test_no_valid_sensor_turns_heater_off() {
        let mut registry = registry(&[SENSOR_FAULT]);
        registry.set_value(PointCategory::Output, "heater", 1.0).unwrap();
        let mut state = ModuleState::new();
        let mut thermostat = thermostat(1);

        assert_eq!(run(&mut thermostat, &mut registry, &mut state), 0.0);
        assert_eq!(state["temperature"], Value::Null);
    }

    #[test]
    fn test_missing_setpoint_point_is_an_error() {
        let mut thermostat = Thermostat::new();
        thermostat
            .init(
                "heat",
                Some(&json!({ "sensors": ["t1"], "setpoint": "nope", "band": 1, "output": "heater" })),
            )
            .unwrap();
        let mut snapshot = Snapshot::capture(&registry(&[18.0]));
        assert!(thermostat.tick(&mut snapshot, &mut ModuleState::new()).is_err());
    }

    #[test]
    fn test_init_requires_sensors() {
        let mut thermostat = Thermostat::new();
        let settings = json!({ "sensors": [], "setpoint": 20, "band": 1, "output": "heater" });
        assert!(thermostat.init("heat", Some(&settings)).is_err());
    }
}
