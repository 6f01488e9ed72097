use pinion_core::hardware::SimulatedPinDriver;
use pinion_core::{AppConfig, ControlLoop, LoopbackGateway, PointCategory};
use pinion_library::builtin_plugins;
use serde_json::json;
use std::fs;
use std::path::Path;

const HEATER: u8 = 24;
const BUTTON: u8 = 5;

fn write_sensor(dir: &Path, millidegrees: i32) {
    let device = dir.join("28-00000a1b2c3d");
    fs::create_dir_all(&device).unwrap();
    fs::write(
        device.join("w1_slave"),
        format!("4b 01 : crc=de YES\n4b 01 t={}\n", millidegrees),
    )
    .unwrap();
}

fn config(w1_dir: &Path) -> AppConfig {
    AppConfig::from_json_str(
        &json!({
            "app": { "pumpTimeoutMs": 0 },
            "mqtt": { "topicHostName": "greenhouse" },
            "io": {
                "oneWirePath": w1_dir.display().to_string(),
                "inputs": [
                    { "key": "air", "deviceType": "ONEWIRE", "device": "28-00000a1b2c3d",
                      "topic": "{topicHostName}/{key}/{action}" },
                    { "key": "button", "pin": BUTTON, "pud": "PUD_DOWN" }
                ],
                "outputs": [
                    { "key": "heater", "pin": HEATER, "topic": "{topicHostName}/{key}/{action}" },
                    { "key": "d", "pin": 17 }, { "key": "c", "pin": 27 }, { "key": "l", "pin": 22 },
                    { "key": "fan", "deviceType": "SR", "shiftRegisterKey": "sr", "pin": 2 }
                ],
                "shiftRegisters": [ { "key": "sr", "data": "d", "clock": "c", "latch": "l", "devices": 1 } ],
                "virtuals": [
                    { "key": "heater_setpoint", "value": 20.0 },
                    { "key": "heater_pb", "value": 0.5 }
                ]
            },
            "modules": [
                { "key": "heat", "name": "heater", "priority": 10, "interval": 1,
                  "init": { "sensors": ["air"], "setpoint": "heater_setpoint", "band": "heater_pb", "output": "heater" } },
                { "key": "fan_button", "name": "switches", "priority": 20, "interval": 1,
                  "init": { "input": "button", "output": "fan" } }
            ]
        })
        .to_string(),
    )
    .unwrap()
}

fn build(config: &AppConfig) -> ControlLoop<SimulatedPinDriver, LoopbackGateway> {
    ControlLoop::from_config(config, SimulatedPinDriver::new(), LoopbackGateway::new(), &builtin_plugins()).unwrap()
}

#[test]
fn test_heater_follows_one_wire_temperature() {
    let dir = tempfile::tempdir().unwrap();
    write_sensor(dir.path(), 18_500);
    let mut control = build(&config(dir.path()));
    assert_eq!(control.plugins().module_keys(), vec!["heat", "fan_button"]);

    control.tick().unwrap();
    assert_eq!(control.gateway().published_to("greenhouse/air/state"), vec!["18.5"]);
    assert_eq!(control.router().driver().writes_to(HEATER), vec![true]);

    write_sensor(dir.path(), 21_000);
    control.tick().unwrap();
    assert_eq!(control.router().driver().writes_to(HEATER), vec![true, false]);
    assert_eq!(control.gateway().published_to("greenhouse/heater/state"), vec!["1", "0"]);
}

#[test]
fn test_missing_sensor_keeps_heater_off() {
    let dir = tempfile::tempdir().unwrap();
    let mut control = build(&config(dir.path()));

    control.tick().unwrap();
    assert_eq!(control.gateway().published_to("greenhouse/air/state"), vec!["-1000"]);
    assert_eq!(control.registry().value(PointCategory::Output, "heater").unwrap(), 0.0);
}

#[test]
fn test_button_toggles_bank_output() {
    let dir = tempfile::tempdir().unwrap();
    write_sensor(dir.path(), 22_000);
    let mut control = build(&config(dir.path()));

    control.router_mut().driver_mut().set_input_level(BUTTON, true);
    control.tick().unwrap();
    assert_eq!(control.router().bank("sr").unwrap().output_values(), &[0b0000_0010]);

    // Still held: no change
    control.tick().unwrap();
    assert_eq!(control.router().bank("sr").unwrap().output_values(), &[0b0000_0010]);

    control.router_mut().driver_mut().set_input_level(BUTTON, false);
    control.tick().unwrap();
    control.router_mut().driver_mut().set_input_level(BUTTON, true);
    control.tick().unwrap();
    assert_eq!(control.router().bank("sr").unwrap().output_values(), &[0]);
}

#[test]
fn test_bad_init_skips_module_but_keeps_others() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.modules[0].init = Some(json!({ "sensors": "not-a-list" }));
    let control = build(&config);
    assert_eq!(control.plugins().module_keys(), vec!["fan_button"]);
}
