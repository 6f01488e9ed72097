use pinion_core::error::PinionResult;
use pinion_core::hardware::SimulatedPinDriver;
use pinion_core::plugins::{ModuleState, Plugin, PluginRegistry, Snapshot};
use pinion_core::{AppConfig, ControlLoop, LoopbackGateway, PinionError, PointCategory};
use serde_json::{json, Value};

// BCM lines used by the fixture
const SR_DATA: u8 = 17;
const SR_CLOCK: u8 = 27;
const SR_LATCH: u8 = 22;
const SR_OE: u8 = 23;
const LAMP: u8 = 24;
const BUTTON: u8 = 5;

fn config() -> AppConfig {
    AppConfig::from_json_str(
        &json!({
            "app": { "loopSleepTime": 0.1, "pumpTimeoutMs": 0 },
            "mqtt": { "topicHostName": "shed" },
            "io": {
                "outputs": [
                    { "key": "sr_data", "pin": SR_DATA, "topic": "{topicHostName}/{key}/{action}" },
                    { "key": "sr_clock", "pin": SR_CLOCK },
                    { "key": "sr_latch", "pin": SR_LATCH },
                    { "key": "sr_oe", "pin": SR_OE },
                    { "key": "lamp", "pin": LAMP, "topic": "{topicHostName}/{key}/{action}" },
                    { "key": "valve3", "deviceType": "SR", "shiftRegisterKey": "sr1", "pin": 3,
                      "topic": "{topicHostName}/{key}/{action}" },
                    { "key": "valve9", "deviceType": "SR", "shiftRegisterKey": "sr1", "pin": 9 }
                ],
                "shiftRegisters": [
                    { "key": "sr1", "data": "sr_data", "clock": "sr_clock", "latch": "sr_latch",
                      "oe": "sr_oe", "devices": 2 }
                ],
                "inputs": [
                    { "key": "button", "pin": BUTTON, "pud": "PUD_DOWN", "interval": 3,
                      "topic": "{topicHostName}/{key}/{action}" }
                ],
                "virtuals": [
                    { "key": "mode", "value": 2, "topic": "{topicHostName}/{name}/{action}" }
                ]
            }
        })
        .to_string(),
    )
    .unwrap()
}

fn build(config: &AppConfig, factories: &PluginRegistry) -> ControlLoop<SimulatedPinDriver, LoopbackGateway> {
    let mut control =
        ControlLoop::from_config(config, SimulatedPinDriver::new(), LoopbackGateway::new(), factories).unwrap();
    control.subscribe_commands().unwrap();
    control
}

fn clock_pulses(control: &ControlLoop<SimulatedPinDriver, LoopbackGateway>) -> usize {
    control
        .router()
        .driver()
        .writes_to(SR_CLOCK)
        .into_iter()
        .filter(|&high| high)
        .count()
}

#[test]
fn test_startup_clears_and_enables_banks() {
    let control = build(&config(), &PluginRegistry::new());
    let driver = control.router().driver();

    // Two devices of zeros were shifted out, then OE went low
    assert_eq!(clock_pulses(&control), 16);
    assert_eq!(driver.writes_to(SR_OE), vec![false]);
    assert_eq!(driver.history().last().unwrap().pin, SR_OE);
}

#[test]
fn test_command_sets_bank_bit_and_echoes_state() {
    let mut control = build(&config(), &PluginRegistry::new());
    control.router_mut().driver_mut().clear_history();
    control.gateway_mut().inject("shed/valve3/set", "on");

    let summary = control.tick().unwrap();
    assert_eq!(summary.inbound, 1);

    // Echo on receipt plus the regular state publication when the output ticks
    assert_eq!(control.gateway().published_to("shed/valve3/state"), vec!["1", "1"]);
    assert_eq!(control.router().bank("sr1").unwrap().output_values(), &[0x04, 0x00]);

    // Exactly one flush of both devices this tick
    assert_eq!(clock_pulses(&control), 16);
    assert_eq!(control.router().driver().writes_to(SR_LATCH), vec![false, true]);
}

#[test]
fn test_garbage_command_turns_output_off() {
    let mut control = build(&config(), &PluginRegistry::new());
    control.registry_mut().set_value(PointCategory::Output, "lamp", 1.0).unwrap();
    control.gateway_mut().inject("shed/lamp/set", "maybe");
    control.tick().unwrap();

    assert_eq!(control.registry().value(PointCategory::Output, "lamp").unwrap(), 0.0);
    assert_eq!(control.router().driver().writes_to(LAMP).last(), Some(&false));
}

#[test]
fn test_control_lines_are_never_processed_as_points() {
    let mut control = build(&config(), &PluginRegistry::new());
    let subscriptions: Vec<String> = control.gateway().subscriptions().map(str::to_string).collect();
    assert_eq!(subscriptions, vec!["shed/lamp/set", "shed/valve3/set"]);

    control.tick().unwrap();
    assert!(control.gateway().published_to("shed/sr_data/state").is_empty());
    assert_eq!(control.gateway().published_to("shed/lamp/state"), vec!["0"]);
}

#[test]
fn test_input_interval_and_virtual_publication() {
    let mut control = build(&config(), &PluginRegistry::new());
    control.router_mut().driver_mut().set_input_level(BUTTON, true);

    for _ in 0..6 {
        control.tick().unwrap();
    }
    assert_eq!(control.gateway().published_to("shed/button/state"), vec!["1", "1"]);
    assert_eq!(control.gateway().published_to("shed/mode/state").len(), 6);
}

/// Mirrors the button onto valve9.
struct Mirror;

impl Plugin for Mirror {
    fn init(&mut self, _key: &str, _config: Option<&Value>) -> PinionResult<()> {
        Ok(())
    }

    fn tick(&mut self, snapshot: &mut Snapshot, state: &mut ModuleState) -> PinionResult<bool> {
        let pressed = snapshot
            .input("button")
            .ok_or_else(|| PinionError::plugin("mirror", "button missing"))?;
        snapshot.set_output("valve9", pressed)?;
        state.insert("last".to_string(), json!(pressed));
        Ok(true)
    }
}

/// Tries to write an input, which the snapshot refuses.
struct Vandal;

impl Plugin for Vandal {
    fn init(&mut self, _key: &str, _config: Option<&Value>) -> PinionResult<()> {
        Ok(())
    }

    fn tick(&mut self, snapshot: &mut Snapshot, _state: &mut ModuleState) -> PinionResult<bool> {
        snapshot.set_output("button", 1.0)?;
        Ok(true)
    }
}

/// Switches the lamp on every tick.
struct LampOn;

impl Plugin for LampOn {
    fn init(&mut self, _key: &str, _config: Option<&Value>) -> PinionResult<()> {
        Ok(())
    }

    fn tick(&mut self, snapshot: &mut Snapshot, _state: &mut ModuleState) -> PinionResult<bool> {
        snapshot.set_output("lamp", 1.0)?;
        Ok(true)
    }
}

fn factories() -> PluginRegistry {
    let mut factories = PluginRegistry::new();
    factories.register("mirror", || Box::new(Mirror) as Box<dyn Plugin>).unwrap();
    factories.register("vandal", || Box::new(Vandal) as Box<dyn Plugin>).unwrap();
    factories.register("lamp_on", || Box::new(LampOn) as Box<dyn Plugin>).unwrap();
    factories
}

#[test]
fn test_plugin_write_waits_for_output_tick() {
    let mut config = config();
    config.io.outputs[4].interval = Some(2);
    config.modules = serde_json::from_value(json!([
        { "key": "lamp_on", "name": "lamp_on", "priority": 1, "interval": 1 }
    ]))
    .unwrap();

    let mut control = build(&config, &factories());
    control.router_mut().driver_mut().clear_history();

    // Written back on tick 1, but the lamp output is only due on tick 2
    control.tick().unwrap();
    assert_eq!(control.registry().value(PointCategory::Output, "lamp").unwrap(), 1.0);
    assert!(control.router().driver().writes_to(LAMP).is_empty());

    control.tick().unwrap();
    assert_eq!(control.router().driver().writes_to(LAMP), vec![true]);
}

#[test]
fn test_plugin_output_reaches_hardware_in_same_tick() {
    let mut config = config();
    config.modules = serde_json::from_value(json!([
        { "key": "vandal", "name": "vandal", "priority": 1, "interval": 1 },
        { "key": "mirror", "name": "mirror", "priority": 2, "interval": 3 },
        { "key": "ghost", "name": "unknown_plugin" }
    ]))
    .unwrap();

    let mut control = build(&config, &factories());
    assert_eq!(control.plugins().module_keys(), vec!["vandal", "mirror"]);

    control.router_mut().driver_mut().set_input_level(BUTTON, true);
    let mut reports = Vec::new();
    for _ in 0..3 {
        reports.push(control.tick().unwrap());
    }

    // The input is due on tick 3 and the mirror runs on tick 3, after inputs
    assert_eq!(reports[2].plugins.invoked, vec!["mirror"]);
    assert_eq!(reports[2].plugins.failed, vec!["vandal"]);
    assert_eq!(control.registry().value(PointCategory::Output, "valve9").unwrap(), 1.0);
    assert_eq!(control.router().bank("sr1").unwrap().output_values(), &[0x00, 0x01]);
    assert_eq!(control.registry().value(PointCategory::Input, "button").unwrap(), 1.0);
    assert_eq!(control.plugins().state("mirror").unwrap()["last"], json!(1.0));
}

#[test]
fn test_run_for_ticks_then_shutdown() {
    let mut control = ControlLoop::from_config(
        &config(),
        SimulatedPinDriver::new(),
        LoopbackGateway::new(),
        &PluginRegistry::new(),
    )
    .unwrap();
    control.run_for_ticks(2).unwrap();

    assert_eq!(control.ticks(), 2);
    assert!(!control.is_running());
    assert_eq!(control.router().driver().writes_to(SR_OE), vec![false, true]);
    assert!(control.router().driver().is_released());
    assert!(control.gateway().is_closed());
}

#[test]
fn test_stop_handle_ends_run_immediately() {
    let mut control = ControlLoop::from_config(
        &config(),
        SimulatedPinDriver::new(),
        LoopbackGateway::new(),
        &PluginRegistry::new(),
    )
    .unwrap();
    if let Ok(mut running) = control.stop_handle().lock() {
        *running = false;
    }
    control.run().unwrap();
    assert_eq!(control.ticks(), 0);
}

#[test]
fn test_invalid_config_is_fatal() {
    let mut config = config();
    config.io.outputs[5].pin = 99;
    let result = ControlLoop::from_config(
        &config,
        SimulatedPinDriver::new(),
        LoopbackGateway::new(),
        &PluginRegistry::new(),
    );
    assert!(matches!(result, Err(PinionError::InvalidConfig(_))));
}

#[test]
fn test_legacy_on_off_encoding() {
    let mut config = config();
    config.mqtt.output_encoding = pinion_core::ValueEncoding::OnOff;
    let mut control = build(&config, &PluginRegistry::new());
    control.gateway_mut().inject("shed/lamp/set", "1");
    control.tick().unwrap();

    assert_eq!(control.gateway().published_to("shed/lamp/state"), vec!["on", "on"]);
    // Virtuals stay numeric
    assert_eq!(control.gateway().published_to("shed/mode/state"), vec!["2"]);
}
