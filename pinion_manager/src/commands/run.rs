use anyhow::{bail, Context, Result};
use colored::*;
use pinion_core::communication::{LoopbackGateway, MessageGateway};
use pinion_core::hardware::{PinDriver, SimulatedPinDriver};
use pinion_core::config::BrokerConfig;
use pinion_core::{AppConfig, ControlLoop};
use pinion_library::builtin_plugins;
use std::path::Path;
use tracing::{info, warn};

/// Load the configuration, wire up hardware and messaging, and run until stopped.
pub fn execute_run(config_path: &Path, simulate: bool, ticks: Option<u64>) -> Result<()> {
    let config = AppConfig::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let driver = pin_driver(simulate)?;
    let gateway = gateway(&config)?;
    let factories = builtin_plugins();

    let mut control = ControlLoop::from_config(&config, driver, gateway, &factories)
        .context("failed to build the control loop")?;

    let running = control.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("{}", "\nCtrl+C received! Shutting down PINION...".red());
        if let Ok(mut r) = running.lock() {
            *r = false;
        }
    }) {
        eprintln!("Warning: Failed to set signal handler: {}", e);
    }

    println!(
        "{} PINION running as '{}' ({} module(s))",
        "→".cyan(),
        control.settings().topic_host_name.bold(),
        control.plugins().len()
    );

    let outcome = match ticks {
        Some(limit) => control.run_for_ticks(limit),
        None => control.run(),
    };
    outcome.context("control loop failed")?;

    println!("{} Stopped after {} tick(s)", "✓".green(), control.ticks());
    Ok(())
}

fn pin_driver(simulate: bool) -> Result<Box<dyn PinDriver>> {
    if simulate {
        info!("Using the simulated pin driver");
        return Ok(Box::new(SimulatedPinDriver::new()));
    }
    hardware_driver()
}

#[cfg(feature = "raspberry-pi")]
fn hardware_driver() -> Result<Box<dyn PinDriver>> {
    let driver = pinion_core::RppalPinDriver::new().context("cannot open the GPIO controller")?;
    Ok(Box::new(driver))
}

#[cfg(not(feature = "raspberry-pi"))]
fn hardware_driver() -> Result<Box<dyn PinDriver>> {
    bail!("built without the `raspberry-pi` feature; pass --simulate to run without GPIO")
}

fn gateway(config: &AppConfig) -> Result<Box<dyn MessageGateway>> {
    match &config.mqtt.broker {
        Some(broker) => connect_broker(config, broker),
        None => {
            warn!("No broker configured; messages stay local");
            Ok(Box::new(LoopbackGateway::new()))
        }
    }
}

#[cfg(feature = "mqtt")]
fn connect_broker(config: &AppConfig, broker: &BrokerConfig) -> Result<Box<dyn MessageGateway>> {
    let client_id = broker
        .client_id
        .clone()
        .unwrap_or_else(|| format!("pinion-{}", config.topic_host_name()));
    let gateway = pinion_core::MqttGateway::connect(broker, &client_id)
        .with_context(|| format!("cannot connect to {}:{}", broker.host, broker.port))?;
    Ok(Box::new(gateway))
}

#[cfg(not(feature = "mqtt"))]
fn connect_broker(_config: &AppConfig, broker: &BrokerConfig) -> Result<Box<dyn MessageGateway>> {
    warn!(
        "Broker {}:{} configured but MQTT support is not built in; messages stay local",
        broker.host, broker.port
    );
    Ok(Box::new(LoopbackGateway::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CONFIG: &str = r#"{
        "mqtt": { "topicHostName": "bench" },
        "app": { "loopSleepTime": 0.1, "pumpTimeoutMs": 0 },
        "io": {
            "outputs": [ { "key": "lamp", "pin": 24, "topic": "{topicHostName}/{key}/{action}" } ],
            "virtuals": [ { "key": "mode", "value": 1 } ]
        }
    }"#;

    #[test]
    fn test_simulated_run_with_tick_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, CONFIG).unwrap();
        execute_run(&path, true, Some(2)).unwrap();
    }

    #[test]
    fn test_missing_config_reports_path() {
        let err = execute_run(Path::new("/nonexistent/pinion.json"), true, Some(1)).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/pinion.json"));
    }

    #[cfg(not(feature = "raspberry-pi"))]
    #[test]
    fn test_real_gpio_requires_feature() {
        assert!(pin_driver(false).is_err());
    }
}
