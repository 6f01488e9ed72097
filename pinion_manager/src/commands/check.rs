use anyhow::{Context, Result};
use colored::*;
use pinion_core::AppConfig;
use pinion_library::builtin_plugins;
use std::path::Path;

/// Validate a configuration file and print what it declares.
pub fn execute_check(config_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    config.validate()?;

    let factories = builtin_plugins();
    let unknown: Vec<&str> = config
        .modules
        .iter()
        .map(|m| m.name.as_str())
        .filter(|name| !factories.contains(name))
        .collect();

    println!("{} {} is valid", "✓".green(), config_path.display());
    println!("  host:            {}", config.topic_host_name());
    println!("  pin numbering:   {}", config.io.gpio_pin_numbering_mode);
    println!("  inputs:          {}", config.io.inputs.len());
    println!("  outputs:         {}", config.io.outputs.len());
    println!("  virtuals:        {}", config.io.virtuals.len());
    println!("  shift registers: {}", config.io.shift_registers.len());
    println!("  monitors:        {}", config.io.monitors.len());
    println!("  modules:         {}", config.modules.len());
    match &config.mqtt.broker {
        Some(broker) => println!("  broker:          {}:{}", broker.host, broker.port),
        None => println!("  broker:          {}", "none".dimmed()),
    }

    for name in unknown {
        println!("{} plugin '{}' is not built in and will be skipped", "!".yellow(), name);
    }
    Ok(())
}

pub fn list_plugins() -> Result<()> {
    let factories = builtin_plugins();
    println!("{}", "Built-in plugins:".bold());
    for name in factories.names() {
        println!("  {}", name.cyan());
    }
    Ok(())
}
