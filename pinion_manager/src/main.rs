use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "pinion")]
#[command(about = "PINION - digital I/O point controller")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the control loop
    Run {
        /// Configuration file (.json, .yaml or .toml)
        #[arg(short = 'c', long = "config", default_value = "config.json")]
        config: PathBuf,

        /// Use the in-memory pin driver instead of real GPIO
        #[arg(short = 's', long = "simulate")]
        simulate: bool,

        /// Stop after this many iterations
        #[arg(short = 't', long = "ticks", value_name = "N")]
        ticks: Option<u64>,

        /// Debug-level logging
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },

    /// Validate a configuration file and print a summary
    Check {
        /// Configuration file (.json, .yaml or .toml)
        #[arg(short = 'c', long = "config", default_value = "config.json")]
        config: PathBuf,
    },

    /// List the built-in plugin names
    Plugins,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "pinion=debug,pinion_core=debug,pinion_library=debug"
    } else {
        "pinion=info,pinion_core=info,pinion_library=info"
    };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            simulate,
            ticks,
            verbose,
        } => {
            init_tracing(verbose);
            commands::run::execute_run(&config, simulate, ticks)
        }
        Commands::Check { config } => {
            init_tracing(false);
            commands::check::execute_check(&config)
        }
        Commands::Plugins => commands::check::list_plugins(),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
