use std::process;

use clap::{Arg, ArgAction, Command};
use log::{error, info};
use tokio::signal;

mod config;
mod daemon;
mod face_manager;
mod service;

use config::Config;
use daemon::Daemon;

const DEFAULT_CONFIG_PATH: &str = "/etc/icn/icnd.toml";

#[tokio::main]
async fn main() {
    let matches = Command::new("icnd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("ICN Daemon - Information-Centric Networking forwarder")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("print-default-config")
                .long("print-default-config")
                .help("Print the default configuration and exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    if matches.get_flag("print-default-config") {
        match Config::default().to_toml() {
            Ok(contents) => print!("{}", contents),
            Err(e) => {
                eprintln!("Failed to render default configuration: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            error!("Failed to load configuration {}: {}", config_path, e);
            process::exit(1);
        }
    };
    init_logging(&config.logging.level);

    info!("Starting ICN Daemon");
    info!("Config file: {}", config_path);

    let mut daemon = Daemon::new(config);

    if let Err(e) = daemon.start().await {
        error!("Failed to start daemon: {:#}", e);
        process::exit(1);
    }

    info!("ICN Daemon started successfully");

    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for ctrl+c: {}", e);
    }

    info!("Shutting down ICN Daemon");
    daemon.stop().await;
}

/// `RUST_LOG` overrides the configured level
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
