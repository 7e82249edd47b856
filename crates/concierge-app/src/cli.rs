//! Command-line arguments for the concierge binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use concierge_core::ConciergeConfig;

const DEFAULT_CONFIG_FILE: &str = "concierge.toml";

/// Experience concierge - grounded travel recommendations over WebSocket.
#[derive(Parser, Debug, Default)]
#[command(name = "concierge", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Address to bind.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// Catalog CSV file.
    #[arg(long = "catalog")]
    pub catalog: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Priority: --config flag > CONCIERGE_CONFIG env var > ./concierge.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(std::env::var("CONCIERGE_CONFIG").ok())
    }

    fn resolve_config_path_with(&self, env: Option<String>) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        match env {
            Some(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Priority: --port flag > CONCIERGE_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        self.resolve_port_with(std::env::var("CONCIERGE_PORT").ok(), config_port)
    }

    fn resolve_port_with(&self, env: Option<String>, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        env.and_then(|val| val.parse::<u16>().ok())
            .unwrap_or(config_port)
    }

    /// Fold every override into the loaded configuration.
    pub fn apply(&self, config: &mut ConciergeConfig) {
        config.server.port = self.resolve_port(config.server.port);
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(ref catalog) = self.catalog {
            config.catalog.csv_path = catalog.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}
