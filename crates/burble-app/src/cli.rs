//! CLI argument definitions for the burble binary.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Burble, an embeddable voice and chat assistant widget.
#[derive(Parser, Debug)]
#[command(name = "burble", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Backend gateway base URL.
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// Tenant schema name.
    #[arg(long = "schema")]
    pub schema: Option<String>,

    /// Agent code to talk to.
    #[arg(long = "agent")]
    pub agent: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > BURBLE_CONFIG env var > ~/.burble/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("BURBLE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the gateway base URL.
    ///
    /// Priority: --base-url flag > BURBLE_BASE_URL env var > config file value.
    pub fn resolve_base_url(&self, config_value: &str) -> String {
        if let Some(ref url) = self.base_url {
            return url.clone();
        }
        if let Ok(url) = std::env::var("BURBLE_BASE_URL") {
            return url;
        }
        config_value.to_string()
    }

    /// Resolve the tenant schema name.
    pub fn resolve_schema(&self, config_value: &str) -> String {
        self.schema
            .clone()
            .unwrap_or_else(|| config_value.to_string())
    }

    /// Resolve the agent code.
    pub fn resolve_agent(&self, config_value: &str) -> String {
        self.agent
            .clone()
            .unwrap_or_else(|| config_value.to_string())
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_value: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_value.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".burble").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".burble").join("config.toml");
    }
    PathBuf::from("config.toml")
}
