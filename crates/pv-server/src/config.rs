//! Server configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables, then command-line flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use clap::Parser;
use pv_core::ZoomSettings;
use pv_data::CsvOptions;
use serde::{Deserialize, Serialize};

/// Command-line flags
#[derive(Debug, Default, Parser)]
#[command(name = "plotviewer", version, about = "Serve CSV series, views and saved zooms")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// Folder where uploaded CSV files are stored
    #[arg(long)]
    pub csv_dir: Option<PathBuf>,

    /// SQLite database file; records are kept in memory when unset
    #[arg(long)]
    pub database: Option<PathBuf>,
}

/// Where records are persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Sqlite { path: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory
    }
}

/// Settings handed to the chart client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Pause between replay steps, e.g. "300ms"
    pub replay_step_delay: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            replay_step_delay: "300ms".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn zoom_settings(&self) -> Result<ZoomSettings> {
        let delay: Duration = humantime::parse_duration(&self.replay_step_delay)
            .with_context(|| format!("invalid replay_step_delay '{}'", self.replay_step_delay))?;
        Ok(ZoomSettings {
            replay_step_delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        })
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub csv_dir: PathBuf,
    /// Mimetype an upload must declare to be accepted
    pub csv_mimetype: String,
    pub max_upload_bytes: usize,
    pub storage: StorageConfig,
    pub csv: CsvOptions,
    pub client: ClientConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            csv_dir: PathBuf::from("data/csv"),
            csv_mimetype: "text/csv".to_string(),
            max_upload_bytes: 64 * 1024 * 1024,
            storage: StorageConfig::default(),
            csv: CsvOptions::default(),
            client: ClientConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build the effective configuration for `cli`
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_cli(cli);
        config.client.zoom_settings()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Apply environment overrides read through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = var("CSV_FILE_FOLDER") {
            self.csv_dir = PathBuf::from(dir);
        }
        if let Some(mimetype) = var("CSV_MIMETYPE") {
            self.csv_mimetype = mimetype;
        }
        if let Some(port) = var("PORT") {
            let port: u16 = port.parse().with_context(|| format!("invalid PORT '{port}'"))?;
            self.bind.set_port(port);
        }
        if let Some(path) = var("DATABASE_PATH") {
            self.storage = StorageConfig::Sqlite { path: PathBuf::from(path) };
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(bind) = cli.bind {
            self.bind = bind;
        }
        if let Some(dir) = &cli.csv_dir {
            self.csv_dir = dir.clone();
        }
        if let Some(path) = &cli.database {
            self.storage = StorageConfig::Sqlite { path: path.clone() };
        }
    }
}
