use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = "inventory.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct CollectorSection {
    pub timeout_ms: Option<u64>,
    pub ssh_user: Option<String>,
    pub ssh_port: Option<u16>,
    pub ssh_connect_timeout_s: Option<u64>,
    #[serde(default)]
    pub local_aliases: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct BulkSection {
    pub concurrency: Option<usize>,
    pub qps: Option<u32>,
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub report_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub database: Option<DatabaseConfig>,
    pub collector: Option<CollectorSection>,
    pub bulk: Option<BulkSection>,
    pub logging: Option<LoggingSection>,
}

/// Load `path`, or `./inventory.yaml` if it exists. A missing default file
/// is not an error; an explicit path that cannot be read or parsed is.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(Config::default()); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading config {}", path.display()))?;
    serde_yaml::from_str(&s).with_context(|| format!("parsing config {}", path.display()))
}

impl Config {
    pub fn database_path(&self) -> PathBuf {
        self.database.as_ref().and_then(|d| d.path.clone()).unwrap_or_else(|| PathBuf::from("inventory.db"))
    }

    pub fn collector(&self) -> CollectorSection {
        self.collector.clone().unwrap_or_default()
    }

    pub fn bulk(&self) -> BulkSection {
        self.bulk.clone().unwrap_or_default()
    }

    pub fn log_level(&self) -> String {
        self.logging.as_ref().and_then(|l| l.level.clone()).unwrap_or_else(|| "info".to_string())
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging.as_ref().and_then(|l| l.file.clone())
    }
}
