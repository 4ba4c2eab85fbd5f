//! TOML configuration for the KPI ETL pipeline

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration, loaded from a TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    pub source: SourceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

/// Identity provider and secret store settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub tenant_id: String,
    pub client_id: String,
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub secret: SecretConfig,
}

/// Where the client secret is resolved from
#[derive(Debug, Clone, Deserialize)]
pub struct SecretConfig {
    #[serde(default = "default_secret_service")]
    pub service: String,
    #[serde(default)]
    pub backend: SecretBackend,
    /// Secret file location, only used by the `file` backend
    pub path: Option<PathBuf>,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            service: default_secret_service(),
            backend: SecretBackend::default(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    #[default]
    Keyring,
    Env,
    File,
}

/// Document-store location of the KPI workbook
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub site_id: String,
    pub drive_id: String,
    /// Drive-relative path, e.g. "KPI Reporting/Dashboard KPI Data.xlsx"
    pub file_path: String,
    #[serde(default = "default_graph_base")]
    pub base_url: String,
}

/// Relational engine and staging target
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_staging_table")]
    pub staging_table: String,
    #[serde(default = "default_procedure")]
    pub transform_procedure: String,
}

/// Log sink destination and rotation policy
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log file path; stderr when unset
    pub path: Option<PathBuf>,
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
    #[serde(default = "default_backup_count")]
    pub backup_count: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_size_bytes: default_max_size_bytes(),
            backup_count: default_backup_count(),
        }
    }
}

fn default_authority() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_scope() -> String {
    "https://graph.microsoft.com/.default".to_string()
}

fn default_secret_service() -> String {
    "kpi-etl".to_string()
}

fn default_graph_base() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_staging_table() -> String {
    "dashboard_kpi_staging".to_string()
}

fn default_procedure() -> String {
    "load_dashboard_kpi".to_string()
}

fn default_max_size_bytes() -> u64 {
    50_000
}

fn default_backup_count() -> u32 {
    3
}

impl Config {
    /// Load configuration from the given path, or the default location when
    /// none is supplied
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

/// Default config location: `<config dir>/kpi-etl/config.toml`
fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine a config directory")?;
    Ok(base.join("kpi-etl").join("config.toml"))
}
