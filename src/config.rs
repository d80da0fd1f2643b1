// src/config.rs

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{env, fmt, fs, path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/";
pub const DEFAULT_MATRIX_TAB: &str = "Prazos SAP";

/// Runtime configuration: optional YAML file (`MATRIZ_CONFIG`) overlaid by env vars.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub spreadsheet_id: String,
    pub sheets_api_base: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub port: u16,
    pub cache_ttl_secs: u64,
    pub use_mirror: bool,
    pub mirror_path: PathBuf,
    pub matrix_tab: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheets_api_base: DEFAULT_SHEETS_API_BASE.to_string(),
            api_key: None,
            access_token: None,
            port: 8000,
            cache_ttl_secs: 300,
            use_mirror: false,
            mirror_path: PathBuf::from("mirror/matriz.parquet"),
            matrix_tab: DEFAULT_MATRIX_TAB.to_string(),
            log_level: "info".to_string(),
        }
    }
}

// credentials stay out of logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("sheets_api_base", &self.sheets_api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("port", &self.port)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("use_mirror", &self.use_mirror)
            .field("mirror_path", &self.mirror_path)
            .field("matrix_tab", &self.matrix_tab)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load from `MATRIZ_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self> {
        let base = match env::var("MATRIZ_CONFIG") {
            Ok(path) => Self::from_yaml_file(&path)?,
            Err(_) => Self::default(),
        };
        let cfg = base.with_overrides(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config file {}", path))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing config file {}", path))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply environment overrides through `lookup` so tests need not touch the real env.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GOOGLE_SHEETS_SPREADSHEET_ID") {
            self.spreadsheet_id = v;
        }
        if let Some(v) = lookup("SHEETS_API_BASE") {
            self.sheets_api_base = v;
        }
        if let Some(v) = lookup("GOOGLE_SHEETS_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = lookup("GOOGLE_SHEETS_ACCESS_TOKEN") {
            self.access_token = Some(v);
        }
        if let Some(v) = lookup("PORT") {
            self.port = parse_var("PORT", &v)?;
        }
        if let Some(v) = lookup("CACHE_TTL_SECS") {
            self.cache_ttl_secs = parse_var("CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("USE_DB_FOR_MATRIX") {
            self.use_mirror = v.trim().eq_ignore_ascii_case("true");
        }
        if let Some(v) = lookup("MATRIX_MIRROR_PATH") {
            self.mirror_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("MATRIX_TAB") {
            self.matrix_tab = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log_level = v;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.spreadsheet_id.trim().is_empty() {
            bail!("GOOGLE_SHEETS_SPREADSHEET_ID is not set");
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid value for {}: {:?} ({})", name, raw, e))
}
