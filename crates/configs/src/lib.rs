use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub worker_threads: Option<usize>,
    /// Directory served for paths outside the JSON API; `None` disables it.
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            worker_threads: Some(4),
            static_dir: default_static_dir(),
        }
    }
}

fn default_static_dir() -> Option<String> { Some("frontend".into()) }

/// Which tabular medium holds the listings.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Xlsx,
    Sheets,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" | "excel" => Ok(Self::Xlsx),
            "sheets" | "google" => Ok(Self::Sheets),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown storage backend `{other}` (expected xlsx, sheets or memory)")),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Xlsx => "xlsx",
            Self::Sheets => "sheets",
            Self::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub xlsx: XlsxConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct XlsxConfig {
    pub path: String,
    pub sheet_name: String,
    pub include_visitado: bool,
}

impl Default for XlsxConfig {
    fn default() -> Self {
        Self {
            path: "public/Deptos.xlsx".into(),
            sheet_name: "Sheet1".into(),
            include_visitado: false,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub api_base: String,
    pub include_visitado: bool,
    pub timeout_secs: u64,
    /// Inline service-account key (the JSON document itself).
    pub service_account_json: Option<String>,
    /// Path to a service-account key file.
    pub service_account_path: Option<String>,
    /// Pre-issued OAuth access token; takes precedence over service-account keys.
    pub access_token: Option<String>,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_name: "Propiedades".into(),
            api_base: "https://sheets.googleapis.com".into(),
            include_visitado: true,
            timeout_secs: 30,
            service_account_json: None,
            service_account_path: None,
            access_token: None,
        }
    }
}

impl fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("SheetsConfig")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("sheet_name", &self.sheet_name)
            .field("api_base", &self.api_base)
            .field("include_visitado", &self.include_visitado)
            .field("timeout_secs", &self.timeout_secs)
            .field("service_account_json", &redact(&self.service_account_json))
            .field("service_account_path", &self.service_account_path)
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}

/// Where Google credentials come from once the config is validated.
#[derive(Clone, PartialEq, Eq)]
pub enum SheetsCredentials {
    AccessToken(String),
    ServiceAccountJson(String),
    ServiceAccountFile(String),
}

impl SheetsConfig {
    /// Resolve credentials by precedence: access token, inline key, key file.
    pub fn credentials(&self) -> Option<SheetsCredentials> {
        let non_empty = |v: &Option<String>| v.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        if let Some(token) = non_empty(&self.access_token) {
            return Some(SheetsCredentials::AccessToken(token));
        }
        if let Some(json) = non_empty(&self.service_account_json) {
            return Some(SheetsCredentials::ServiceAccountJson(json));
        }
        non_empty(&self.service_account_path).map(SheetsCredentials::ServiceAccountFile)
    }
}

/// Load the TOML file named by `CONFIG_PATH` (default `config.toml`).
/// A missing file is not an error: defaults apply and env vars fill the rest.
pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&path).exists() {
        return Ok(AppConfig::default());
    }
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    load_from_str(&content).with_context(|| format!("parsing {path}"))
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.apply_env_overrides()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from a key lookup; env var names match the deployment docs.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            self.server.port = port.parse().with_context(|| format!("SERVER_PORT `{port}` is not a port"))?;
        }
        if let Some(threads) = lookup("TOKIO_WORKER_THREADS") {
            self.server.worker_threads = threads.parse().ok();
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            self.server.static_dir = Some(dir).filter(|d| !d.trim().is_empty());
        }
        if let Some(backend) = lookup("STORAGE_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(path) = lookup("EXCEL_PATH") {
            self.storage.xlsx.path = path;
        }
        if let Some(sheet) = lookup("EXCEL_SHEET") {
            self.storage.xlsx.sheet_name = sheet;
        }
        let sheets = &mut self.storage.sheets;
        if let Some(id) = lookup("GOOGLE_SHEET_ID") {
            sheets.spreadsheet_id = id;
        }
        if let Some(name) = lookup("GOOGLE_SHEET_NAME") {
            sheets.sheet_name = name;
        }
        if let Some(base) = lookup("GOOGLE_SHEETS_API_BASE") {
            sheets.api_base = base;
        }
        if let Some(json) = lookup("GOOGLE_SERVICE_ACCOUNT_JSON") {
            sheets.service_account_json = Some(json);
        }
        if let Some(path) = lookup("GOOGLE_APPLICATION_CREDENTIALS") {
            sheets.service_account_path = Some(path);
        }
        if let Some(token) = lookup("GOOGLE_SHEETS_ACCESS_TOKEN") {
            sheets.access_token = Some(token);
        }
        Ok(())
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.storage.normalize_and_validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        match self.worker_threads {
            Some(w) if w > 0 => {}
            _ => self.worker_threads = Some(4),
        }
        Ok(())
    }
}

impl StorageConfig {
    fn normalize_and_validate(&mut self) -> Result<()> {
        match self.backend {
            StorageBackend::Xlsx => {
                if self.xlsx.path.trim().is_empty() {
                    return Err(anyhow!("storage.xlsx.path is empty; set it in config.toml or EXCEL_PATH"));
                }
                if self.xlsx.sheet_name.trim().is_empty() {
                    self.xlsx.sheet_name = XlsxConfig::default().sheet_name;
                }
            }
            StorageBackend::Sheets => {
                let s = &mut self.sheets;
                if s.spreadsheet_id.trim().is_empty() {
                    return Err(anyhow!("storage.sheets.spreadsheet_id is empty; set it in config.toml or GOOGLE_SHEET_ID"));
                }
                if s.sheet_name.trim().is_empty() {
                    s.sheet_name = SheetsConfig::default().sheet_name;
                }
                s.api_base = s.api_base.trim_end_matches('/').to_string();
                if !(s.api_base.starts_with("http://") || s.api_base.starts_with("https://")) {
                    return Err(anyhow!("storage.sheets.api_base must start with http(s)"));
                }
                if s.timeout_secs == 0 {
                    s.timeout_secs = SheetsConfig::default().timeout_secs;
                }
                if s.credentials().is_none() {
                    return Err(anyhow!(
                        "no Google credentials: set GOOGLE_SHEETS_ACCESS_TOKEN, GOOGLE_SERVICE_ACCOUNT_JSON or GOOGLE_APPLICATION_CREDENTIALS"
                    ));
                }
            }
            StorageBackend::Memory => {}
        }
        Ok(())
    }
}
