use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PopgateError, Result};
use crate::model::SiteSettings;

pub const CONFIG_FILE_NAME: &str = "popgate.toml";

/// Longest accepted `store.record_ttl_seconds` (100 years).
pub const MAX_RECORD_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl Config {
    /// Layered load: defaults, then the global and project files (or a single
    /// explicit file), then `POPGATE_*` environment overrides.
    pub fn load(explicit_path: Option<&Path>, project_dir: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("POPGATE_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            let patch = Self::load_patch(&path)?.ok_or_else(|| {
                PopgateError::MissingConfig(format!("config file not found: {}", path.display()))
            })?;
            config.merge_patch(patch);
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_patch(&project_dir.join(CONFIG_FILE_NAME))? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Parse a config document on top of the defaults.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let patch = toml::from_str(raw)
            .map_err(|err| PopgateError::Config(format!("parse config: {err}")))?;
        let mut config = Self::default();
        config.merge_patch(patch);
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot be used.
    pub fn validate(&self) -> Result<()> {
        self.store.record_ttl().map(|_| ())
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("popgate/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| PopgateError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| PopgateError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.server {
            self.server.merge(patch);
        }
        if let Some(patch) = patch.store {
            self.store.merge(patch);
        }
        if let Some(patch) = patch.settings {
            self.settings.merge(patch);
        }
        if let Some(value) = patch.identity.and_then(|patch| patch.cookie_name) {
            self.identity.cookie_name = value;
        }
        if let Some(value) = patch.preview.and_then(|patch| patch.query_param) {
            self.preview.query_param = value;
        }
        if let Some(value) = patch.catalog.and_then(|patch| patch.path) {
            self.catalog.path = value;
        }
    }

    /// Apply `POPGATE_*` overrides read through `var`.
    pub fn apply_env_overrides<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = var("POPGATE_SERVER_HOST") {
            self.server.host = value;
        }
        if let Some(value) = parse_var::<u16>(&var, "POPGATE_SERVER_PORT")? {
            self.server.port = value;
        }

        if let Some(value) = parse_var::<StoreBackend>(&var, "POPGATE_STORE_BACKEND")? {
            self.store.backend = value;
        }
        if let Some(value) = var("POPGATE_STORE_PATH") {
            self.store.path = Some(PathBuf::from(value));
        }
        if let Some(value) = parse_var::<u64>(&var, "POPGATE_STORE_RECORD_TTL_SECONDS")? {
            self.store.record_ttl_seconds = (value > 0).then_some(value);
        }

        if let Some(value) = bool_var(&var, "POPGATE_SETTINGS_SUPPRESS_NEWSLETTER_CAMPAIGNS") {
            self.settings.suppress_newsletter_campaigns = value;
        }
        if let Some(value) = bool_var(
            &var,
            "POPGATE_SETTINGS_SUPPRESS_ALL_NEWSLETTER_CAMPAIGNS_IF_ONE_DISMISSED",
        ) {
            self.settings.suppress_all_newsletter_campaigns_if_one_dismissed = value;
        }

        if let Some(value) = var("POPGATE_IDENTITY_COOKIE_NAME") {
            self.identity.cookie_name = value;
        }
        if let Some(value) = var("POPGATE_PREVIEW_QUERY_PARAM") {
            self.preview.query_param = value;
        }
        if let Some(value) = var("POPGATE_CATALOG_PATH") {
            self.catalog.path = PathBuf::from(value);
        }
        self.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn merge(&mut self, patch: ServerPatch) {
        if let Some(value) = patch.host {
            self.host = value;
        }
        if let Some(value) = patch.port {
            self.port = value;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = PopgateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(PopgateError::Config(format!(
                "invalid store backend {other} (expected memory|sqlite)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite database file. Defaults to the user data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Expire prompt records this long after their last write.
    #[serde(default)]
    pub record_ttl_seconds: Option<u64>,
}

impl StoreConfig {
    fn merge(&mut self, patch: StorePatch) {
        if let Some(value) = patch.backend {
            self.backend = value;
        }
        if let Some(value) = patch.path {
            self.path = Some(value);
        }
        if let Some(value) = patch.record_ttl_seconds {
            self.record_ttl_seconds = (value > 0).then_some(value);
        }
    }

    pub fn record_ttl(&self) -> Result<Option<chrono::TimeDelta>> {
        let Some(secs) = self.record_ttl_seconds else {
            return Ok(None);
        };
        if secs > MAX_RECORD_TTL_SECONDS {
            return Err(PopgateError::Config(format!(
                "store.record_ttl_seconds {secs} exceeds the maximum of {MAX_RECORD_TTL_SECONDS}"
            )));
        }
        i64::try_from(secs)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .map(Some)
            .ok_or_else(|| {
                PopgateError::Config(format!("store.record_ttl_seconds {secs} is out of range"))
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default)]
    pub suppress_newsletter_campaigns: bool,
    #[serde(default)]
    pub suppress_all_newsletter_campaigns_if_one_dismissed: bool,
}

impl SettingsConfig {
    fn merge(&mut self, patch: SettingsPatch) {
        if let Some(value) = patch.suppress_newsletter_campaigns {
            self.suppress_newsletter_campaigns = value;
        }
        if let Some(value) = patch.suppress_all_newsletter_campaigns_if_one_dismissed {
            self.suppress_all_newsletter_campaigns_if_one_dismissed = value;
        }
    }

    #[must_use]
    pub const fn site_settings(&self) -> SiteSettings {
        SiteSettings {
            suppress_newsletter_campaigns: self.suppress_newsletter_campaigns,
            suppress_all_newsletter_campaigns_if_one_dismissed: self
                .suppress_all_newsletter_campaigns_if_one_dismissed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Cookie holding the reader id when the request does not carry `rid`.
    #[serde(default)]
    pub cookie_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cookie_name: "amp-access".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Referer query parameter that marks an editor preview.
    #[serde(default)]
    pub query_param: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            query_param: "preview_prompt_id".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("prompts.toml"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub server: Option<ServerPatch>,
    pub store: Option<StorePatch>,
    pub settings: Option<SettingsPatch>,
    pub identity: Option<IdentityPatch>,
    pub preview: Option<PreviewPatch>,
    pub catalog: Option<CatalogPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ServerPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StorePatch {
    pub backend: Option<StoreBackend>,
    pub path: Option<PathBuf>,
    pub record_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SettingsPatch {
    pub suppress_newsletter_campaigns: Option<bool>,
    pub suppress_all_newsletter_campaigns_if_one_dismissed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct IdentityPatch {
    pub cookie_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PreviewPatch {
    pub query_param: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CatalogPatch {
    pub path: Option<PathBuf>,
}

fn bool_var<F>(var: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    var(key).map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| PopgateError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}
