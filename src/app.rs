use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::{PromptCatalog, StaticSettings};
use crate::cli::output::OutputFormat;
use crate::config::{Config, StoreBackend, StoreConfig};
use crate::engine::DecisionEngine;
use crate::error::{PopgateError, Result};
use crate::signals::{CookieIdentity, QueryParamPreview, SignalExtractor};
use crate::store::{MemoryStore, ReaderStateStore, SqliteStore};

pub struct AppContext {
    pub project_dir: PathBuf,
    pub config: Config,
    pub output_format: OutputFormat,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self> {
        let project_dir = std::env::current_dir()?;
        let config = Config::load(cli.config.as_deref(), &project_dir)?;
        Ok(Self {
            project_dir,
            config,
            output_format: cli.output_format(),
            verbosity: cli.verbose,
        })
    }

    /// Assemble the decision engine described by the configuration.
    pub fn build_engine(&self) -> Result<DecisionEngine> {
        build_engine(&self.config, &self.project_dir)
    }
}

pub fn build_engine(config: &Config, project_dir: &Path) -> Result<DecisionEngine> {
    let store = open_store(&config.store)?;
    let catalog = PromptCatalog::load(&resolve(project_dir, &config.catalog.path))?;
    info!(
        store = store.name(),
        prompts = catalog.len(),
        "decision engine ready"
    );

    let extractor = SignalExtractor::new(
        Arc::new(CookieIdentity::new(config.identity.cookie_name.clone())),
        Arc::new(QueryParamPreview::new(config.preview.query_param.clone())),
    );

    Ok(DecisionEngine::new(
        store,
        Arc::new(catalog),
        Arc::new(StaticSettings(config.settings.site_settings())),
    )
    .with_extractor(extractor)
    .with_record_ttl(config.store.record_ttl()?))
}

pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn ReaderStateStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::default())),
        StoreBackend::Sqlite => {
            let path = match &config.path {
                Some(path) => path.clone(),
                None => default_store_path()?,
            };
            debug!(path = %path.display(), "opening sqlite reader state store");
            Ok(Arc::new(SqliteStore::open(&path)?))
        }
    }
}

fn default_store_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| PopgateError::MissingConfig("data directory not found".to_string()))?;
    Ok(data_dir.join("popgate/state.db"))
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
