//! Engine and filesystem fixtures.
//!
//! Fixture helpers panic on setup failure; they only run inside tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use crate::catalog::{PromptCatalog, StaticSettings};
use crate::clock::ManualClock;
use crate::engine::DecisionEngine;
use crate::error::{PopgateError, Result};
use crate::model::SiteSettings;
use crate::signals::ReaderRequest;
use crate::store::{MemoryStore, Mutator, ReaderStateStore, StateKey, StoredValue};

/// Fixed start time for engine fixtures: 2024-01-15T12:00:00Z.
#[must_use]
pub fn fixture_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_705_320_000, 0).unwrap_or_default()
}

/// Memory store that counts every operation.
pub struct CountingStore {
    inner: MemoryStore,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl CountingStore {
    #[must_use]
    pub const fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn operations(&self) -> usize {
        self.gets() + self.sets()
    }
}

impl ReaderStateStore for CountingStore {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn get(&self, key: &StateKey) -> Result<Option<StoredValue>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn set(&self, key: &StateKey, value: StoredValue, ttl: Option<Duration>) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl)
    }
}

/// Store whose every operation fails, as if the backend were down.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

impl ReaderStateStore for FailingStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn get(&self, key: &StateKey) -> Result<Option<StoredValue>> {
        Err(PopgateError::StoreUnavailable(format!("get {key}: backend down")))
    }

    fn set(&self, key: &StateKey, _value: StoredValue, _ttl: Option<Duration>) -> Result<()> {
        Err(PopgateError::StoreUnavailable(format!("set {key}: backend down")))
    }

    fn upsert(
        &self,
        key: &StateKey,
        _mutator: Box<Mutator<'_>>,
        _ttl: Option<Duration>,
    ) -> Result<StoredValue> {
        Err(PopgateError::StoreUnavailable(format!("upsert {key}: backend down")))
    }
}

/// Decision engine over a counting memory store and a manual clock.
pub struct EngineFixture {
    pub engine: DecisionEngine,
    pub clock: ManualClock,
    pub store: Arc<CountingStore>,
}

impl EngineFixture {
    #[must_use]
    pub fn new(catalog: PromptCatalog, settings: SiteSettings) -> Self {
        let clock = ManualClock::at(fixture_epoch());
        let store = Arc::new(CountingStore::new(MemoryStore::new(Arc::new(clock.clone()))));
        let engine = DecisionEngine::new(
            store.clone(),
            Arc::new(catalog),
            Arc::new(StaticSettings(settings)),
        )
        .with_clock(Arc::new(clock.clone()));
        Self {
            engine,
            clock,
            store,
        }
    }

    #[must_use]
    pub fn with_catalog(catalog: PromptCatalog) -> Self {
        Self::new(catalog, SiteSettings::default())
    }

    pub fn advance(&self, duration: Duration) {
        self.clock.advance(duration);
    }
}

/// A complete reader request for `reader` and `prompt` on a fixed page.
#[must_use]
pub fn reader_request(reader: &str, prompt: &str) -> ReaderRequest {
    ReaderRequest::new()
        .param("rid", reader)
        .param("popup_id", prompt)
        .param("url", "https://news.example.com/story")
}

/// Test fixture providing isolated filesystem environment.
pub struct UnitTestFixture {
    pub temp_dir: TempDir,
    pub data_path: PathBuf,
}

impl Default for UnitTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitTestFixture {
    /// # Panics
    /// If the temp directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let data_path = temp_dir.path().to_path_buf();
        Self {
            temp_dir,
            data_path,
        }
    }

    /// # Panics
    /// If the file cannot be written.
    #[must_use]
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.data_path.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&full_path, content).expect("write fixture file");
        full_path
    }

    /// Write a prompt catalog and a config pointing at it plus a SQLite
    /// store inside the fixture directory. Returns the config path.
    #[must_use]
    pub fn create_site(&self, catalog_toml: &str, settings_toml: &str) -> PathBuf {
        let catalog = self.create_file("prompts.toml", catalog_toml);
        let db = self.data_path.join("state.db");
        let config = format!(
            "[store]\nbackend = \"sqlite\"\npath = {db:?}\n\n[catalog]\npath = {catalog:?}\n\n{settings_toml}\n",
            db = db.display().to_string(),
            catalog = catalog.display().to_string(),
        );
        self.create_file("popgate.toml", &config)
    }
}
