//! Reader state store.
//!
//! A small key-value store of typed values with optional expiry. Keys are
//! scoped either to a reader and a prompt, or to a reader and a suppression
//! kind. The store is never scanned; every access names its key.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PopgateError, Result};
use crate::model::{ReaderPromptRecord, SuppressionFlags, SuppressionKind};

pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateKey {
    Prompt { reader_id: String, prompt_id: String },
    Suppression { reader_id: String, kind: SuppressionKind },
}

impl StateKey {
    #[must_use]
    pub fn prompt(reader_id: impl Into<String>, prompt_id: impl Into<String>) -> Self {
        Self::Prompt {
            reader_id: reader_id.into(),
            prompt_id: prompt_id.into(),
        }
    }

    #[must_use]
    pub fn suppression(reader_id: impl Into<String>, kind: SuppressionKind) -> Self {
        Self::Suppression {
            reader_id: reader_id.into(),
            kind,
        }
    }

    #[must_use]
    pub fn reader_id(&self) -> &str {
        match self {
            Self::Prompt { reader_id, .. } | Self::Suppression { reader_id, .. } => reader_id,
        }
    }

    /// Flat string form used as the primary key by persistent backends.
    ///
    /// Ids are percent-encoded so a `:` inside an id cannot forge another
    /// key's segments.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Prompt {
                reader_id,
                prompt_id,
            } => format!(
                "reader:{}:prompt:{}",
                urlencoding::encode(reader_id),
                urlencoding::encode(prompt_id)
            ),
            Self::Suppression { reader_id, kind } => {
                format!("reader:{}:suppress:{kind}", urlencoding::encode(reader_id))
            }
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// A value held under a `StateKey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    Record(ReaderPromptRecord),
    Flag(bool),
    Sources(BTreeSet<String>),
}

/// Mutation applied by `ReaderStateStore::upsert`.
pub type Mutator<'a> = dyn FnOnce(Option<StoredValue>) -> Result<StoredValue> + 'a;

pub trait ReaderStateStore: Send + Sync {
    /// Backend name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Read the live value for `key`. Expired entries read as absent.
    fn get(&self, key: &StateKey) -> Result<Option<StoredValue>>;

    /// Overwrite the value for `key`. `ttl = None` keeps it forever.
    fn set(&self, key: &StateKey, value: StoredValue, ttl: Option<Duration>) -> Result<()>;

    /// Read-modify-write of a single key.
    ///
    /// The default is a plain `get` followed by `set`: two concurrent
    /// upserts of the same key may both read the old value, and the later
    /// write wins. Backends that need stronger guarantees override this.
    fn upsert(
        &self,
        key: &StateKey,
        mutator: Box<Mutator<'_>>,
        ttl: Option<Duration>,
    ) -> Result<StoredValue> {
        let current = self.get(key)?;
        let next = mutator(current)?;
        self.set(key, next.clone(), ttl)?;
        Ok(next)
    }
}

/// Read the record for a reader and prompt, defaulting when absent.
pub fn read_record(
    store: &dyn ReaderStateStore,
    reader_id: &str,
    prompt_id: &str,
) -> Result<ReaderPromptRecord> {
    let key = StateKey::prompt(reader_id, prompt_id);
    match store.get(&key)? {
        None => Ok(ReaderPromptRecord::default()),
        Some(StoredValue::Record(record)) => Ok(record),
        Some(other) => Err(type_mismatch(&key, "record", &other)),
    }
}

/// Read every suppression flag for a reader.
pub fn read_flags(store: &dyn ReaderStateStore, reader_id: &str) -> Result<SuppressionFlags> {
    let mut flags = SuppressionFlags::default();
    for kind in SuppressionKind::ALL {
        let key = StateKey::suppression(reader_id, kind);
        let Some(value) = store.get(&key)? else {
            continue;
        };
        match (kind, value) {
            (SuppressionKind::UtmSource, StoredValue::Sources(sources)) => {
                flags.utm_sources = sources;
            }
            (SuppressionKind::UtmMedium, StoredValue::Flag(set)) => flags.utm_medium = set,
            (SuppressionKind::NewsletterCampaign, StoredValue::Flag(set)) => {
                flags.newsletter_campaign = set;
            }
            (_, other) => return Err(type_mismatch(&key, "flag", &other)),
        }
    }
    Ok(flags)
}

/// Extract the record from an upsert input, tolerating absence.
pub fn record_or_default(key: &StateKey, value: Option<StoredValue>) -> Result<ReaderPromptRecord> {
    match value {
        None => Ok(ReaderPromptRecord::default()),
        Some(StoredValue::Record(record)) => Ok(record),
        Some(other) => Err(type_mismatch(key, "record", &other)),
    }
}

/// Absolute expiry for a write made at `now`; `None` keeps it forever.
pub fn expiry_after(now: DateTime<Utc>, ttl: Option<Duration>) -> Result<Option<DateTime<Utc>>> {
    ttl.map(|ttl| {
        now.checked_add_signed(ttl).ok_or_else(|| {
            PopgateError::ValidationFailed(format!("ttl of {}s overflows the clock", ttl.num_seconds()))
        })
    })
    .transpose()
}

fn type_mismatch(key: &StateKey, expected: &str, found: &StoredValue) -> PopgateError {
    let found = match found {
        StoredValue::Record(_) => "record",
        StoredValue::Flag(_) => "flag",
        StoredValue::Sources(_) => "sources",
    };
    PopgateError::Storage(format!(
        "value under {key} has type {found}, expected {expected}"
    ))
}
