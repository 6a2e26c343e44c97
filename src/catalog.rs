//! Collaborators that own prompt policies and site settings.
//!
//! Prompt authoring and settings storage live elsewhere; the engine only
//! reads through these traits. `PromptCatalog` and `StaticSettings` are
//! file- and config-backed implementations for standalone deployments.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{PopgateError, Result};
use crate::model::{PromptPolicy, SiteSettings};

pub trait PromptRepository: Send + Sync {
    /// Published policy for `id`, or `None` when no such prompt exists.
    fn get_by_id(&self, id: &str) -> Result<Option<PromptPolicy>>;

    /// Policy an editor is previewing. Falls back to the published policy.
    fn get_preview(&self, id: &str) -> Result<Option<PromptPolicy>> {
        self.get_by_id(id)
    }
}

pub trait SettingsProvider: Send + Sync {
    fn settings(&self) -> Result<SiteSettings>;
}

/// Settings fixed at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSettings(pub SiteSettings);

impl SettingsProvider for StaticSettings {
    fn settings(&self) -> Result<SiteSettings> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    published: PromptPolicy,
    preview: Option<PromptPolicy>,
}

/// In-memory prompt policies keyed by prompt id.
#[derive(Debug, Clone, Default)]
pub struct PromptCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl PromptCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prompt (builder pattern).
    #[must_use]
    pub fn with_prompt(mut self, id: impl Into<String>, policy: PromptPolicy) -> Self {
        self.insert(id, policy);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, policy: PromptPolicy) {
        self.entries.insert(
            id.into(),
            CatalogEntry {
                published: policy,
                preview: None,
            },
        );
    }

    /// Attach a draft policy served only to preview requests.
    pub fn set_preview(&mut self, id: &str, policy: PromptPolicy) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| PopgateError::Catalog(format!("unknown prompt: {id}")))?;
        entry.preview = Some(policy);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a TOML catalog of `[[prompt]]` tables. A missing file yields an
    /// empty catalog.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "prompt catalog not found; starting empty");
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path).map_err(|err| {
            PopgateError::Catalog(format!("read catalog {}: {err}", path.display()))
        })?;
        Self::from_toml(&raw)
            .map_err(|err| PopgateError::Catalog(format!("{}: {err}", path.display())))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(raw)
            .map_err(|err| PopgateError::Catalog(format!("parse catalog: {err}")))?;

        let mut catalog = Self::new();
        for entry in file.prompts {
            let id = entry.id.into_string();
            if id.is_empty() {
                return Err(PopgateError::ValidationFailed(
                    "catalog prompt with empty id".to_string(),
                ));
            }
            if catalog.entries.contains_key(&id) {
                return Err(PopgateError::ValidationFailed(format!(
                    "duplicate prompt id in catalog: {id}"
                )));
            }
            catalog.entries.insert(
                id,
                CatalogEntry {
                    published: entry.policy,
                    preview: entry.preview,
                },
            );
        }
        Ok(catalog)
    }
}

impl PromptRepository for PromptCatalog {
    fn get_by_id(&self, id: &str) -> Result<Option<PromptPolicy>> {
        Ok(self.entries.get(id).map(|entry| entry.published.clone()))
    }

    fn get_preview(&self, id: &str) -> Result<Option<PromptPolicy>> {
        Ok(self
            .entries
            .get(id)
            .map(|entry| entry.preview.clone().unwrap_or_else(|| entry.published.clone())))
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "prompt")]
    prompts: Vec<CatalogFileEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogFileEntry {
    id: PromptId,
    #[serde(flatten)]
    policy: PromptPolicy,
    #[serde(default)]
    preview: Option<PromptPolicy>,
}

/// Prompt ids may be written as numbers or strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PromptId {
    Number(u64),
    Text(String),
}

impl PromptId {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}
