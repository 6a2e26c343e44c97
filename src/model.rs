//! Domain types shared by the store, the evaluator and the transports.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How often a prompt may redisplay to the same reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Frequency {
    Never,
    Once,
    Daily,
    Always,
    Test,
}

impl Frequency {
    /// Parse a frequency label. Anything unrecognized never displays.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "once" => Self::Once,
            "daily" => Self::Daily,
            "always" => Self::Always,
            "test" => Self::Test,
            _ => Self::Never,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Once => "once",
            Self::Daily => "daily",
            Self::Always => "always",
            Self::Test => "test",
        }
    }

    /// `always` only makes sense for prompts embedded in the page body; any
    /// overlay placement falls back to single-view semantics.
    #[must_use]
    pub const fn normalize(self, placement: Placement) -> Self {
        match (self, placement) {
            (Self::Always, Placement::Inline) => Self::Always,
            (Self::Always, _) => Self::Once,
            (other, _) => other,
        }
    }
}

impl From<String> for Frequency {
    fn from(raw: String) -> Self {
        Self::parse_lenient(&raw)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Placement {
    #[default]
    Center,
    Top,
    Bottom,
    Inline,
}

impl Placement {
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "top" => Self::Top,
            "bottom" => Self::Bottom,
            "inline" => Self::Inline,
            _ => Self::Center,
        }
    }

    #[must_use]
    pub const fn is_inline(self) -> bool {
        matches!(self, Self::Inline)
    }
}

impl From<String> for Placement {
    fn from(raw: String) -> Self {
        Self::parse_lenient(&raw)
    }
}

/// Display policy of a prompt, owned by the catalog collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPolicy {
    pub frequency: Frequency,
    #[serde(default)]
    pub placement: Placement,
    /// Campaign source that suppresses this prompt, stored percent-encoded
    /// as authored.
    #[serde(default)]
    pub utm_suppression: Option<String>,
    #[serde(default)]
    pub has_newsletter_form: bool,
}

impl PromptPolicy {
    #[must_use]
    pub const fn new(frequency: Frequency, placement: Placement) -> Self {
        Self {
            frequency,
            placement,
            utm_suppression: None,
            has_newsletter_form: false,
        }
    }

    #[must_use]
    pub fn with_utm_suppression(mut self, value: impl Into<String>) -> Self {
        self.utm_suppression = Some(value.into());
        self
    }

    #[must_use]
    pub const fn with_newsletter_form(mut self) -> Self {
        self.has_newsletter_form = true;
        self
    }

    #[must_use]
    pub const fn normalized_frequency(&self) -> Frequency {
        self.frequency.normalize(self.placement)
    }

    /// Decoded, non-empty suppression value.
    #[must_use]
    pub fn utm_suppression_value(&self) -> Option<String> {
        let raw = self.utm_suppression.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        Some(crate::signals::form_decode(raw))
    }
}

/// What the store remembers about one reader and one prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderPromptRecord {
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub last_viewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub suppressed_forever: bool,
    #[serde(default)]
    pub mailing_list_subscribed: bool,
}

impl ReaderPromptRecord {
    #[must_use]
    pub const fn is_permanently_suppressed(&self) -> bool {
        self.suppressed_forever || self.mailing_list_subscribed
    }
}

/// Reader-level suppression facts, independent of any one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionKind {
    UtmSource,
    UtmMedium,
    NewsletterCampaign,
}

impl SuppressionKind {
    pub const ALL: [Self; 3] = [Self::UtmSource, Self::UtmMedium, Self::NewsletterCampaign];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UtmSource => "utm_source",
            Self::UtmMedium => "utm_medium",
            Self::NewsletterCampaign => "newsletter_campaign",
        }
    }
}

impl fmt::Display for SuppressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All suppression flags currently set for a reader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionFlags {
    pub utm_sources: BTreeSet<String>,
    pub utm_medium: bool,
    pub newsletter_campaign: bool,
}

/// Site-wide toggles read from the settings collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    /// Hide newsletter prompts from readers arriving via an email campaign.
    #[serde(default)]
    pub suppress_newsletter_campaigns: bool,
    /// Hide every newsletter prompt once the reader dismissed one of them.
    #[serde(default)]
    pub suppress_all_newsletter_campaigns_if_one_dismissed: bool,
}

/// Response shape shared by the query and acknowledge operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub current_views: u64,
    pub display_popup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
}

impl Decision {
    /// Answer for requests that cannot be tied to a reader, prompt and page.
    #[must_use]
    pub const fn no_op() -> Self {
        Self {
            current_views: 0,
            display_popup: false,
            frequency: None,
        }
    }
}
