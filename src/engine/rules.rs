//! Suppression rules applied after the frequency decision.
//!
//! Each rule inspects the evaluation context and returns a verdict. Rules
//! run in registration order; a later verdict overrides an earlier one, so
//! the override rule is registered last.

use crate::model::{Frequency, PromptPolicy, ReaderPromptRecord, SiteSettings, SuppressionFlags};
use crate::signals::{Signals, form_decode};

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub policy: &'a PromptPolicy,
    /// Frequency after placement normalization.
    pub frequency: Frequency,
    pub record: &'a ReaderPromptRecord,
    pub flags: &'a SuppressionFlags,
    pub signals: &'a Signals,
    pub settings: &'a SiteSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Leave the current decision alone.
    Pass,
    /// Hide the prompt.
    Suppress,
    /// Show the prompt regardless of earlier rules.
    ForceDisplay,
}

/// A write the engine must perform because a rule fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEffect {
    /// Remember that the reader arrived from this suppressed campaign source.
    RecordUtmSource(String),
    /// Remember that the reader arrived from an email campaign.
    SetUtmMedium,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleVerdict {
    pub action: RuleAction,
    pub effect: Option<StateEffect>,
}

impl RuleVerdict {
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            action: RuleAction::Pass,
            effect: None,
        }
    }

    #[must_use]
    pub const fn suppress() -> Self {
        Self {
            action: RuleAction::Suppress,
            effect: None,
        }
    }

    #[must_use]
    pub const fn force_display() -> Self {
        Self {
            action: RuleAction::ForceDisplay,
            effect: None,
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: StateEffect) -> Self {
        self.effect = Some(effect);
        self
    }
}

/// A rule that can veto or force display of a prompt.
///
/// Rules must be stateless; anything they need arrives through the context.
pub trait SuppressionRule: Send + Sync {
    /// Unique identifier, used in logs (e.g. "utm-source")
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn check(&self, ctx: &RuleContext<'_>) -> RuleVerdict;
}

pub type BoxedRule = Box<dyn SuppressionRule>;

/// Standard rule chain, in evaluation order.
#[must_use]
pub fn default_rules() -> Vec<BoxedRule> {
    vec![
        Box::new(UtmSourceRule),
        Box::new(UtmMediumRule),
        Box::new(PermanentDismissalRule),
        Box::new(NewsletterCampaignRule),
        Box::new(PreviewOverrideRule),
    ]
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Hides prompts configured to stay away from readers of one campaign source.
pub struct UtmSourceRule;

impl SuppressionRule for UtmSourceRule {
    fn id(&self) -> &'static str {
        "utm-source"
    }

    fn description(&self) -> &'static str {
        "Suppress when the reader arrived from, or previously arrived from, the prompt's suppressed utm_source"
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleVerdict {
        let Some(source) = ctx.policy.utm_suppression_value() else {
            return RuleVerdict::pass();
        };

        let arrived_from_source = ctx.signals.referer_url.as_deref().is_some_and(|referer| {
            contains_ignore_case(&form_decode(referer), &format!("utm_source={source}"))
        });
        if arrived_from_source {
            return RuleVerdict::suppress().with_effect(StateEffect::RecordUtmSource(source));
        }

        if ctx.flags.utm_sources.contains(&source) {
            return RuleVerdict::suppress();
        }
        RuleVerdict::pass()
    }
}

/// Hides newsletter prompts from readers who came from an email campaign.
pub struct UtmMediumRule;

impl SuppressionRule for UtmMediumRule {
    fn id(&self) -> &'static str {
        "utm-medium"
    }

    fn description(&self) -> &'static str {
        "Suppress newsletter prompts for readers referred by email campaigns"
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleVerdict {
        let from_email = ctx
            .signals
            .referer_url
            .as_deref()
            .is_some_and(|referer| contains_ignore_case(referer, "utm_medium=email"));

        if (from_email || ctx.flags.utm_medium)
            && ctx.settings.suppress_newsletter_campaigns
            && ctx.policy.has_newsletter_form
        {
            return RuleVerdict::suppress().with_effect(StateEffect::SetUtmMedium);
        }
        RuleVerdict::pass()
    }
}

/// Readers who dismissed a prompt for good or subscribed through it never
/// see it again.
pub struct PermanentDismissalRule;

impl SuppressionRule for PermanentDismissalRule {
    fn id(&self) -> &'static str {
        "permanent-dismissal"
    }

    fn description(&self) -> &'static str {
        "Suppress prompts the reader dismissed permanently or subscribed through"
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleVerdict {
        if ctx.record.is_permanently_suppressed() {
            RuleVerdict::suppress()
        } else {
            RuleVerdict::pass()
        }
    }
}

/// Once one newsletter prompt is dismissed, all of them can be hidden.
pub struct NewsletterCampaignRule;

impl SuppressionRule for NewsletterCampaignRule {
    fn id(&self) -> &'static str {
        "newsletter-campaign"
    }

    fn description(&self) -> &'static str {
        "Suppress every newsletter prompt after the reader dismissed one"
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleVerdict {
        if ctx.settings.suppress_all_newsletter_campaigns_if_one_dismissed
            && ctx.flags.newsletter_campaign
            && ctx.policy.has_newsletter_form
        {
            RuleVerdict::suppress()
        } else {
            RuleVerdict::pass()
        }
    }
}

/// Editors previewing a prompt, and prompts in test mode, always display.
pub struct PreviewOverrideRule;

impl SuppressionRule for PreviewOverrideRule {
    fn id(&self) -> &'static str {
        "preview-override"
    }

    fn description(&self) -> &'static str {
        "Force display for preview requests and test-mode prompts"
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleVerdict {
        if ctx.signals.is_preview || ctx.frequency == Frequency::Test {
            RuleVerdict::force_display()
        } else {
            RuleVerdict::pass()
        }
    }
}
