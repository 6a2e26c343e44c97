//! Pure decision function: policy + reader state + signals → decision.
//!
//! The evaluator never touches the store. Writes that a rule calls for are
//! returned as `StateEffect`s for the engine to apply.

use chrono::{DateTime, Duration, Utc};

use crate::model::{
    Decision, Frequency, PromptPolicy, ReaderPromptRecord, SiteSettings, SuppressionFlags,
};
use crate::signals::Signals;

use super::rules::{BoxedRule, RuleAction, RuleContext, StateEffect, default_rules};

/// Minimum gap between two views of a `daily` prompt.
pub const DAILY_WINDOW_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub policy: &'a PromptPolicy,
    pub record: &'a ReaderPromptRecord,
    pub flags: &'a SuppressionFlags,
    pub signals: &'a Signals,
    pub settings: &'a SiteSettings,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: Decision,
    /// Writes requested by the rules, in rule order.
    pub effects: Vec<StateEffect>,
    /// Ids of rules that changed or confirmed the decision.
    pub fired: Vec<&'static str>,
}

/// Display decision from the frequency alone.
#[must_use]
pub fn base_decision(
    frequency: Frequency,
    record: &ReaderPromptRecord,
    now: DateTime<Utc>,
) -> bool {
    match frequency {
        Frequency::Daily => {
            let cutoff = now - Duration::seconds(DAILY_WINDOW_SECS);
            record
                .last_viewed_at
                .is_none_or(|last_viewed| last_viewed < cutoff)
        }
        Frequency::Once => record.view_count < 1,
        Frequency::Test | Frequency::Always => true,
        Frequency::Never => false,
    }
}

pub struct Evaluator {
    rules: Vec<BoxedRule>,
}

impl Evaluator {
    #[must_use]
    pub fn new(rules: Vec<BoxedRule>) -> Self {
        Self { rules }
    }

    /// Evaluator with the standard rule chain.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(default_rules())
    }

    /// Append a rule; it runs after every rule already registered.
    pub fn register(&mut self, rule: BoxedRule) {
        self.rules.push(rule);
    }

    #[must_use]
    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.id()).collect()
    }

    #[must_use]
    pub fn evaluate(&self, input: &EvaluationInput<'_>) -> Evaluation {
        let frequency = input.policy.normalized_frequency();
        let mut display_popup = base_decision(frequency, input.record, input.now);

        let ctx = RuleContext {
            policy: input.policy,
            frequency,
            record: input.record,
            flags: input.flags,
            signals: input.signals,
            settings: input.settings,
        };

        let mut effects = Vec::new();
        let mut fired = Vec::new();
        for rule in &self.rules {
            let verdict = rule.check(&ctx);
            match verdict.action {
                RuleAction::Pass => {}
                RuleAction::Suppress => {
                    display_popup = false;
                    fired.push(rule.id());
                }
                RuleAction::ForceDisplay => {
                    display_popup = true;
                    fired.push(rule.id());
                }
            }
            if let Some(effect) = verdict.effect {
                effects.push(effect);
            }
        }

        Evaluation {
            decision: Decision {
                current_views: input.record.view_count,
                display_popup,
                frequency: Some(frequency),
            },
            effects,
            fired,
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Placement;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn evaluate(
        policy: &PromptPolicy,
        record: &ReaderPromptRecord,
        flags: &SuppressionFlags,
        signals: &Signals,
        settings: &SiteSettings,
    ) -> Evaluation {
        Evaluator::with_defaults().evaluate(&EvaluationInput {
            policy,
            record,
            flags,
            signals,
            settings,
            now: now(),
        })
    }

    fn viewed(count: u64, ago: Duration) -> ReaderPromptRecord {
        ReaderPromptRecord {
            view_count: count,
            last_viewed_at: Some(now() - ago),
            ..ReaderPromptRecord::default()
        }
    }

    #[test]
    fn test_base_decision_daily_window() {
        let fresh = ReaderPromptRecord::default();
        assert!(base_decision(Frequency::Daily, &fresh, now()));
        assert!(!base_decision(Frequency::Daily, &viewed(1, Duration::hours(1)), now()));
        assert!(!base_decision(
            Frequency::Daily,
            &viewed(1, Duration::seconds(DAILY_WINDOW_SECS)),
            now()
        ));
        assert!(base_decision(
            Frequency::Daily,
            &viewed(1, Duration::seconds(DAILY_WINDOW_SECS + 1)),
            now()
        ));
    }

    #[test]
    fn test_base_decision_once_never_always() {
        let fresh = ReaderPromptRecord::default();
        let seen = viewed(1, Duration::days(30));
        assert!(base_decision(Frequency::Once, &fresh, now()));
        assert!(!base_decision(Frequency::Once, &seen, now()));
        assert!(base_decision(Frequency::Always, &seen, now()));
        assert!(base_decision(Frequency::Test, &seen, now()));
        assert!(!base_decision(Frequency::Never, &fresh, now()));
    }

    #[test]
    fn test_overlay_always_behaves_as_once() {
        let policy = PromptPolicy::new(Frequency::Always, Placement::Bottom);
        let seen = viewed(1, Duration::days(2));
        let evaluation = evaluate(
            &policy,
            &seen,
            &SuppressionFlags::default(),
            &Signals::default(),
            &SiteSettings::default(),
        );
        assert!(!evaluation.decision.display_popup);
        assert_eq!(evaluation.decision.frequency, Some(Frequency::Once));
        assert_eq!(evaluation.decision.current_views, 1);
    }

    #[test]
    fn test_preview_overrides_every_suppression() {
        let policy = PromptPolicy::new(Frequency::Never, Placement::Center)
            .with_newsletter_form()
            .with_utm_suppression("promo");
        let record = ReaderPromptRecord {
            view_count: 9,
            suppressed_forever: true,
            mailing_list_subscribed: true,
            ..ReaderPromptRecord::default()
        };
        let mut flags = SuppressionFlags {
            utm_medium: true,
            newsletter_campaign: true,
            ..SuppressionFlags::default()
        };
        flags.utm_sources.insert("promo".to_string());
        let signals = Signals {
            is_preview: true,
            ..Signals::default()
        };
        let settings = SiteSettings {
            suppress_newsletter_campaigns: true,
            suppress_all_newsletter_campaigns_if_one_dismissed: true,
        };

        let evaluation = evaluate(&policy, &record, &flags, &signals, &settings);
        assert!(evaluation.decision.display_popup);
        assert_eq!(evaluation.fired.last(), Some(&"preview-override"));
    }

    #[test]
    fn test_effects_are_returned_not_applied() {
        let policy = PromptPolicy::new(Frequency::Once, Placement::Center)
            .with_newsletter_form()
            .with_utm_suppression("promo");
        let signals = Signals {
            referer_url: Some(
                "https://example.com/?utm_source=promo&utm_medium=email".to_string(),
            ),
            ..Signals::default()
        };
        let settings = SiteSettings {
            suppress_newsletter_campaigns: true,
            ..SiteSettings::default()
        };
        let evaluation = evaluate(
            &policy,
            &ReaderPromptRecord::default(),
            &SuppressionFlags::default(),
            &signals,
            &settings,
        );
        assert!(!evaluation.decision.display_popup);
        assert_eq!(
            evaluation.effects,
            vec![
                StateEffect::RecordUtmSource("promo".to_string()),
                StateEffect::SetUtmMedium
            ]
        );
        assert_eq!(evaluation.fired, vec!["utm-source", "utm-medium"]);
    }

    #[test]
    fn test_test_frequency_always_displays() {
        let policy = PromptPolicy::new(Frequency::Test, Placement::Center);
        let record = ReaderPromptRecord {
            suppressed_forever: true,
            ..viewed(4, Duration::minutes(1))
        };
        let evaluation = evaluate(
            &policy,
            &record,
            &SuppressionFlags::default(),
            &Signals::default(),
            &SiteSettings::default(),
        );
        assert!(evaluation.decision.display_popup);
        assert_eq!(evaluation.decision.current_views, 4);
    }

    #[test]
    fn test_custom_rule_runs_after_defaults() {
        use crate::engine::rules::{RuleVerdict, SuppressionRule};

        struct AlwaysHide;
        impl SuppressionRule for AlwaysHide {
            fn id(&self) -> &'static str {
                "always-hide"
            }
            fn description(&self) -> &'static str {
                "hide everything"
            }
            fn check(&self, _ctx: &RuleContext<'_>) -> RuleVerdict {
                RuleVerdict::suppress()
            }
        }

        let mut evaluator = Evaluator::with_defaults();
        evaluator.register(Box::new(AlwaysHide));
        assert_eq!(evaluator.rule_ids().last(), Some(&"always-hide"));

        let policy = PromptPolicy::new(Frequency::Always, Placement::Inline);
        let evaluation = evaluator.evaluate(&EvaluationInput {
            policy: &policy,
            record: &ReaderPromptRecord::default(),
            flags: &SuppressionFlags::default(),
            signals: &Signals::default(),
            settings: &SiteSettings::default(),
            now: now(),
        });
        assert!(!evaluation.decision.display_popup);
    }
}
