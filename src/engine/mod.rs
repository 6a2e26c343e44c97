//! Decision engine.
//!
//! Ties signal extraction, the rule evaluator and the state mutator to the
//! store and the prompt catalog. The engine is synchronous; every call does
//! a handful of keyed store reads and at most a few writes.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use tracing::debug;

use crate::catalog::{PromptRepository, SettingsProvider};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::model::{
    Decision, Frequency, PromptPolicy, ReaderPromptRecord, SuppressionFlags, SuppressionKind,
};
use crate::signals::{ReaderRequest, SignalExtractor, Signals, StateTarget};
use crate::store::{ReaderStateStore, StateKey, StoredValue, read_flags, read_record};

pub mod evaluator;
pub mod mutator;
pub mod rules;

pub use evaluator::{Evaluation, EvaluationInput, Evaluator};
pub use mutator::StateMutator;
pub use rules::{RuleAction, RuleVerdict, StateEffect, SuppressionRule};

/// Stored state for one reader and prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderSnapshot {
    pub reader_id: String,
    pub prompt_id: String,
    pub record: ReaderPromptRecord,
    pub flags: SuppressionFlags,
}

pub struct DecisionEngine {
    store: Arc<dyn ReaderStateStore>,
    prompts: Arc<dyn PromptRepository>,
    settings: Arc<dyn SettingsProvider>,
    extractor: SignalExtractor,
    evaluator: Evaluator,
    mutator: StateMutator,
    clock: Arc<dyn Clock>,
}

impl DecisionEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn ReaderStateStore>,
        prompts: Arc<dyn PromptRepository>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            store,
            prompts,
            settings,
            extractor: SignalExtractor::default(),
            evaluator: Evaluator::with_defaults(),
            mutator: StateMutator::default(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: SignalExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Expire prompt records `ttl` after their last write.
    #[must_use]
    pub fn with_record_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.mutator = StateMutator::new(ttl);
        self
    }

    #[must_use]
    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    #[must_use]
    pub fn extract(&self, request: &ReaderRequest) -> Signals {
        self.extractor.extract(request)
    }

    /// Should the prompt display for this reader right now?
    pub fn query(&self, request: &ReaderRequest) -> Result<Decision> {
        self.query_signals(&self.extract(request))
    }

    /// Record that the prompt was shown, then answer as `query` would.
    pub fn acknowledge(&self, request: &ReaderRequest) -> Result<Decision> {
        self.acknowledge_signals(&self.extract(request))
    }

    pub fn query_signals(&self, signals: &Signals) -> Result<Decision> {
        let Some(target) = signals.state_target() else {
            debug!("reader, prompt or page missing; nothing to decide");
            return Ok(Decision::no_op());
        };
        self.decide(target, signals)
    }

    pub fn acknowledge_signals(&self, signals: &Signals) -> Result<Decision> {
        let Some(target) = signals.state_target() else {
            debug!("reader, prompt or page missing; nothing to record");
            return Ok(Decision::no_op());
        };

        if signals.is_preview {
            debug!(
                reader_id = target.reader_id,
                prompt_id = target.prompt_id,
                "preview request; view not recorded"
            );
        } else {
            let policy = self.prompts.get_by_id(target.prompt_id)?;
            self.mutator.record_view(
                self.store.as_ref(),
                target,
                signals,
                policy.as_ref(),
                self.clock.now(),
            )?;
        }

        self.decide(target, signals)
    }

    /// Stored record and flags for a reader and prompt.
    pub fn inspect(&self, reader_id: &str, prompt_id: &str) -> Result<ReaderSnapshot> {
        let store = self.store.as_ref();
        Ok(ReaderSnapshot {
            reader_id: reader_id.to_string(),
            prompt_id: prompt_id.to_string(),
            record: read_record(store, reader_id, prompt_id)?,
            flags: read_flags(store, reader_id)?,
        })
    }

    fn load_policy(&self, prompt_id: &str, preview: bool) -> Result<Option<PromptPolicy>> {
        if preview {
            self.prompts.get_preview(prompt_id)
        } else {
            self.prompts.get_by_id(prompt_id)
        }
    }

    fn decide(&self, target: StateTarget<'_>, signals: &Signals) -> Result<Decision> {
        let store = self.store.as_ref();
        let record = read_record(store, target.reader_id, target.prompt_id)?;

        let Some(policy) = self.load_policy(target.prompt_id, signals.is_preview)? else {
            debug!(prompt_id = target.prompt_id, "unknown prompt; not displaying");
            return Ok(Decision {
                current_views: record.view_count,
                display_popup: false,
                frequency: Some(Frequency::Never),
            });
        };

        let flags = read_flags(store, target.reader_id)?;
        let settings = self.settings.settings()?;
        let evaluation = self.evaluator.evaluate(&EvaluationInput {
            policy: &policy,
            record: &record,
            flags: &flags,
            signals,
            settings: &settings,
            now: self.clock.now(),
        });

        for effect in &evaluation.effects {
            self.apply_effect(target.reader_id, effect)?;
        }

        debug!(
            reader_id = target.reader_id,
            prompt_id = target.prompt_id,
            display_popup = evaluation.decision.display_popup,
            current_views = evaluation.decision.current_views,
            fired = ?evaluation.fired,
            "prompt decision"
        );
        Ok(evaluation.decision)
    }

    fn apply_effect(&self, reader_id: &str, effect: &StateEffect) -> Result<()> {
        match effect {
            StateEffect::RecordUtmSource(source) => {
                let key = StateKey::suppression(reader_id, SuppressionKind::UtmSource);
                let source = source.clone();
                self.store.upsert(
                    &key,
                    Box::new(move |current: Option<StoredValue>| {
                        let mut sources = match current {
                            Some(StoredValue::Sources(sources)) => sources,
                            _ => Default::default(),
                        };
                        sources.insert(source);
                        Ok(StoredValue::Sources(sources))
                    }),
                    None,
                )?;
                debug!(reader_id, ?effect, "applied state effect");
            }
            StateEffect::SetUtmMedium => {
                let key = StateKey::suppression(reader_id, SuppressionKind::UtmMedium);
                self.store.set(&key, StoredValue::Flag(true), None)?;
                debug!(reader_id, ?effect, "applied state effect");
            }
        }
        Ok(())
    }
}
