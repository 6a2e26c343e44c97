//! Acknowledgment writes: a view was shown, maybe dismissed or converted.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::Result;
use crate::model::{PromptPolicy, ReaderPromptRecord, SuppressionKind};
use crate::signals::{Signals, StateTarget};
use crate::store::{ReaderStateStore, StateKey, StoredValue, record_or_default};

/// Fold one acknowledgment into a record.
///
/// Permanent flags only ever go from false to true.
#[must_use]
pub fn acknowledge_view(
    mut record: ReaderPromptRecord,
    signals: &Signals,
    now: DateTime<Utc>,
) -> ReaderPromptRecord {
    record.view_count = record.view_count.saturating_add(1);
    record.last_viewed_at = Some(now);
    if signals.suppress_forever {
        record.suppressed_forever = true;
    }
    if signals.mailing_list_subscribed {
        record.mailing_list_subscribed = true;
    }
    record
}

/// Persists acknowledgments through the reader state store.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateMutator {
    record_ttl: Option<Duration>,
}

impl StateMutator {
    #[must_use]
    pub const fn new(record_ttl: Option<Duration>) -> Self {
        Self { record_ttl }
    }

    /// Record a view for `target`.
    ///
    /// `policy` is the target prompt's published policy, used to decide
    /// whether a permanent dismissal also silences other newsletter prompts.
    /// The record update is a plain read-modify-write; concurrent
    /// acknowledgments for the same reader and prompt may lose a count.
    pub fn record_view(
        &self,
        store: &dyn ReaderStateStore,
        target: StateTarget<'_>,
        signals: &Signals,
        policy: Option<&PromptPolicy>,
        now: DateTime<Utc>,
    ) -> Result<ReaderPromptRecord> {
        if signals.suppress_forever && policy.is_some_and(|policy| policy.has_newsletter_form) {
            let key = StateKey::suppression(target.reader_id, SuppressionKind::NewsletterCampaign);
            store.set(&key, StoredValue::Flag(true), None)?;
            debug!(
                reader_id = target.reader_id,
                prompt_id = target.prompt_id,
                "newsletter prompt dismissed; suppressing newsletter campaigns"
            );
        }

        let key = StateKey::prompt(target.reader_id, target.prompt_id);
        let upsert_key = key.clone();
        let updated = store.upsert(
            &key,
            Box::new(move |current: Option<StoredValue>| {
                let record = record_or_default(&upsert_key, current)?;
                Ok(StoredValue::Record(acknowledge_view(record, signals, now)))
            }),
            self.record_ttl,
        )?;

        let record = record_or_default(&key, Some(updated))?;
        debug!(
            reader_id = target.reader_id,
            prompt_id = target.prompt_id,
            view_count = record.view_count,
            suppressed_forever = record.suppressed_forever,
            mailing_list_subscribed = record.mailing_list_subscribed,
            "recorded prompt view"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Frequency, Placement};
    use crate::store::{MemoryStore, read_flags, read_record};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn signals() -> Signals {
        Signals {
            reader_id: Some("r1".into()),
            prompt_id: Some("p1".into()),
            page_url: Some("https://example.com/".into()),
            ..Signals::default()
        }
    }

    fn target() -> StateTarget<'static> {
        StateTarget {
            reader_id: "r1",
            prompt_id: "p1",
        }
    }

    #[test]
    fn test_acknowledge_view_increments_and_stamps() {
        let record = acknowledge_view(ReaderPromptRecord::default(), &signals(), now());
        assert_eq!(record.view_count, 1);
        assert_eq!(record.last_viewed_at, Some(now()));
        assert!(!record.suppressed_forever);
        assert!(!record.mailing_list_subscribed);
    }

    #[test]
    fn test_permanent_flags_are_sticky() {
        let record = ReaderPromptRecord {
            view_count: 2,
            suppressed_forever: true,
            mailing_list_subscribed: true,
            ..ReaderPromptRecord::default()
        };
        let record = acknowledge_view(record, &signals(), now());
        assert_eq!(record.view_count, 3);
        assert!(record.suppressed_forever);
        assert!(record.mailing_list_subscribed);
    }

    #[test]
    fn test_record_view_persists() {
        let store = MemoryStore::default();
        let mutator = StateMutator::default();
        mutator
            .record_view(&store, target(), &signals(), None, now())
            .unwrap();
        mutator
            .record_view(&store, target(), &signals(), None, now())
            .unwrap();
        assert_eq!(read_record(&store, "r1", "p1").unwrap().view_count, 2);
    }

    #[test]
    fn test_dismissing_newsletter_prompt_sets_campaign_flag() {
        let store = MemoryStore::default();
        let policy = PromptPolicy::new(Frequency::Once, Placement::Center).with_newsletter_form();
        let dismiss = Signals {
            suppress_forever: true,
            ..signals()
        };
        StateMutator::default()
            .record_view(&store, target(), &dismiss, Some(&policy), now())
            .unwrap();

        assert!(read_flags(&store, "r1").unwrap().newsletter_campaign);
        assert!(read_record(&store, "r1", "p1").unwrap().suppressed_forever);
    }

    #[test]
    fn test_dismissing_plain_prompt_leaves_campaign_flag() {
        let store = MemoryStore::default();
        let policy = PromptPolicy::new(Frequency::Once, Placement::Center);
        let dismiss = Signals {
            suppress_forever: true,
            ..signals()
        };
        StateMutator::default()
            .record_view(&store, target(), &dismiss, Some(&policy), now())
            .unwrap();
        assert!(!read_flags(&store, "r1").unwrap().newsletter_campaign);
    }
}
