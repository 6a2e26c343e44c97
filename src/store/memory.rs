//! In-process store backed by a hash map.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;

use super::{ReaderStateStore, StateKey, StoredValue, expiry_after};

#[derive(Debug, Clone)]
struct Entry {
    value: StoredValue,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

/// Volatile store; state is lost when the process exits.
pub struct MemoryStore {
    entries: Mutex<HashMap<StateKey, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ReaderStateStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &StateKey) -> Result<Option<StoredValue>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &StateKey, value: StoredValue, ttl: Option<Duration>) -> Result<()> {
        let expires_at = expiry_after(self.clock.now(), ttl)?;
        self.entries
            .lock()
            .insert(key.clone(), Entry { value, expires_at });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::ReaderPromptRecord;

    fn store_with_clock() -> (MemoryStore, ManualClock) {
        let clock = ManualClock::at(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        (MemoryStore::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_set_then_get() {
        let (store, _) = store_with_clock();
        let key = StateKey::prompt("r1", "p1");
        assert!(store.get(&key).unwrap().is_none());

        let record = ReaderPromptRecord {
            view_count: 3,
            ..ReaderPromptRecord::default()
        };
        store.set(&key, StoredValue::Record(record.clone()), None).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(StoredValue::Record(record)));
    }

    #[test]
    fn test_entries_expire() {
        let (store, clock) = store_with_clock();
        let key = StateKey::prompt("r1", "p1");
        store
            .set(&key, StoredValue::Flag(true), Some(Duration::minutes(10)))
            .unwrap();

        clock.advance(Duration::minutes(9));
        assert!(store.get(&key).unwrap().is_some());

        clock.advance(Duration::minutes(1));
        assert!(store.get(&key).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let (store, clock) = store_with_clock();
        let key = StateKey::prompt("r1", "p1");
        store.set(&key, StoredValue::Flag(true), None).unwrap();
        clock.advance(Duration::days(3650));
        assert!(store.get(&key).unwrap().is_some());
    }

    #[test]
    fn test_upsert_sees_previous_value() {
        let (store, _) = store_with_clock();
        let key = StateKey::prompt("r1", "p1");
        for _ in 0..3 {
            store
                .upsert(
                    &key,
                    Box::new(|current: Option<StoredValue>| {
                        let count = match current {
                            Some(StoredValue::Record(record)) => record.view_count,
                            _ => 0,
                        };
                        Ok(StoredValue::Record(ReaderPromptRecord {
                            view_count: count + 1,
                            ..ReaderPromptRecord::default()
                        }))
                    }),
                    None,
                )
                .unwrap();
        }
        match store.get(&key).unwrap() {
            Some(StoredValue::Record(record)) => assert_eq!(record.view_count, 3),
            other => panic!("unexpected value: {other:?}"),
        }
    }
}
