//! In-process caching for listing endpoints
//!
//! Each listing component owns its own `TtlCache`; there is no process-wide
//! cache singleton. The clock is injected so expiry is testable, and stale
//! entries are reaped only by the explicit `purge_expired` trigger — the
//! cache never starts its own timer.

pub mod keys;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Injected time source
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock backed `Clock`
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// String-keyed TTL cache with prefix invalidation
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Fetch a live entry; an expired entry is dropped and reported absent
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache mutex poisoned");

        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let expires_at = self.clock.now() + self.ttl;
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(key.into(), Entry { value, expires_at });
    }

    /// Drop every entry whose key starts with `prefix`; returns the count
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    /// Explicit cleanup trigger; returns the number of entries reaped
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ManualClock;
    use super::*;

    fn cache_with_clock(ttl_secs: u64) -> (TtlCache<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::new(Duration::from_secs(ttl_secs), clock.clone());
        (cache, clock)
    }

    #[test]
    fn entries_live_until_ttl() {
        let (cache, clock) = cache_with_clock(60);
        cache.insert("v1:chat:u1:list", "value".to_string());

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("v1:chat:u1:list").as_deref(), Some("value"));

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.get("v1:chat:u1:list"), None);
    }

    #[test]
    fn expired_entry_is_removed_on_read() {
        let (cache, clock) = cache_with_clock(10);
        cache.insert("k", "v".to_string());
        clock.advance(Duration::from_secs(11));

        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn prefix_invalidation_is_scoped() {
        let (cache, _clock) = cache_with_clock(60);
        cache.insert("v1:chat:u1:list", "a".to_string());
        cache.insert("v1:chat:u1:unread", "b".to_string());
        cache.insert("v1:chat:u2:list", "c".to_string());

        let dropped = cache.invalidate_prefix("v1:chat:u1:");
        assert_eq!(dropped, 2);
        assert_eq!(cache.get("v1:chat:u1:list"), None);
        assert_eq!(cache.get("v1:chat:u2:list").as_deref(), Some("c"));
    }

    #[test]
    fn purge_expired_is_an_explicit_trigger() {
        let (cache, clock) = cache_with_clock(10);
        cache.insert("a", "1".to_string());
        cache.insert("b", "2".to_string());
        clock.advance(Duration::from_secs(5));
        cache.insert("c", "3".to_string());
        clock.advance(Duration::from_secs(6));

        // a and b are past TTL, c is not; nothing is reaped until asked
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn insert_overwrites_and_refreshes_ttl() {
        let (cache, clock) = cache_with_clock(10);
        cache.insert("k", "old".to_string());
        clock.advance(Duration::from_secs(8));
        cache.insert("k", "new".to_string());
        clock.advance(Duration::from_secs(8));

        assert_eq!(cache.get("k").as_deref(), Some("new"));
    }
}
