//! Bounded in-memory cache of hydrated user logs.
//!
//! Disk is the source of truth, so an evicted log is simply re-read on next
//! use. Eviction is least-recently-used, tracked with a logical clock.

use std::collections::HashMap;

use crate::domain::{UserId, UserLog};

#[derive(Debug)]
struct CachedLog {
    log: UserLog,
    last_used: u64,
}

/// Mapping from user to hydrated log with a fixed capacity
#[derive(Debug)]
pub struct LogCache {
    capacity: usize,
    clock: u64,
    logs: HashMap<UserId, CachedLog>,
}

impl LogCache {
    /// Create an empty cache holding at most `capacity` users (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            clock: 0,
            logs: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.logs.contains_key(&user)
    }

    /// Look up a log and mark it as recently used
    pub fn get_mut(&mut self, user: UserId) -> Option<&mut UserLog> {
        self.clock += 1;
        let now = self.clock;
        self.logs.get_mut(&user).map(|cached| {
            cached.last_used = now;
            &mut cached.log
        })
    }

    /// Insert a freshly hydrated log, evicting the least recently used one
    /// if the cache is full. Returns the evicted user, if any.
    pub fn insert(&mut self, user: UserId, log: UserLog) -> Option<UserId> {
        self.clock += 1;

        let evicted = if !self.logs.contains_key(&user) && self.logs.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.logs.insert(
            user,
            CachedLog {
                log,
                last_used: self.clock,
            },
        );

        evicted
    }

    pub fn remove(&mut self, user: UserId) -> Option<UserLog> {
        self.logs.remove(&user).map(|cached| cached.log)
    }

    fn evict_oldest(&mut self) -> Option<UserId> {
        let oldest = self
            .logs
            .iter()
            .min_by_key(|(_, cached)| cached.last_used)
            .map(|(user, _)| *user)?;
        self.logs.remove(&oldest);
        Some(oldest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JournalEntry;

    fn log_with(text: &str) -> UserLog {
        UserLog {
            journal: vec![JournalEntry::new(1, text)],
            qa: Vec::new(),
        }
    }

    #[test]
    fn test_capacity_is_at_least_one() {
        let cache = LogCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = LogCache::new(2);
        assert_eq!(cache.insert(UserId(1), log_with("one")), None);
        assert_eq!(cache.insert(UserId(2), log_with("two")), None);

        // Touch user 1 so user 2 becomes the oldest
        assert!(cache.get_mut(UserId(1)).is_some());

        assert_eq!(cache.insert(UserId(3), log_with("three")), Some(UserId(2)));
        assert!(cache.contains(UserId(1)));
        assert!(!cache.contains(UserId(2)));
        assert!(cache.contains(UserId(3)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reinsert_does_not_evict() {
        let mut cache = LogCache::new(1);
        cache.insert(UserId(1), log_with("one"));
        assert_eq!(cache.insert(UserId(1), log_with("again")), None);
        assert_eq!(
            cache.get_mut(UserId(1)).unwrap().journal[0].text,
            "again"
        );
    }

    #[test]
    fn test_remove() {
        let mut cache = LogCache::new(4);
        cache.insert(UserId(9), log_with("nine"));
        assert!(cache.remove(UserId(9)).is_some());
        assert!(cache.is_empty());
        assert!(cache.remove(UserId(9)).is_none());
    }
}
