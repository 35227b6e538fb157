//! Bounded record of recently seen callback message ids.
//!
//! The callback sender redelivers a message when it does not get a response
//! in time, so the same `MsgId` may arrive more than once.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 1024;

pub struct MsgIdCache {
    capacity: usize,
    inner: Mutex<Seen>,
}

#[derive(Default)]
struct Seen {
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl MsgIdCache {
    /// A capacity of zero disables the cache: every id is reported as new.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Seen::default()),
        }
    }

    /// Records `id` and returns `true` if it had not been seen before.
    pub fn first_seen(&self, id: &str) -> bool {
        if self.capacity == 0 || id.is_empty() {
            return true;
        }

        let mut seen = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if seen.ids.contains(id) {
            debug!("Duplicate message id: {}", id);
            return false;
        }

        if seen.order.len() == self.capacity {
            if let Some(oldest) = seen.order.pop_front() {
                seen.ids.remove(&oldest);
            }
        }
        seen.order.push_back(id.to_string());
        seen.ids.insert(id.to_string());
        true
    }
}

impl Default for MsgIdCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_id_is_not_first_seen() {
        let cache = MsgIdCache::with_capacity(8);
        assert!(cache.first_seen("m1"));
        assert!(!cache.first_seen("m1"));
        assert!(cache.first_seen("m2"));
    }

    #[test]
    fn test_oldest_id_is_evicted() {
        let cache = MsgIdCache::with_capacity(2);
        assert!(cache.first_seen("a"));
        assert!(cache.first_seen("b"));
        assert!(cache.first_seen("c"));
        // "a" fell out when "c" arrived
        assert!(cache.first_seen("a"));
        assert!(!cache.first_seen("c"));
    }

    #[test]
    fn test_empty_id_and_zero_capacity_always_pass() {
        let cache = MsgIdCache::with_capacity(4);
        assert!(cache.first_seen(""));
        assert!(cache.first_seen(""));

        let disabled = MsgIdCache::with_capacity(0);
        assert!(disabled.first_seen("x"));
        assert!(disabled.first_seen("x"));
    }
}
