// Time-bounded key/value cache with lazy expiry.
//
// Entries are checked on read against a monotonic clock (`tokio::time::Instant`,
// so paused-time tests can drive it). There is no background sweep.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) >= ttl
    }
}

/// Result of a non-evicting lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Fresh(V),
    /// Present but older than the TTL
    Stale(V),
    Missing,
}

/// Concurrent TTL cache. Every operation touches a single key and is
/// serialized by the map's shard lock, so the stored (value, time) pair
/// is always written as a whole.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Get a fresh value. Expired entries are evicted and reported as missing.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let ttl = self.ttl;

        // Copy out before touching the map again; holding the ref across
        // remove_if would deadlock on the shard lock.
        let found = self
            .entries
            .get(key)
            .map(|entry| (entry.value.clone(), entry.is_expired(now, ttl)));

        match found {
            Some((value, false)) => Some(value),
            Some((_, true)) => {
                self.entries
                    .remove_if(key, |_, entry| entry.is_expired(now, ttl));
                None
            }
            None => None,
        }
    }

    /// Look up without evicting, so callers can fall back to a stale value.
    pub fn lookup(&self, key: &K) -> Lookup<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_expired(now, self.ttl) => Lookup::Stale(entry.value.clone()),
            Some(entry) => Lookup::Fresh(entry.value.clone()),
            None => Lookup::Missing,
        }
    }

    /// Store a value stamped with the current time, replacing any previous one.
    pub fn set(&self, key: K, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Store a value only if the key is absent or expired.
    ///
    /// Returns `true` if this call claimed the slot. Two racing callers can
    /// never both get `true` inside one TTL window.
    pub fn insert_if_vacant(&self, key: K, value: V) -> bool {
        let now = Instant::now();
        match self.entries.entry(key) {
            Entry::Occupied(mut slot) => {
                if slot.get().is_expired(now, self.ttl) {
                    slot.insert(CacheEntry {
                        value,
                        stored_at: now,
                    });
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(CacheEntry {
                    value,
                    stored_at: now,
                });
                true
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}
