// Profile bio lookups with a TTL cache in front of the transport.
//
// Bio fetches are rate-limited by the platform, so a fresh cached value is
// always preferred and a failed fetch falls back to whatever we saw last.

use super::moderation_ports::{bounded, ChatTransport};
use super::ttl_cache::{Lookup, TtlCache};
use std::sync::Arc;
use std::time::Duration;

pub struct BioResolver<T: ChatTransport> {
    transport: Arc<T>,
    cache: TtlCache<u64, String>,
    fetch_timeout: Duration,
}

impl<T: ChatTransport> BioResolver<T> {
    pub fn new(transport: Arc<T>, ttl: Duration, fetch_timeout: Duration) -> Self {
        Self {
            transport,
            cache: TtlCache::new(ttl),
            fetch_timeout,
        }
    }

    /// Resolve a user's bio. Never fails: an empty string means "no bio"
    /// or "couldn't fetch and never cached".
    pub async fn resolve_bio(&self, user_id: u64) -> String {
        let previous = match self.cache.lookup(&user_id) {
            Lookup::Fresh(bio) => return bio,
            Lookup::Stale(bio) => Some(bio),
            Lookup::Missing => None,
        };

        match bounded(self.fetch_timeout, self.transport.fetch_profile_bio(user_id)).await {
            Ok(bio) => {
                let bio = bio.unwrap_or_default();
                self.cache.set(user_id, bio.clone());
                bio
            }
            Err(e) => {
                tracing::warn!(user_id, "Failed to fetch bio: {}", e);
                previous.unwrap_or_default()
            }
        }
    }
}
