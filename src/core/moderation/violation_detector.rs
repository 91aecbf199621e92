// Violation predicates.
//
// Message checks are pure functions of the policy and content. The bio check
// goes through the bio resolver and a per-(chat, user) throttle.

use super::bio_resolver::BioResolver;
use super::link_detector::contains_link;
use super::moderation_ports::ChatTransport;
use super::policy::ChatPolicy;
use super::ttl_cache::TtlCache;
use std::sync::Arc;
use std::time::Duration;

/// Link in the message body or caption, with the link filter on.
pub fn link_in_message_violation(policy: &ChatPolicy, content: Option<&str>) -> bool {
    policy.link_filter_enabled && content.is_some_and(contains_link)
}

/// Approval mode is on and the sender is neither admin nor approved.
pub fn approval_gate_blocks(policy: &ChatPolicy, exempt: bool) -> bool {
    policy.approval_mode_enabled && !exempt
}

pub struct ViolationDetector<T: ChatTransport> {
    bios: BioResolver<T>,
    // (chat_id, user_id) -> last bio-link flag
    bio_throttle: TtlCache<(i64, u64), ()>,
}

impl<T: ChatTransport> ViolationDetector<T> {
    pub fn new(
        transport: Arc<T>,
        bio_cache_ttl: Duration,
        bio_violation_throttle: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            bios: BioResolver::new(transport, bio_cache_ttl, fetch_timeout),
            bio_throttle: TtlCache::new(bio_violation_throttle),
        }
    }

    /// Whether the user's bio contains a link.
    ///
    /// Returns `true` at most once per throttle window for a given chat and
    /// user; the window starts when the flag is raised.
    pub async fn bio_link_violation(&self, policy: &ChatPolicy, chat_id: i64, user_id: u64) -> bool {
        if !policy.bio_link_filter_enabled {
            tracing::debug!(chat_id, "Bio link filter off");
            return false;
        }

        let key = (chat_id, user_id);
        if self.bio_throttle.get(&key).is_some() {
            tracing::debug!(chat_id, user_id, "Bio violation check throttled");
            return false;
        }

        let bio = self.bios.resolve_bio(user_id).await;
        if bio.is_empty() || !contains_link(&bio) {
            tracing::debug!(chat_id, user_id, "Bio clean");
            return false;
        }

        // Another handler may have flagged the same user while we were fetching.
        if !self.bio_throttle.insert_if_vacant(key, ()) {
            tracing::debug!(chat_id, user_id, "Bio violation already flagged in this window");
            return false;
        }

        tracing::info!(chat_id, user_id, "Bio link detected");
        true
    }
}
