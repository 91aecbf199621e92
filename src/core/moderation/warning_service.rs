// Warning escalation - per (chat, user) strike counter backed by the store.
//
// The increment is delegated to the store so it stays atomic across handlers
// running in parallel. Muting is the caller's job; this service only decides.

use super::moderation_models::WarningOutcome;
use super::moderation_ports::{ModerationError, ModerationStore};
use std::sync::Arc;

pub struct WarningService<S: ModerationStore> {
    store: Arc<S>,
    threshold: u32,
}

impl<S: ModerationStore> WarningService<S> {
    pub fn new(store: Arc<S>, threshold: u32) -> Self {
        Self {
            store,
            threshold: threshold.max(1),
        }
    }

    /// Add one warning and report where the user stands.
    ///
    /// When the outcome is final the caller must mute the user and then call
    /// [`reset_warning`](Self::reset_warning), whether or not the mute worked.
    pub async fn record_violation(
        &self,
        chat_id: i64,
        user_id: u64,
    ) -> Result<WarningOutcome, ModerationError> {
        let count = self.store.increment_warning(chat_id, user_id).await?;
        tracing::debug!(chat_id, user_id, count, threshold = self.threshold, "Warning recorded");
        Ok(WarningOutcome {
            count,
            threshold: self.threshold,
        })
    }

    /// Clear a user's warnings. Idempotent.
    pub async fn reset_warning(&self, chat_id: i64, user_id: u64) -> Result<(), ModerationError> {
        self.store.reset_warning(chat_id, user_id).await
    }

    pub async fn current_warnings(&self, chat_id: i64, user_id: u64) -> Result<u32, ModerationError> {
        self.store.get_warnings(chat_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::test_support::MockStore;

    #[tokio::test]
    async fn test_counts_up_to_threshold() {
        let warnings = WarningService::new(Arc::new(MockStore::new()), 3);

        let first = warnings.record_violation(-100, 1).await.unwrap();
        assert_eq!(first.count, 1);
        assert!(!first.is_final());

        let second = warnings.record_violation(-100, 1).await.unwrap();
        assert_eq!(second.count, 2);
        assert!(!second.is_final());

        let third = warnings.record_violation(-100, 1).await.unwrap();
        assert_eq!(third.count, 3);
        assert!(third.is_final());
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let warnings = WarningService::new(Arc::new(MockStore::new()), 3);

        warnings.reset_warning(-100, 1).await.unwrap();
        warnings.record_violation(-100, 1).await.unwrap();
        warnings.reset_warning(-100, 1).await.unwrap();
        warnings.reset_warning(-100, 1).await.unwrap();

        assert_eq!(warnings.current_warnings(-100, 1).await.unwrap(), 0);
        assert_eq!(warnings.record_violation(-100, 1).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_counters_are_keyed_by_chat_and_user() {
        let warnings = WarningService::new(Arc::new(MockStore::new()), 3);

        warnings.record_violation(-100, 1).await.unwrap();
        warnings.record_violation(-100, 1).await.unwrap();
        warnings.record_violation(-200, 1).await.unwrap();
        warnings.record_violation(-100, 2).await.unwrap();

        assert_eq!(warnings.current_warnings(-100, 1).await.unwrap(), 2);
        assert_eq!(warnings.current_warnings(-200, 1).await.unwrap(), 1);
        assert_eq!(warnings.current_warnings(-100, 2).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_violations_get_distinct_counts() {
        let warnings = Arc::new(WarningService::new(Arc::new(MockStore::new()), 100));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let warnings = Arc::clone(&warnings);
            handles.push(tokio::spawn(async move {
                warnings.record_violation(-100, 1).await.unwrap().count
            }));
        }

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=20).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let store = Arc::new(MockStore::new());
        store.set_unavailable(true);
        let warnings = WarningService::new(store, 3);

        assert!(warnings.record_violation(-100, 1).await.is_err());
    }
}
