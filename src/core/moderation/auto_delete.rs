// Delayed message deletion.
//
// Every pending deletion is a detached tokio task tracked in a per-message
// table, so "is one already pending?" has a definite answer and tasks can be
// aborted. Nothing is persisted: a restart drops whatever was in flight.

use super::moderation_models::MessageKey;
use super::moderation_ports::{bounded, ChatTransport};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Why a deletion was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOrigin {
    /// The chat's auto-delete interval
    AutoDelete,
    /// The message was edited under the edit filter
    Edit,
}

struct PendingDeletion {
    generation: u64,
    origin: DeletionOrigin,
    handle: AbortHandle,
}

pub struct AutoDeleteScheduler<T: ChatTransport> {
    transport: Arc<T>,
    pending: Arc<DashMap<MessageKey, PendingDeletion>>,
    // Messages already queued because of an edit
    edited: Arc<DashSet<MessageKey>>,
    next_generation: AtomicU64,
    request_timeout: Duration,
}

impl<T: ChatTransport> AutoDeleteScheduler<T> {
    pub fn new(transport: Arc<T>, request_timeout: Duration) -> Self {
        Self {
            transport,
            pending: Arc::new(DashMap::new()),
            edited: Arc::new(DashSet::new()),
            next_generation: AtomicU64::new(0),
            request_timeout,
        }
    }

    /// Delete a message after `delay_seconds`. Zero or negative is a no-op, as
    /// is a message that already has a deletion pending.
    ///
    /// Returns whether a new task was started.
    pub fn schedule_deletion(&self, key: MessageKey, delay_seconds: i64) -> bool {
        if delay_seconds <= 0 {
            return false;
        }

        match self.pending.entry(key) {
            Entry::Occupied(_) => {
                tracing::debug!(
                    chat_id = key.chat_id,
                    message_id = key.message_id,
                    "Deletion already pending"
                );
                false
            }
            Entry::Vacant(slot) => {
                let delay = Duration::from_secs(delay_seconds as u64);
                slot.insert(self.spawn_deletion(key, delay, DeletionOrigin::AutoDelete));
                true
            }
        }
    }

    /// Delete an edited message after `delay`, once per message.
    ///
    /// Repeated edits while the deletion is pending are ignored. An existing
    /// auto-delete timer for the same message is replaced, so there is never
    /// more than one task per message.
    pub fn schedule_edit_deletion(&self, key: MessageKey, delay: Duration) -> bool {
        if !self.edited.insert(key) {
            tracing::debug!(
                chat_id = key.chat_id,
                message_id = key.message_id,
                "Edited message already queued for deletion"
            );
            return false;
        }

        // Spawn while holding the entry so a zero-delay task can't finish and
        // clean up before its own entry exists.
        match self.pending.entry(key) {
            Entry::Occupied(mut slot) => {
                let previous = slot.insert(self.spawn_deletion(key, delay, DeletionOrigin::Edit));
                previous.handle.abort();
            }
            Entry::Vacant(slot) => {
                slot.insert(self.spawn_deletion(key, delay, DeletionOrigin::Edit));
            }
        }
        true
    }

    /// Abort a pending deletion. Returns whether one was pending.
    #[allow(dead_code)]
    pub fn cancel(&self, key: MessageKey) -> bool {
        match self.pending.remove(&key) {
            Some((_, task)) => {
                task.handle.abort();
                self.edited.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Abort every pending deletion (shutdown).
    pub fn abort_all(&self) -> usize {
        let keys: Vec<MessageKey> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut aborted = 0;
        for key in keys {
            if let Some((_, task)) = self.pending.remove(&key) {
                task.handle.abort();
                aborted += 1;
            }
        }
        self.edited.clear();
        aborted
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[allow(dead_code)]
    pub fn pending_origin(&self, key: MessageKey) -> Option<DeletionOrigin> {
        self.pending.get(&key).map(|task| task.origin)
    }

    #[allow(dead_code)]
    pub fn is_marked_edited(&self, key: MessageKey) -> bool {
        self.edited.contains(&key)
    }

    fn spawn_deletion(
        &self,
        key: MessageKey,
        delay: Duration,
        origin: DeletionOrigin,
    ) -> PendingDeletion {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let transport = Arc::clone(&self.transport);
        let pending = Arc::clone(&self.pending);
        let edited = Arc::clone(&self.edited);
        let timeout = self.request_timeout;

        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match bounded(timeout, transport.delete_message(key.chat_id, key.message_id)).await {
                Ok(()) => tracing::debug!(
                    chat_id = key.chat_id,
                    message_id = key.message_id,
                    ?origin,
                    "Scheduled deletion done"
                ),
                Err(e) => tracing::warn!(
                    chat_id = key.chat_id,
                    message_id = key.message_id,
                    "Failed to delete message: {}",
                    e
                ),
            }

            // Always clear tracking, success or not. Only remove our own entry:
            // a newer task may have replaced us.
            if origin == DeletionOrigin::Edit {
                edited.remove(&key);
            }
            pending.remove_if(&key, |_, task| task.generation == generation);
        });

        PendingDeletion {
            generation,
            origin,
            handle: handle.abort_handle(),
        }
    }
}
