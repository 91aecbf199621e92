// Ports for the moderation engine - the traits the infra and Telegram layers implement.
//
// Storage is authoritative and durable (settings, approvals, warnings).
// Transport and role lookups are network calls and always go through `bounded`.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// A failed call to the messaging platform.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(String),
}

/// Run a transport call with an upper bound on how long it may take.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| TransportError::Timeout(limit))?
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistent per-chat settings, approvals and warning counters.
#[async_trait]
pub trait ModerationStore: Send + Sync {
    /// Read a raw setting value, `None` when it was never written.
    async fn get_setting(&self, chat_id: i64, key: &str) -> Result<Option<String>, ModerationError>;

    /// Upsert a raw setting value.
    async fn set_setting(&self, chat_id: i64, key: &str, value: &str)
        -> Result<(), ModerationError>;

    /// Read a setting, falling back to `default` when unset.
    async fn get_setting_or(
        &self,
        chat_id: i64,
        key: &str,
        default: &str,
    ) -> Result<String, ModerationError> {
        Ok(self
            .get_setting(chat_id, key)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }

    async fn is_approved(&self, chat_id: i64, user_id: u64) -> Result<bool, ModerationError>;

    async fn approve_user(&self, chat_id: i64, user_id: u64) -> Result<(), ModerationError>;

    /// Remove an approval. Returns whether the user was approved before.
    async fn unapprove_user(&self, chat_id: i64, user_id: u64) -> Result<bool, ModerationError>;

    async fn approved_users(&self, chat_id: i64) -> Result<Vec<u64>, ModerationError>;

    /// Atomically add one warning and return the new total.
    async fn increment_warning(&self, chat_id: i64, user_id: u64) -> Result<u32, ModerationError>;

    /// Clear a user's warnings. Clearing an empty counter is fine.
    async fn reset_warning(&self, chat_id: i64, user_id: u64) -> Result<(), ModerationError>;

    async fn get_warnings(&self, chat_id: i64, user_id: u64) -> Result<u32, ModerationError>;
}

// ============================================================================
// TRANSPORT TRAITS (PORTS)
// ============================================================================

/// Actions the engine asks the messaging platform to perform.
#[async_trait]
pub trait ChatTransport: Send + Sync + 'static {
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), TransportError>;

    /// Allow or revoke a member's permission to send messages.
    async fn restrict_send(
        &self,
        chat_id: i64,
        user_id: u64,
        allowed: bool,
    ) -> Result<(), TransportError>;

    /// Fetch the user's profile bio. `None` when they haven't set one.
    async fn fetch_profile_bio(&self, user_id: u64) -> Result<Option<String>, TransportError>;

    /// Reply to a message with HTML-formatted text.
    async fn reply_to(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
    ) -> Result<(), TransportError>;
}

/// Answers whether a user administers a chat.
#[async_trait]
pub trait RoleResolver: Send + Sync {
    async fn is_admin(&self, chat_id: i64, user_id: u64) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out_slow_call() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, TransportError>(())
        };

        let result = bounded(Duration::from_secs(5), slow).await;
        assert!(matches!(result, Err(TransportError::Timeout(d)) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_bounded_passes_through_inner_error() {
        let failing = async { Err::<(), _>(TransportError::Request("gone".into())) };

        let result = bounded(Duration::from_secs(5), failing).await;
        assert!(matches!(result, Err(TransportError::Request(msg)) if msg == "gone"));
    }
}
