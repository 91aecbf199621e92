// Moderation pipeline - core business logic for group message moderation.
//
// This service handles:
// - Exemptions (admins and approved users)
// - Bio link, approval mode and link filter checks, in that order
// - Warning escalation (warn -> mute + reset)
// - Auto-delete scheduling for fresh and edited messages
//
// NO Telegram dependencies here - the transport and role lookups are ports.

use super::auto_delete::AutoDeleteScheduler;
use super::moderation_models::{
    InboundMessage, MessageKey, ModerationConfig, ModerationOutcome, NewMembersEvent, Sender,
    ViolationKind, WarningOutcome,
};
use super::moderation_ports::{
    bounded, ChatTransport, ModerationError, ModerationStore, RoleResolver,
};
use super::policy::{self, flag_value, load_policy, ChatPolicy, PolicyFlag, AUTO_DELETE_KEY};
use super::violation_detector::{
    approval_gate_blocks, link_in_message_violation, ViolationDetector,
};
use super::warning_service::WarningService;
use std::sync::Arc;

pub const UNAPPROVED_REPLY: &str = "❌ You are not approved to speak here.";

/// Escape the three characters that matter in Telegram HTML.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Reply text for a warning. The final one announces the mute.
pub fn warning_text(warning: &WarningOutcome, sender: &Sender, reason: &str) -> String {
    let name = escape_html(&sender.display_name());
    if warning.is_final() {
        format!(
            "🔇 <b>Final Warning for {}</b>\n\n{}\nYou have been <b>muted</b>.",
            name, reason
        )
    } else {
        format!(
            "⚠️ <b>Warning {}/{} for {}</b>\n\n{}\nFix this before you're muted.",
            warning.count, warning.threshold, name, reason
        )
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ModerationService<S, T, R>
where
    S: ModerationStore,
    T: ChatTransport,
    R: RoleResolver,
{
    store: Arc<S>,
    transport: Arc<T>,
    roles: Arc<R>,
    detector: ViolationDetector<T>,
    warnings: WarningService<S>,
    auto_delete: AutoDeleteScheduler<T>,
    config: ModerationConfig,
}

impl<S, T, R> ModerationService<S, T, R>
where
    S: ModerationStore,
    T: ChatTransport,
    R: RoleResolver,
{
    pub fn new(store: Arc<S>, transport: Arc<T>, roles: Arc<R>, config: ModerationConfig) -> Self {
        let detector = ViolationDetector::new(
            Arc::clone(&transport),
            config.bio_cache_ttl,
            config.bio_violation_throttle,
            config.transport_timeout,
        );
        let warnings = WarningService::new(Arc::clone(&store), config.warning_threshold);
        let auto_delete =
            AutoDeleteScheduler::new(Arc::clone(&transport), config.transport_timeout);

        Self {
            store,
            transport,
            roles,
            detector,
            warnings,
            auto_delete,
            config,
        }
    }

    // ------------------------------------------------------------------------
    // Event handlers
    // ------------------------------------------------------------------------

    /// Run a fresh group message through the pipeline.
    ///
    /// Checks run in a fixed order and stop at the first one that acts:
    /// bio link, approval mode, link in message, then auto-delete.
    pub async fn handle_message(
        &self,
        message: &InboundMessage,
    ) -> Result<ModerationOutcome, ModerationError> {
        if self.is_ignored_sender(&message.sender) {
            return Ok(ModerationOutcome::Ignored);
        }

        let chat_id = message.chat_id;
        let user_id = message.sender.user_id;
        let key = message.key();

        if self.is_exempt(chat_id, user_id).await? {
            tracing::debug!(chat_id, user_id, "Sender exempt from filtering");
            return Ok(ModerationOutcome::Exempt);
        }

        let policy = load_policy(self.store.as_ref(), chat_id).await?;

        if self
            .detector
            .bio_link_violation(&policy, chat_id, user_id)
            .await
        {
            let warning = self
                .handle_violation(key, &message.sender, ViolationKind::BioLink)
                .await?;
            return Ok(ModerationOutcome::Violation {
                kind: ViolationKind::BioLink,
                warning,
            });
        }

        if approval_gate_blocks(&policy, false) {
            tracing::debug!(chat_id, user_id, "Unapproved sender in approval mode");
            self.delete_quietly(key).await;
            self.reply_quietly(key, UNAPPROVED_REPLY).await;
            return Ok(ModerationOutcome::Unapproved);
        }

        if link_in_message_violation(&policy, message.content.as_deref()) {
            let warning = self
                .handle_violation(key, &message.sender, ViolationKind::MessageLink)
                .await?;
            return Ok(ModerationOutcome::Violation {
                kind: ViolationKind::MessageLink,
                warning,
            });
        }

        let delay = i64::try_from(policy.auto_delete_seconds).unwrap_or(i64::MAX);
        if self.auto_delete.schedule_deletion(key, delay) {
            return Ok(ModerationOutcome::AutoDeleteScheduled {
                delay_secs: policy.auto_delete_seconds,
            });
        }

        Ok(ModerationOutcome::Clean)
    }

    /// Edited messages are only subject to the edit filter: the first edit
    /// of a message queues it for deletion, later edits are ignored.
    pub async fn handle_edited_message(
        &self,
        message: &InboundMessage,
    ) -> Result<ModerationOutcome, ModerationError> {
        if self.is_ignored_sender(&message.sender) {
            return Ok(ModerationOutcome::Ignored);
        }

        let chat_id = message.chat_id;
        let user_id = message.sender.user_id;

        if self.is_exempt(chat_id, user_id).await? {
            return Ok(ModerationOutcome::Exempt);
        }

        if !policy::read_flag(self.store.as_ref(), chat_id, PolicyFlag::EditFilter).await? {
            return Ok(ModerationOutcome::Clean);
        }

        if self
            .auto_delete
            .schedule_edit_deletion(message.key(), self.config.edit_delete_delay)
        {
            tracing::debug!(
                chat_id,
                user_id,
                message_id = message.message_id,
                "Edited message queued for deletion"
            );
            Ok(ModerationOutcome::EditDeletionScheduled)
        } else {
            Ok(ModerationOutcome::EditAlreadyPending)
        }
    }

    /// Bio check for members who just joined. There's no message body yet,
    /// so the join message itself is what gets deleted and replied to.
    pub async fn handle_new_members(
        &self,
        event: &NewMembersEvent,
    ) -> Result<Vec<ModerationOutcome>, ModerationError> {
        let chat_id = event.chat_id;
        let policy = load_policy(self.store.as_ref(), chat_id).await?;
        if !policy.bio_link_filter_enabled {
            return Ok(Vec::new());
        }

        let key = MessageKey::new(chat_id, event.message_id);
        let mut outcomes = Vec::with_capacity(event.members.len());

        for member in &event.members {
            if self.is_ignored_sender(member) {
                outcomes.push(ModerationOutcome::Ignored);
                continue;
            }
            if self.is_exempt(chat_id, member.user_id).await? {
                outcomes.push(ModerationOutcome::Exempt);
                continue;
            }

            if self
                .detector
                .bio_link_violation(&policy, chat_id, member.user_id)
                .await
            {
                let warning = self
                    .handle_violation(key, member, ViolationKind::BioLink)
                    .await?;
                outcomes.push(ModerationOutcome::Violation {
                    kind: ViolationKind::BioLink,
                    warning,
                });
            } else {
                outcomes.push(ModerationOutcome::Clean);
            }
        }

        Ok(outcomes)
    }

    /// Delete, count, maybe mute, then warn. Only storage failures escape.
    async fn handle_violation(
        &self,
        key: MessageKey,
        sender: &Sender,
        kind: ViolationKind,
    ) -> Result<WarningOutcome, ModerationError> {
        let chat_id = key.chat_id;
        let user_id = sender.user_id;
        tracing::info!(chat_id, user_id, violation = %kind, "Violation detected");

        self.delete_quietly(key).await;

        let warning = self.warnings.record_violation(chat_id, user_id).await?;
        if warning.is_final() {
            self.mute_and_reset(chat_id, user_id).await?;
        }

        let text = warning_text(&warning, sender, kind.reason());
        self.reply_quietly(key, &text).await;

        Ok(warning)
    }

    /// The mute is best-effort; the reset always happens so a new cycle starts.
    async fn mute_and_reset(&self, chat_id: i64, user_id: u64) -> Result<(), ModerationError> {
        match bounded(
            self.config.transport_timeout,
            self.transport.restrict_send(chat_id, user_id, false),
        )
        .await
        {
            Ok(()) => tracing::info!(chat_id, user_id, "User muted"),
            Err(e) => tracing::warn!(chat_id, user_id, "Mute failed: {}", e),
        }
        self.warnings.reset_warning(chat_id, user_id).await
    }

    // ------------------------------------------------------------------------
    // Exemptions
    // ------------------------------------------------------------------------

    fn is_ignored_sender(&self, sender: &Sender) -> bool {
        sender.is_bot || self.config.bot_user_id == Some(sender.user_id)
    }

    /// Admins and approved users skip every filter.
    pub async fn is_exempt(&self, chat_id: i64, user_id: u64) -> Result<bool, ModerationError> {
        let is_admin = tokio::time::timeout(
            self.config.transport_timeout,
            self.roles.is_admin(chat_id, user_id),
        )
        .await
        .unwrap_or_else(|_| {
            tracing::warn!(chat_id, user_id, "Admin check timed out");
            false
        });

        if is_admin {
            return Ok(true);
        }
        self.store.is_approved(chat_id, user_id).await
    }

    // ------------------------------------------------------------------------
    // Best-effort transport calls
    // ------------------------------------------------------------------------

    async fn delete_quietly(&self, key: MessageKey) {
        if let Err(e) = bounded(
            self.config.transport_timeout,
            self.transport.delete_message(key.chat_id, key.message_id),
        )
        .await
        {
            tracing::warn!(
                chat_id = key.chat_id,
                message_id = key.message_id,
                "Failed to delete message: {}",
                e
            );
        }
    }

    async fn reply_quietly(&self, key: MessageKey, text: &str) {
        if let Err(e) = bounded(
            self.config.transport_timeout,
            self.transport.reply_to(key.chat_id, key.message_id, text),
        )
        .await
        {
            tracing::warn!(
                chat_id = key.chat_id,
                message_id = key.message_id,
                "Failed to send reply: {}",
                e
            );
        }
    }

    // ------------------------------------------------------------------------
    // Admin operations
    // ------------------------------------------------------------------------
    // Entry points for a chat command layer; nothing in the update handlers
    // calls them yet.

    #[allow(dead_code)]
    pub async fn policy(&self, chat_id: i64) -> Result<ChatPolicy, ModerationError> {
        load_policy(self.store.as_ref(), chat_id).await
    }

    #[allow(dead_code)]
    pub async fn set_policy_flag(
        &self,
        chat_id: i64,
        flag: PolicyFlag,
        enabled: bool,
    ) -> Result<(), ModerationError> {
        self.store
            .set_setting(chat_id, flag.key(), flag_value(enabled))
            .await
    }

    /// Set the auto-delete interval. 0 disables it.
    #[allow(dead_code)]
    pub async fn set_auto_delete_seconds(
        &self,
        chat_id: i64,
        seconds: u64,
    ) -> Result<(), ModerationError> {
        self.store
            .set_setting(chat_id, AUTO_DELETE_KEY, &seconds.to_string())
            .await
    }

    /// Flip approval mode and return the new state.
    #[allow(dead_code)]
    pub async fn toggle_approval_mode(&self, chat_id: i64) -> Result<bool, ModerationError> {
        let current =
            policy::read_flag(self.store.as_ref(), chat_id, PolicyFlag::ApprovalMode).await?;
        self.set_policy_flag(chat_id, PolicyFlag::ApprovalMode, !current)
            .await?;
        Ok(!current)
    }

    #[allow(dead_code)]
    pub async fn approve_user(&self, chat_id: i64, user_id: u64) -> Result<(), ModerationError> {
        self.store.approve_user(chat_id, user_id).await
    }

    #[allow(dead_code)]
    pub async fn unapprove_user(&self, chat_id: i64, user_id: u64) -> Result<bool, ModerationError> {
        self.store.unapprove_user(chat_id, user_id).await
    }

    #[allow(dead_code)]
    pub async fn approved_users(&self, chat_id: i64) -> Result<Vec<u64>, ModerationError> {
        self.store.approved_users(chat_id).await
    }

    /// Clear a user's warnings (admin action).
    #[allow(dead_code)]
    pub async fn reset_warnings(&self, chat_id: i64, user_id: u64) -> Result<(), ModerationError> {
        self.warnings.reset_warning(chat_id, user_id).await
    }

    /// Manual warning from an admin. Escalates exactly like an automatic one.
    #[allow(dead_code)]
    pub async fn warn_user(
        &self,
        chat_id: i64,
        user_id: u64,
    ) -> Result<WarningOutcome, ModerationError> {
        let warning = self.warnings.record_violation(chat_id, user_id).await?;
        if warning.is_final() {
            self.mute_and_reset(chat_id, user_id).await?;
        }
        Ok(warning)
    }

    /// Abort every pending deletion. Called on shutdown.
    pub fn shutdown(&self) {
        let aborted = self.auto_delete.abort_all();
        if aborted > 0 {
            tracing::info!(aborted, "Dropped pending auto-delete timers");
        }
    }

    #[allow(dead_code)]
    pub fn pending_deletions(&self) -> usize {
        self.auto_delete.pending_count()
    }
}

// ============================================================================
// TESTS
// ============================================================================
