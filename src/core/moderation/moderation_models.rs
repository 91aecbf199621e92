// Moderation domain models - data structures for the group moderation engine.
//
// These are pure domain types with no Telegram dependencies.
// The Telegram layer converts incoming updates into these before calling the core.

use std::time::Duration;

/// Default lifetime of a cached profile bio.
pub const DEFAULT_BIO_CACHE_TTL: Duration = Duration::from_secs(15 * 60);
/// Default minimum gap between two bio-link flags for the same user in a chat.
pub const DEFAULT_BIO_VIOLATION_THROTTLE: Duration = Duration::from_secs(20);
/// Default number of warnings that triggers a mute.
pub const DEFAULT_WARNING_THRESHOLD: u32 = 3;
/// Default upper bound on a single transport call.
pub const DEFAULT_TRANSPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for the moderation engine.
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    /// How long a fetched bio stays fresh
    pub bio_cache_ttl: Duration,
    /// Throttle window for repeated bio-link flags
    pub bio_violation_throttle: Duration,
    /// Warnings before the user gets muted
    pub warning_threshold: u32,
    /// Bounded wait applied to every transport call
    pub transport_timeout: Duration,
    /// Grace period before an edited message is removed
    pub edit_delete_delay: Duration,
    /// Our own user id, so we never moderate ourselves
    pub bot_user_id: Option<u64>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            bio_cache_ttl: DEFAULT_BIO_CACHE_TTL,
            bio_violation_throttle: DEFAULT_BIO_VIOLATION_THROTTLE,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            transport_timeout: DEFAULT_TRANSPORT_TIMEOUT,
            edit_delete_delay: Duration::ZERO,
            bot_user_id: None,
        }
    }
}

/// The author of a message, or a member who just joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub user_id: u64,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

impl Sender {
    /// Name used in warning replies: `@username` if set, otherwise `first_name (id)`.
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(username) if !username.is_empty() => format!("@{}", username),
            _ => format!("{} ({})", self.first_name, self.user_id),
        }
    }
}

/// Identifies a single message in a single chat.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct MessageKey {
    pub chat_id: i64,
    pub message_id: i32,
}

impl MessageKey {
    pub fn new(chat_id: i64, message_id: i32) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

/// A group message (fresh or edited) as seen by the engine.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub sender: Sender,
    /// Text body, or the media caption when there is no text
    pub content: Option<String>,
}

impl InboundMessage {
    pub fn key(&self) -> MessageKey {
        MessageKey::new(self.chat_id, self.message_id)
    }
}

/// A join service message listing the members that were added.
#[derive(Debug, Clone)]
pub struct NewMembersEvent {
    pub chat_id: i64,
    pub message_id: i32,
    pub members: Vec<Sender>,
}

/// Which rule a violation broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// The user's profile bio contains a link
    BioLink,
    /// The message body or caption contains a link
    MessageLink,
}

impl ViolationKind {
    /// User-facing explanation included in the warning reply.
    pub fn reason(&self) -> &'static str {
        match self {
            ViolationKind::BioLink => "Your bio contains a link, which is not allowed.",
            ViolationKind::MessageLink => "You are not allowed to share links in this group.",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::BioLink => write!(f, "Bio Link"),
            ViolationKind::MessageLink => write!(f, "Message Link"),
        }
    }
}

/// Result of recording one violation against a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningOutcome {
    /// Post-increment warning count
    pub count: u32,
    pub threshold: u32,
}

impl WarningOutcome {
    /// Whether this warning reached the threshold (mute + reset).
    pub fn is_final(&self) -> bool {
        self.count >= self.threshold
    }
}

/// What the pipeline did with a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationOutcome {
    /// Bot sender, our own message, or nothing to evaluate
    Ignored,
    /// Sender is an admin or approved user
    Exempt,
    /// A violation was handled (message deleted, warning recorded)
    Violation {
        kind: ViolationKind,
        warning: WarningOutcome,
    },
    /// Approval mode is on and the sender isn't approved
    Unapproved,
    /// Nothing fired; the message will be deleted after `delay_secs`
    AutoDeleteScheduled { delay_secs: u64 },
    /// Edited message queued for removal
    EditDeletionScheduled,
    /// Edited message already queued; nothing new was scheduled
    EditAlreadyPending,
    /// Nothing fired and nothing to schedule
    Clean,
}
