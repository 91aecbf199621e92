// Per-chat moderation policy, stored as plain key/value settings.

use super::moderation_ports::{ModerationError, ModerationStore};

/// Setting key holding the auto-delete interval in seconds.
pub const AUTO_DELETE_KEY: &str = "autodelete_interval";

/// An on/off policy switch and the key it's stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFlag {
    BioLinkFilter,
    LinkFilter,
    EditFilter,
    ApprovalMode,
}

impl PolicyFlag {
    pub fn key(&self) -> &'static str {
        match self {
            PolicyFlag::BioLinkFilter => "biofilter",
            PolicyFlag::LinkFilter => "linkfilter",
            PolicyFlag::EditFilter => "editmode",
            PolicyFlag::ApprovalMode => "approval_mode",
        }
    }
}

/// Everything the pipeline needs to know about a chat's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatPolicy {
    pub bio_link_filter_enabled: bool,
    pub link_filter_enabled: bool,
    pub edit_filter_enabled: bool,
    pub approval_mode_enabled: bool,
    /// 0 disables auto-delete
    pub auto_delete_seconds: u64,
}

/// Flags are on for `1`, `true`, `on`, `yes` (any case). Everything else is off.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

pub fn flag_value(enabled: bool) -> &'static str {
    if enabled {
        "1"
    } else {
        "0"
    }
}

/// Unparsable or negative intervals mean "disabled".
pub fn parse_seconds(value: &str) -> u64 {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(|secs| secs as u64)
        .unwrap_or(0)
}

pub async fn read_flag<S: ModerationStore + ?Sized>(
    store: &S,
    chat_id: i64,
    flag: PolicyFlag,
) -> Result<bool, ModerationError> {
    let raw = store.get_setting_or(chat_id, flag.key(), "0").await?;
    Ok(parse_flag(&raw))
}

/// Load the full policy for a chat. Storage failures propagate; a policy is
/// never guessed.
pub async fn load_policy<S: ModerationStore + ?Sized>(
    store: &S,
    chat_id: i64,
) -> Result<ChatPolicy, ModerationError> {
    let auto_delete = store
        .get_setting_or(chat_id, AUTO_DELETE_KEY, "0")
        .await?;

    Ok(ChatPolicy {
        bio_link_filter_enabled: read_flag(store, chat_id, PolicyFlag::BioLinkFilter).await?,
        link_filter_enabled: read_flag(store, chat_id, PolicyFlag::LinkFilter).await?,
        edit_filter_enabled: read_flag(store, chat_id, PolicyFlag::EditFilter).await?,
        approval_mode_enabled: read_flag(store, chat_id, PolicyFlag::ApprovalMode).await?,
        auto_delete_seconds: parse_seconds(&auto_delete),
    })
}
