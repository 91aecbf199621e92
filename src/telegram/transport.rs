// Telegram implementation of the moderation ports.
//
// Translates core requests into Bot API calls. Errors are mapped to
// `TransportError`; the core decides whether they matter.

use crate::core::moderation::{ChatTransport, RoleResolver, TransportError};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatPermissions, MessageId, ParseMode, ReplyParameters};
use teloxide::RequestError;

fn request_error(e: RequestError) -> TransportError {
    TransportError::Request(e.to_string())
}

/// Replies usually target a message we just deleted, so the reply must not
/// depend on the original still existing.
fn reply_parameters(message_id: i32) -> ReplyParameters {
    ReplyParameters {
        allow_sending_without_reply: Some(true),
        ..ReplyParameters::new(MessageId(message_id))
    }
}

pub struct TelegramTransport {
    bot: Bot,
    /// Treated as admin in every chat
    owner_id: Option<u64>,
}

impl TelegramTransport {
    pub fn new(bot: Bot, owner_id: Option<u64>) -> Self {
        Self { bot, owner_id }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), TransportError> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .map_err(request_error)?;
        Ok(())
    }

    async fn restrict_send(
        &self,
        chat_id: i64,
        user_id: u64,
        allowed: bool,
    ) -> Result<(), TransportError> {
        let permissions = if allowed {
            ChatPermissions::all()
        } else {
            ChatPermissions::empty()
        };

        self.bot
            .restrict_chat_member(ChatId(chat_id), UserId(user_id), permissions)
            .await
            .map_err(request_error)?;
        Ok(())
    }

    async fn fetch_profile_bio(&self, user_id: u64) -> Result<Option<String>, TransportError> {
        // A user's private chat id is their user id
        let chat = self
            .bot
            .get_chat(ChatId(user_id as i64))
            .await
            .map_err(request_error)?;
        Ok(chat.bio().map(str::to_owned))
    }

    async fn reply_to(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
    ) -> Result<(), TransportError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .reply_parameters(reply_parameters(message_id))
            .await
            .map_err(request_error)?;
        Ok(())
    }
}

#[async_trait]
impl RoleResolver for TelegramTransport {
    async fn is_admin(&self, chat_id: i64, user_id: u64) -> bool {
        if self.owner_id == Some(user_id) {
            return true;
        }

        match self
            .bot
            .get_chat_member(ChatId(chat_id), UserId(user_id))
            .await
        {
            Ok(member) => member.is_privileged(),
            Err(e) => {
                tracing::warn!(chat_id, user_id, "Admin check failed: {}", e);
                false
            }
        }
    }
}
