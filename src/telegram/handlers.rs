// Update routing - turns Telegram updates into core moderation events.
//
// This layer is THIN: filter the update, extract primitive data, call the
// service under the error boundary. No moderation decisions are made here.

use super::Moderation;
use crate::core::moderation::{run_guarded, InboundMessage, NewMembersEvent, Sender};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{MessageKind, User};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
type HandlerResult = Result<(), Error>;

/// Handler tree for the dispatcher.
pub fn schema() -> UpdateHandler<Error> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .filter(is_group_chat)
                .branch(dptree::filter(is_join_message).endpoint(on_new_members))
                .branch(dptree::filter(is_user_message).endpoint(on_message)),
        )
        .branch(
            Update::filter_edited_message()
                .filter(is_group_chat)
                .filter(is_user_message)
                .endpoint(on_edited_message),
        )
}

fn is_group_chat(msg: Message) -> bool {
    msg.chat.is_group() || msg.chat.is_supergroup()
}

fn is_join_message(msg: Message) -> bool {
    msg.new_chat_members().is_some()
}

/// Regular (non-service) message with a known sender.
fn is_user_message(msg: Message) -> bool {
    msg.from.is_some() && matches!(msg.kind, MessageKind::Common(_))
}

fn to_sender(user: &User) -> Sender {
    Sender {
        user_id: user.id.0,
        is_bot: user.is_bot,
        first_name: user.first_name.clone(),
        username: user.username.clone(),
    }
}

fn to_inbound(msg: &Message) -> Option<InboundMessage> {
    let user = msg.from.as_ref()?;
    Some(InboundMessage {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        sender: to_sender(user),
        content: msg.text().or_else(|| msg.caption()).map(str::to_owned),
    })
}

async fn on_message(msg: Message, moderation: Arc<Moderation>) -> HandlerResult {
    let Some(inbound) = to_inbound(&msg) else {
        return Ok(());
    };

    if let Some(outcome) = run_guarded("handle_message", moderation.handle_message(&inbound)).await
    {
        tracing::debug!(
            chat_id = inbound.chat_id,
            message_id = inbound.message_id,
            ?outcome,
            "Message moderated"
        );
    }
    Ok(())
}

async fn on_edited_message(msg: Message, moderation: Arc<Moderation>) -> HandlerResult {
    let Some(inbound) = to_inbound(&msg) else {
        return Ok(());
    };

    if let Some(outcome) = run_guarded(
        "handle_edited_message",
        moderation.handle_edited_message(&inbound),
    )
    .await
    {
        tracing::debug!(
            chat_id = inbound.chat_id,
            message_id = inbound.message_id,
            ?outcome,
            "Edited message moderated"
        );
    }
    Ok(())
}

async fn on_new_members(msg: Message, moderation: Arc<Moderation>) -> HandlerResult {
    let members = msg
        .new_chat_members()
        .map(|users| users.iter().map(to_sender).collect())
        .unwrap_or_default();

    let event = NewMembersEvent {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        members,
    };

    if let Some(outcomes) =
        run_guarded("handle_new_members", moderation.handle_new_members(&event)).await
    {
        tracing::debug!(chat_id = event.chat_id, ?outcomes, "New members checked");
    }
    Ok(())
}
