use anyhow::Result;
use async_trait::async_trait;
use navigator::{Navigator, QuestionStore};
use shared::{
    domain::{ChatId, Media, MediaKind, MessageId, UserId},
    protocol::{EventKind, InboundEvent, MenuView, Outgoing, Render},
};
use tracing::{debug, warn};

use crate::telegram::Update;

/// Outbound half of the chat transport.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Sends `message` as text; its media, if any, is not sent here.
    async fn send_text(&self, chat_id: ChatId, message: &Outgoing) -> Result<()>;
    async fn send_media(&self, chat_id: ChatId, media: &Media) -> Result<()>;
    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<()>;
    async fn edit_menu(&self, chat_id: ChatId, message_id: MessageId, menu: &MenuView) -> Result<()>;
    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        menu: &MenuView,
    ) -> Result<()>;
    async fn ack_callback(&self, callback_id: &str) -> Result<()>;
}

/// One normalized update plus the callback id that must be acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub event: InboundEvent,
    pub callback_id: Option<String>,
}

pub fn normalize(update: &Update) -> Option<Incoming> {
    if let Some(query) = &update.callback_query {
        let (chat_id, message_id) = match &query.message {
            Some(message) => (ChatId(message.chat.id), Some(MessageId(message.message_id))),
            None => (ChatId(query.from.id), None),
        };
        return Some(Incoming {
            event: InboundEvent {
                user_id: UserId(query.from.id),
                chat_id,
                message_id,
                kind: EventKind::Callback {
                    data: query.data.clone().unwrap_or_default(),
                },
            },
            callback_id: Some(query.id.clone()),
        });
    }

    let message = update.message.as_ref()?;
    let from = message.from.as_ref()?;
    let text = message
        .caption
        .clone()
        .or_else(|| message.text.clone())
        .unwrap_or_default();
    let media = match (&message.document, &message.photo) {
        (Some(document), _) => Some(Media {
            kind: MediaKind::Document,
            handle: document.file_id.clone(),
        }),
        (None, Some(sizes)) => sizes.first().map(|size| Media {
            kind: MediaKind::Photo,
            handle: size.file_id.clone(),
        }),
        (None, None) => None,
    };

    Some(Incoming {
        event: InboundEvent {
            user_id: UserId(from.id),
            chat_id: ChatId(message.chat.id),
            message_id: Some(MessageId(message.message_id)),
            kind: EventKind::Message { text, media },
        },
        callback_id: None,
    })
}

/// Handles one update end to end. Errors are logged per update and never
/// stop the caller.
pub async fn process_update<S, O>(navigator: &Navigator<S>, outbound: &O, update: Update)
where
    S: QuestionStore,
    O: Outbound + ?Sized,
{
    let Some(incoming) = normalize(&update) else {
        debug!(update_id = update.update_id, "ignoring unsupported update");
        return;
    };

    let render = navigator.handle(&incoming.event).await;
    if let Err(error) = apply_render(outbound, &incoming.event, &render).await {
        warn!(
            update_id = update.update_id,
            user_id = incoming.event.user_id.0,
            error = %format!("{error:#}"),
            "failed to deliver reply"
        );
    }

    if let Some(callback_id) = &incoming.callback_id {
        if let Err(error) = outbound.ack_callback(callback_id).await {
            warn!(update_id = update.update_id, %error, "failed to acknowledge callback");
        }
    }
}

pub async fn apply_render<O>(outbound: &O, event: &InboundEvent, render: &Render) -> Result<()>
where
    O: Outbound + ?Sized,
{
    let chat_id = event.chat_id;
    match render {
        Render::Silent => Ok(()),
        Render::Send(message) => send(outbound, chat_id, message).await,
        Render::Replace(message) => {
            if let Some(message_id) = event.message_id {
                if let Err(error) = outbound.delete(chat_id, message_id).await {
                    debug!(chat_id = chat_id.0, %error, "source message not deleted");
                }
            }
            send(outbound, chat_id, message).await
        }
        Render::EditMenu(menu) => match event.message_id {
            Some(message_id) => outbound.edit_menu(chat_id, message_id, menu).await,
            None => Ok(()),
        },
        Render::EditText { text, menu } => match event.message_id {
            Some(message_id) => outbound.edit_text(chat_id, message_id, text, menu).await,
            None => Ok(()),
        },
    }
}

async fn send<O>(outbound: &O, chat_id: ChatId, message: &Outgoing) -> Result<()>
where
    O: Outbound + ?Sized,
{
    if let Some(media) = &message.media {
        if let Err(error) = outbound.send_media(chat_id, media).await {
            warn!(
                chat_id = chat_id.0,
                kind = media.kind.as_str(),
                error = %format!("{error:#}"),
                "media not delivered; sending answer text alone"
            );
        }
    }
    outbound.send_text(chat_id, message).await
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
