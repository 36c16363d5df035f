use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use shared::{
    domain::{ChatId, Media, MessageId},
    protocol::{MenuView, Outgoing},
};

use crate::dispatch::Outbound;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Sent {
    Text(ChatId, Outgoing),
    Media(ChatId, Media),
    Delete(ChatId, MessageId),
    EditMenu(ChatId, MessageId, MenuView),
    EditText(ChatId, MessageId, String),
    Ack(String),
}

/// Outbound transport that records calls instead of sending them.
#[derive(Default)]
pub(crate) struct FakeOutbound {
    sent: Mutex<Vec<Sent>>,
    fail_deletes: Mutex<bool>,
    fail_media: Mutex<bool>,
}

impl FakeOutbound {
    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("sent").clone()
    }

    pub(crate) fn fail_deletes(&self) {
        *self.fail_deletes.lock().expect("flag") = true;
    }

    pub(crate) fn fail_media(&self) {
        *self.fail_media.lock().expect("flag") = true;
    }

    fn push(&self, entry: Sent) {
        self.sent.lock().expect("sent").push(entry);
    }
}

#[async_trait]
impl Outbound for FakeOutbound {
    async fn send_text(&self, chat_id: ChatId, message: &Outgoing) -> Result<()> {
        self.push(Sent::Text(chat_id, message.clone()));
        Ok(())
    }

    async fn send_media(&self, chat_id: ChatId, media: &Media) -> Result<()> {
        if *self.fail_media.lock().expect("flag") {
            bail!("wrong file identifier/HTTP URL specified");
        }
        self.push(Sent::Media(chat_id, media.clone()));
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        if *self.fail_deletes.lock().expect("flag") {
            bail!("message can't be deleted");
        }
        self.push(Sent::Delete(chat_id, message_id));
        Ok(())
    }

    async fn edit_menu(&self, chat_id: ChatId, message_id: MessageId, menu: &MenuView) -> Result<()> {
        self.push(Sent::EditMenu(chat_id, message_id, menu.clone()));
        Ok(())
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        _menu: &MenuView,
    ) -> Result<()> {
        self.push(Sent::EditText(chat_id, message_id, text.to_string()));
        Ok(())
    }

    async fn ack_callback(&self, callback_id: &str) -> Result<()> {
        self.push(Sent::Ack(callback_id.to_string()));
        Ok(())
    }
}
