use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::{
    domain::{ChatId, Media, MediaKind, MessageId},
    protocol::{Keyboard, MenuView, Outgoing, TextFormat},
};
use tracing::debug;

use crate::dispatch::Outbound;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub document: Option<Document>,
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Envelope<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct InlineButton {
    text: String,
    callback_data: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct ReplyButton {
    text: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub(crate) enum ReplyMarkup {
    Inline {
        inline_keyboard: Vec<Vec<InlineButton>>,
    },
    Reply {
        keyboard: Vec<Vec<ReplyButton>>,
        one_time_keyboard: bool,
        resize_keyboard: bool,
    },
}

impl ReplyMarkup {
    pub(crate) fn inline(menu: &MenuView) -> Self {
        ReplyMarkup::Inline {
            inline_keyboard: menu
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| InlineButton {
                            text: button.label.clone(),
                            callback_data: button.token.to_string(),
                        })
                        .collect()
                })
                .collect(),
        }
    }

    pub(crate) fn from_keyboard(keyboard: &Keyboard) -> Self {
        match keyboard {
            Keyboard::Inline(menu) => Self::inline(menu),
            Keyboard::Choice(options) => ReplyMarkup::Reply {
                keyboard: options
                    .iter()
                    .map(|text| vec![ReplyButton { text: text.clone() }])
                    .collect(),
                one_time_keyboard: true,
                resize_keyboard: true,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup>,
}

#[derive(Debug, Serialize)]
struct EditText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    reply_markup: ReplyMarkup,
}

#[derive(Debug, Serialize)]
struct EditMarkup {
    chat_id: i64,
    message_id: i64,
    reply_markup: ReplyMarkup,
}

fn parse_mode(format: TextFormat) -> Option<&'static str> {
    match format {
        TextFormat::Plain => None,
        TextFormat::Markdown => Some("Markdown"),
    }
}

/// Thin Bot API client; every method is one HTTPS call.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, poll_timeout_seconds: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(poll_timeout_seconds + 10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        })
    }

    async fn call<P, R>(&self, method: &str, payload: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let envelope: Envelope<R> = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .json(payload)
            .send()
            .await
            .with_context(|| format!("telegram {method} request failed"))?
            .json()
            .await
            .with_context(|| format!("telegram {method} returned an unreadable body"))?;

        if !envelope.ok {
            bail!(
                "telegram {method} rejected: {}",
                envelope.description.unwrap_or_default()
            );
        }
        envelope
            .result
            .with_context(|| format!("telegram {method} returned no result"))
    }

    pub async fn get_updates(&self, offset: i64, timeout_seconds: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &serde_json::json!({
                "offset": offset,
                "timeout": timeout_seconds,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }
}

#[async_trait]
impl Outbound for TelegramClient {
    async fn send_text(&self, chat_id: ChatId, message: &Outgoing) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                &SendMessage {
                    chat_id: chat_id.0,
                    text: &message.text,
                    parse_mode: parse_mode(message.format),
                    reply_markup: message.keyboard.as_ref().map(ReplyMarkup::from_keyboard),
                },
            )
            .await?;
        Ok(())
    }

    async fn send_media(&self, chat_id: ChatId, media: &Media) -> Result<()> {
        let (method, field) = match media.kind {
            MediaKind::Document => ("sendDocument", "document"),
            MediaKind::Photo => ("sendPhoto", "photo"),
        };
        let _: serde_json::Value = self
            .call(
                method,
                &serde_json::json!({ "chat_id": chat_id.0, field: media.handle }),
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                &serde_json::json!({ "chat_id": chat_id.0, "message_id": message_id.0 }),
            )
            .await?;
        Ok(())
    }

    async fn edit_menu(&self, chat_id: ChatId, message_id: MessageId, menu: &MenuView) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "editMessageReplyMarkup",
                &EditMarkup {
                    chat_id: chat_id.0,
                    message_id: message_id.0,
                    reply_markup: ReplyMarkup::inline(menu),
                },
            )
            .await?;
        Ok(())
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        menu: &MenuView,
    ) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                &EditText {
                    chat_id: chat_id.0,
                    message_id: message_id.0,
                    text,
                    reply_markup: ReplyMarkup::inline(menu),
                },
            )
            .await?;
        Ok(())
    }

    async fn ack_callback(&self, callback_id: &str) -> Result<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &serde_json::json!({ "callback_query_id": callback_id }),
            )
            .await?;
        debug!(callback_id, "callback acknowledged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        domain::NodeId,
        protocol::{CallbackToken, MenuButton},
    };

    #[test]
    fn inline_markup_carries_callback_tokens() {
        let menu = MenuView {
            rows: vec![
                vec![MenuButton::new("Shipping", CallbackToken::Select { node_id: NodeId(4) })],
                vec![MenuButton::new(
                    "➡️ Next",
                    CallbackToken::Page {
                        parent_id: NodeId(0),
                        page: 1,
                    },
                )],
            ],
        };
        let json = serde_json::to_value(ReplyMarkup::inline(&menu)).expect("json");
        assert_eq!(
            json,
            serde_json::json!({
                "inline_keyboard": [
                    [{ "text": "Shipping", "callback_data": "q_4" }],
                    [{ "text": "➡️ Next", "callback_data": "p_0_1" }],
                ]
            })
        );
    }

    #[test]
    fn choice_keyboard_is_one_time_reply_markup() {
        let markup = ReplyMarkup::from_keyboard(&Keyboard::Choice(vec![
            "English".into(),
            "Русский".into(),
        ]));
        let json = serde_json::to_value(markup).expect("json");
        assert_eq!(json["one_time_keyboard"], true);
        assert_eq!(json["keyboard"][1][0]["text"], "Русский");
    }

    #[test]
    fn parses_media_message_update() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 5,
                "from": { "id": 77, "is_bot": false, "first_name": "Ann" },
                "chat": { "id": 77, "type": "private" },
                "caption": "Q|A",
                "photo": [
                    { "file_id": "small", "file_unique_id": "s", "width": 90, "height": 90 },
                    { "file_id": "large", "file_unique_id": "l", "width": 800, "height": 800 }
                ]
            }
        }))
        .expect("update");
        let message = update.message.expect("message");
        assert_eq!(message.caption.as_deref(), Some("Q|A"));
        assert_eq!(message.photo.expect("photo")[0].file_id, "small");
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = TelegramClient::new("https://api.telegram.org/", "123:abc", 30).expect("client");
        assert_eq!(client.base_url, "https://api.telegram.org/bot123:abc");
    }
}
