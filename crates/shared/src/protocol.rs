use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChatId, Media, MessageId, NodeId, UserId},
    error::{ErrorCode, FaqError},
};

/// Action encoded in an inline button and echoed back by the transport on press.
///
/// The string forms are the wire protocol between the chat transport and the
/// navigator: `q_<id>`, `p_<parent>_<page>`, `back_<child>`,
/// `add_question_<parent>`, `edit_<id>` and `del_<id>`. Numbers are decimal
/// without padding, so every accepted token re-encodes to the same string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallbackToken {
    Select { node_id: NodeId },
    Page { parent_id: NodeId, page: usize },
    Back { child_id: NodeId },
    AddQuestion { parent_id: NodeId },
    Edit { node_id: NodeId },
    Delete { node_id: NodeId },
}

impl CallbackToken {
    /// Tokens that only privileged users may act on.
    pub fn is_admin_action(&self) -> bool {
        matches!(
            self,
            CallbackToken::AddQuestion { .. }
                | CallbackToken::Edit { .. }
                | CallbackToken::Delete { .. }
        )
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackToken::Select { node_id } => write!(f, "q_{node_id}"),
            CallbackToken::Page { parent_id, page } => write!(f, "p_{parent_id}_{page}"),
            CallbackToken::Back { child_id } => write!(f, "back_{child_id}"),
            CallbackToken::AddQuestion { parent_id } => write!(f, "add_question_{parent_id}"),
            CallbackToken::Edit { node_id } => write!(f, "edit_{node_id}"),
            CallbackToken::Delete { node_id } => write!(f, "del_{node_id}"),
        }
    }
}

impl FromStr for CallbackToken {
    type Err = FaqError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        // `add_question_` must be tried before any shorter prefix.
        if let Some(rest) = raw.strip_prefix("add_question_") {
            return Ok(CallbackToken::AddQuestion {
                parent_id: parse_node_id(raw, rest)?,
            });
        }
        if let Some(rest) = raw.strip_prefix("back_") {
            return Ok(CallbackToken::Back {
                child_id: parse_node_id(raw, rest)?,
            });
        }
        if let Some(rest) = raw.strip_prefix("edit_") {
            return Ok(CallbackToken::Edit {
                node_id: parse_node_id(raw, rest)?,
            });
        }
        if let Some(rest) = raw.strip_prefix("del_") {
            return Ok(CallbackToken::Delete {
                node_id: parse_node_id(raw, rest)?,
            });
        }
        if let Some(rest) = raw.strip_prefix("q_") {
            return Ok(CallbackToken::Select {
                node_id: parse_node_id(raw, rest)?,
            });
        }
        if raw.starts_with("p_") {
            let parts: Vec<&str> = raw.split('_').collect();
            if parts.len() != 3 {
                return Err(invalid_token(raw));
            }
            let parent_id = parse_node_id(raw, parts[1])?;
            let page = parse_decimal(parts[2])
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| invalid_token(raw))?;
            return Ok(CallbackToken::Page { parent_id, page });
        }
        Err(invalid_token(raw))
    }
}

fn parse_node_id(raw: &str, digits: &str) -> Result<NodeId, FaqError> {
    parse_decimal(digits)
        .and_then(|n| i64::try_from(n).ok())
        .map(NodeId)
        .ok_or_else(|| invalid_token(raw))
}

/// Unsigned decimal with no sign, no padding and no trailing garbage.
fn parse_decimal(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

fn invalid_token(raw: &str) -> FaqError {
    FaqError::new(ErrorCode::InvalidToken, format!("unrecognized callback token {raw:?}"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuButton {
    pub label: String,
    pub token: CallbackToken,
}

impl MenuButton {
    pub fn new(label: impl Into<String>, token: CallbackToken) -> Self {
        Self {
            label: label.into(),
            token,
        }
    }
}

/// Inline menu, one inner vec per button row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuView {
    pub rows: Vec<Vec<MenuButton>>,
}

impl MenuView {
    pub fn tokens(&self) -> impl Iterator<Item = &CallbackToken> {
        self.rows.iter().flatten().map(|button| &button.token)
    }

    pub fn contains(&self, token: &CallbackToken) -> bool {
        self.tokens().any(|t| t == token)
    }

    /// Node ids offered for selection, in row order.
    pub fn item_ids(&self) -> Vec<NodeId> {
        self.tokens()
            .filter_map(|t| match t {
                CallbackToken::Select { node_id } => Some(*node_id),
                _ => None,
            })
            .collect()
    }

    /// Pages reachable from the navigation row.
    pub fn page_targets(&self) -> Vec<usize> {
        self.tokens()
            .filter_map(|t| match t {
                CallbackToken::Page { page, .. } => Some(*page),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    Plain,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Keyboard {
    Inline(MenuView),
    /// One-time reply keyboard, one button per option.
    Choice(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outgoing {
    pub text: String,
    pub format: TextFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<Keyboard>,
}

impl Outgoing {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::Plain,
            media: None,
            keyboard: None,
        }
    }

    pub fn with_menu(mut self, menu: MenuView) -> Self {
        self.keyboard = Some(Keyboard::Inline(menu));
        self
    }
}

/// What the transport should do in response to one inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Render {
    Silent,
    /// New message in the originating chat.
    Send(Outgoing),
    /// Delete the originating message, then send.
    Replace(Outgoing),
    /// Swap only the inline keyboard of the originating message.
    EditMenu(MenuView),
    /// Rewrite text and keyboard of the originating message.
    EditText { text: String, menu: MenuView },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Command, language label or free text; `text` is the caption for media messages.
    Message { text: String, media: Option<Media> },
    Callback { data: String },
}

/// Transport-neutral inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub chat_id: ChatId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    pub kind: EventKind,
}
