use std::collections::HashMap;

use chrono::{DateTime, Utc};
use shared::{
    domain::{Media, NodeId, UserId},
    error::{ErrorCode, FaqError},
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::QuestionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditIntent {
    Create { parent_id: NodeId, language: String },
    Update { target_id: NodeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Create,
    Update,
}

impl EditIntent {
    pub fn kind(&self) -> EditKind {
        match self {
            EditIntent::Create { .. } => EditKind::Create,
            EditIntent::Update { .. } => EditKind::Update,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingEdit {
    pub intent: EditIntent,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// No pending edit for the user; the message is ordinary chat.
    NoSession,
    Created(NodeId),
    Updated(NodeId),
}

#[derive(Debug, Error)]
#[error("{kind:?} edit failed: {error}")]
pub struct EditFailure {
    pub kind: EditKind,
    pub error: FaqError,
}

/// Per-user pending create/update operations, at most one per user.
///
/// Lookups share the read lock; `begin_*` and the take step of `consume`
/// take the write lock. Nothing here survives a restart.
#[derive(Debug, Default)]
pub struct EditSessions {
    pending: RwLock<HashMap<UserId, PendingEdit>>,
}

impl EditSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any pending edit of `user_id` with a create under `parent_id`.
    pub async fn begin_add(&self, user_id: UserId, parent_id: NodeId, language: impl Into<String>) {
        self.begin(
            user_id,
            EditIntent::Create {
                parent_id,
                language: language.into(),
            },
        )
        .await;
    }

    /// Replaces any pending edit of `user_id` with an update of `target_id`.
    pub async fn begin_edit(&self, user_id: UserId, target_id: NodeId) {
        self.begin(user_id, EditIntent::Update { target_id }).await;
    }

    async fn begin(&self, user_id: UserId, intent: EditIntent) {
        let session = PendingEdit {
            intent,
            started_at: Utc::now(),
        };
        let replaced = self.pending.write().await.insert(user_id, session);
        if let Some(previous) = replaced {
            debug!(
                user_id = user_id.0,
                age_secs = (Utc::now() - previous.started_at).num_seconds(),
                "pending edit replaced"
            );
        }
    }

    pub async fn pending(&self, user_id: UserId) -> Option<PendingEdit> {
        self.pending.read().await.get(&user_id).cloned()
    }

    #[cfg(test)]
    pub(crate) async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// Completes the pending edit of `user_id` with a `question|answer` body.
    ///
    /// A body without `|`, or with an empty question, fails with
    /// `InvalidFormat` and keeps the session for a retry. Otherwise the session
    /// is removed before the store is called, so concurrent messages apply it
    /// at most once and a `begin_*` issued during the write survives.
    pub async fn consume<S>(
        &self,
        store: &S,
        user_id: UserId,
        raw_text: &str,
        media: Option<&Media>,
    ) -> Result<EditOutcome, EditFailure>
    where
        S: QuestionStore + ?Sized,
    {
        let Some(session) = self.pending(user_id).await else {
            return Ok(EditOutcome::NoSession);
        };

        let Some((text, answer)) = split_payload(raw_text) else {
            return Err(EditFailure {
                kind: session.intent.kind(),
                error: FaqError::invalid_format(),
            });
        };

        let Some(session) = self.pending.write().await.remove(&user_id) else {
            debug!(user_id = user_id.0, "pending edit already consumed");
            return Ok(EditOutcome::NoSession);
        };
        let kind = session.intent.kind();

        match apply(store, &session.intent, text, answer, media).await {
            Ok(outcome) => {
                info!(user_id = user_id.0, ?outcome, "pending edit applied");
                Ok(outcome)
            }
            Err(err) => {
                warn!(user_id = user_id.0, error = %format!("{err:#}"), "pending edit failed");
                Err(EditFailure {
                    kind,
                    error: FaqError::store_failure(err),
                })
            }
        }
    }
}

async fn apply<S>(
    store: &S,
    intent: &EditIntent,
    text: &str,
    answer: &str,
    media: Option<&Media>,
) -> anyhow::Result<EditOutcome>
where
    S: QuestionStore + ?Sized,
{
    match intent {
        EditIntent::Update { target_id } => {
            store.update_node(*target_id, text, answer).await?;
            if let Some(media) = media {
                store.update_media(*target_id, media).await?;
            }
            Ok(EditOutcome::Updated(*target_id))
        }
        EditIntent::Create {
            parent_id,
            language,
        } => {
            let id = store.create_node(language, text, answer, *parent_id).await?;
            if let Some(media) = media {
                store.update_media(id, media).await?;
            }
            Ok(EditOutcome::Created(id))
        }
    }
}

/// Splits on the first `|` and trims both halves. The question half must not
/// be empty; it becomes a button label.
pub fn split_payload(raw: &str) -> Option<(&str, &str)> {
    let (text, answer) = raw.split_once('|')?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some((text, answer.trim()))
}

impl EditFailure {
    pub fn code(&self) -> ErrorCode {
        self.error.code
    }
}

#[cfg(test)]
#[path = "tests/sessions_tests.rs"]
mod tests;
