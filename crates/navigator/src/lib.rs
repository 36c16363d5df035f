//! Hierarchical FAQ navigation and the admin edit workflow.
//!
//! The crate turns a flat, parent-referencing set of [`QuestionNode`]s into
//! paginated menus and tracks per-user pending edits. Storage and the chat
//! transport stay outside, behind [`QuestionStore`] and the render types in
//! [`shared::protocol`].

use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{Media, NodeId, QuestionNode, UserId};

pub mod access;
pub mod deadline;
pub mod engine;
pub mod projector;
pub mod sessions;
pub mod texts;
pub mod tree;

pub use access::AccessPolicy;
pub use deadline::WithDeadline;
pub use engine::{Navigator, NavigatorSettings, NodeView};
pub use projector::render_page;
pub use sessions::{EditFailure, EditIntent, EditKind, EditOutcome, EditSessions, PendingEdit};

/// Durable storage of question nodes and language preferences.
///
/// Each call is treated as atomic: fully applied or failed.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Every node in `language`, ordered by id, with `children` populated.
    async fn questions_by_language(&self, language: &str) -> Result<Vec<QuestionNode>>;
    async fn children_of(&self, parent_id: NodeId) -> Result<Vec<QuestionNode>>;
    async fn node_by_id(&self, id: NodeId) -> Result<Option<QuestionNode>>;
    async fn language_of(&self, user_id: UserId) -> Result<Option<String>>;
    async fn set_language(&self, user_id: UserId, language: &str) -> Result<()>;
    async fn create_node(
        &self,
        language: &str,
        text: &str,
        answer: &str,
        parent_id: NodeId,
    ) -> Result<NodeId>;
    async fn update_node(&self, id: NodeId, text: &str, answer: &str) -> Result<()>;
    async fn update_media(&self, id: NodeId, media: &Media) -> Result<()>;
    /// Deletes `id` and all of its descendants, children before parents.
    /// Returns the deleted ids in deletion order; empty when `id` is absent.
    async fn delete_node(&self, id: NodeId) -> Result<Vec<NodeId>>;
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
