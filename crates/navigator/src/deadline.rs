use std::{future::Future, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{Media, NodeId, QuestionNode, UserId};

use crate::QuestionStore;

/// Bounds every store call by an optional deadline.
///
/// A call that overruns fails like any other store error, which the engine
/// reports for that one event.
#[derive(Debug, Clone)]
pub struct WithDeadline<S> {
    inner: S,
    limit: Option<Duration>,
}

impl<S> WithDeadline<S> {
    pub fn new(inner: S, limit: Option<Duration>) -> Self {
        Self { inner, limit }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn guard<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.limit {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| anyhow!("store call `{op}` exceeded {}ms", limit.as_millis()))?,
            None => fut.await,
        }
    }
}

#[async_trait]
impl<S: QuestionStore> QuestionStore for WithDeadline<S> {
    async fn questions_by_language(&self, language: &str) -> Result<Vec<QuestionNode>> {
        self.guard("questions_by_language", self.inner.questions_by_language(language))
            .await
    }

    async fn children_of(&self, parent_id: NodeId) -> Result<Vec<QuestionNode>> {
        self.guard("children_of", self.inner.children_of(parent_id)).await
    }

    async fn node_by_id(&self, id: NodeId) -> Result<Option<QuestionNode>> {
        self.guard("node_by_id", self.inner.node_by_id(id)).await
    }

    async fn language_of(&self, user_id: UserId) -> Result<Option<String>> {
        self.guard("language_of", self.inner.language_of(user_id)).await
    }

    async fn set_language(&self, user_id: UserId, language: &str) -> Result<()> {
        self.guard("set_language", self.inner.set_language(user_id, language))
            .await
    }

    async fn create_node(
        &self,
        language: &str,
        text: &str,
        answer: &str,
        parent_id: NodeId,
    ) -> Result<NodeId> {
        self.guard(
            "create_node",
            self.inner.create_node(language, text, answer, parent_id),
        )
        .await
    }

    async fn update_node(&self, id: NodeId, text: &str, answer: &str) -> Result<()> {
        self.guard("update_node", self.inner.update_node(id, text, answer))
            .await
    }

    async fn update_media(&self, id: NodeId, media: &Media) -> Result<()> {
        self.guard("update_media", self.inner.update_media(id, media)).await
    }

    async fn delete_node(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.guard("delete_node", self.inner.delete_node(id)).await
    }
}
