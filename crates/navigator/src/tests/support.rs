use std::{collections::HashMap, sync::Mutex, time::Duration};

use anyhow::{bail, Result};
use async_trait::async_trait;
use shared::domain::{attach_children, Media, NodeId, QuestionNode, UserId};

use crate::{tree::cascade_order, QuestionStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    QuestionsByLanguage(String),
    ChildrenOf(NodeId),
    NodeById(NodeId),
    LanguageOf(UserId),
    SetLanguage(UserId, String),
    CreateNode {
        language: String,
        text: String,
        answer: String,
        parent_id: NodeId,
    },
    UpdateNode(NodeId, String, String),
    UpdateMedia(NodeId, Media),
    Delete(NodeId),
}

impl Call {
    fn is_write(&self) -> bool {
        matches!(
            self,
            Call::SetLanguage(..)
                | Call::CreateNode { .. }
                | Call::UpdateNode(..)
                | Call::UpdateMedia(..)
                | Call::Delete(_)
        )
    }
}

#[derive(Default)]
struct State {
    nodes: Vec<QuestionNode>,
    languages: HashMap<UserId, String>,
    calls: Vec<Call>,
    fail_writes: bool,
    delay: Option<Duration>,
}

/// In-memory store that records every call it receives.
#[derive(Default)]
pub(crate) struct RecordingStore {
    state: Mutex<State>,
}

pub(crate) fn node(id: i64, parent: i64, language: &str) -> QuestionNode {
    QuestionNode {
        id: NodeId(id),
        language: language.to_string(),
        text: format!("q{id}"),
        answer: format!("a{id}"),
        media: None,
        parent_id: NodeId(parent),
        children: Vec::new(),
    }
}

impl RecordingStore {
    /// English nodes from `(id, parent)` pairs.
    pub(crate) fn with_nodes(pairs: &[(i64, i64)]) -> Self {
        let store = Self::default();
        for (id, parent) in pairs {
            store.insert(node(*id, *parent, "en"));
        }
        store
    }

    pub(crate) fn insert(&self, node: QuestionNode) {
        let mut state = self.state.lock().expect("state");
        state.nodes.push(node);
        state.nodes.sort_by_key(|n| n.id);
    }

    pub(crate) fn set_user_language(&self, user_id: UserId, language: &str) {
        self.state
            .lock()
            .expect("state")
            .languages
            .insert(user_id, language.to_string());
    }

    pub(crate) fn fail_writes(&self) {
        self.state.lock().expect("state").fail_writes = true;
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        self.state.lock().expect("state").delay = Some(delay);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().expect("state").calls.clone()
    }

    pub(crate) fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub(crate) fn get(&self, id: i64) -> Option<QuestionNode> {
        self.state
            .lock()
            .expect("state")
            .nodes
            .iter()
            .find(|n| n.id == NodeId(id))
            .cloned()
    }

    async fn record(&self, call: Call) -> Result<()> {
        let (delay, fail) = {
            let mut state = self.state.lock().expect("state");
            let fail = state.fail_writes && call.is_write();
            state.calls.push(call);
            (state.delay, fail)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            bail!("injected write failure");
        }
        Ok(())
    }

    fn snapshot(&self, filter: impl Fn(&QuestionNode) -> bool) -> Vec<QuestionNode> {
        let mut nodes = self.state.lock().expect("state").nodes.clone();
        attach_children(&mut nodes);
        nodes.into_iter().filter(|n| filter(n)).collect()
    }
}

#[async_trait]
impl QuestionStore for RecordingStore {
    async fn questions_by_language(&self, language: &str) -> Result<Vec<QuestionNode>> {
        self.record(Call::QuestionsByLanguage(language.to_string()))
            .await?;
        Ok(self.snapshot(|n| n.language == language))
    }

    async fn children_of(&self, parent_id: NodeId) -> Result<Vec<QuestionNode>> {
        self.record(Call::ChildrenOf(parent_id)).await?;
        Ok(self.snapshot(|n| n.parent_id == parent_id))
    }

    async fn node_by_id(&self, id: NodeId) -> Result<Option<QuestionNode>> {
        self.record(Call::NodeById(id)).await?;
        Ok(self.snapshot(|n| n.id == id).into_iter().next())
    }

    async fn language_of(&self, user_id: UserId) -> Result<Option<String>> {
        self.record(Call::LanguageOf(user_id)).await?;
        Ok(self
            .state
            .lock()
            .expect("state")
            .languages
            .get(&user_id)
            .cloned())
    }

    async fn set_language(&self, user_id: UserId, language: &str) -> Result<()> {
        self.record(Call::SetLanguage(user_id, language.to_string()))
            .await?;
        self.set_user_language(user_id, language);
        Ok(())
    }

    async fn create_node(
        &self,
        language: &str,
        text: &str,
        answer: &str,
        parent_id: NodeId,
    ) -> Result<NodeId> {
        self.record(Call::CreateNode {
            language: language.to_string(),
            text: text.to_string(),
            answer: answer.to_string(),
            parent_id,
        })
        .await?;
        let mut state = self.state.lock().expect("state");
        let id = NodeId(state.nodes.iter().map(|n| n.id.0).max().unwrap_or(0) + 1);
        state.nodes.push(QuestionNode {
            id,
            language: language.to_string(),
            text: text.to_string(),
            answer: answer.to_string(),
            media: None,
            parent_id,
            children: Vec::new(),
        });
        Ok(id)
    }

    async fn update_node(&self, id: NodeId, text: &str, answer: &str) -> Result<()> {
        self.record(Call::UpdateNode(id, text.to_string(), answer.to_string()))
            .await?;
        let mut state = self.state.lock().expect("state");
        if let Some(node) = state.nodes.iter_mut().find(|n| n.id == id) {
            node.text = text.to_string();
            node.answer = answer.to_string();
        }
        Ok(())
    }

    async fn update_media(&self, id: NodeId, media: &Media) -> Result<()> {
        self.record(Call::UpdateMedia(id, media.clone())).await?;
        let mut state = self.state.lock().expect("state");
        if let Some(node) = state.nodes.iter_mut().find(|n| n.id == id) {
            node.media = Some(media.clone());
        }
        Ok(())
    }

    async fn delete_node(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let links: Vec<(NodeId, NodeId)> = {
            let state = self.state.lock().expect("state");
            if !state.nodes.iter().any(|n| n.id == id) {
                return Ok(Vec::new());
            }
            state.nodes.iter().map(|n| (n.id, n.parent_id)).collect()
        };
        let order = cascade_order(&links, id);
        for doomed in &order {
            self.record(Call::Delete(*doomed)).await?;
        }
        self.state
            .lock()
            .expect("state")
            .nodes
            .retain(|n| !order.contains(&n.id));
        Ok(order)
    }
}
