use shared::{
    domain::{
        language_for_label, Media, NodeId, QuestionNode, UserId, DEFAULT_LANGUAGE,
        SUPPORTED_LANGUAGES,
    },
    error::{ErrorCode, FaqError},
    protocol::{
        CallbackToken, EventKind, InboundEvent, Keyboard, MenuView, Outgoing, Render, TextFormat,
    },
};
use tracing::{debug, info, warn};

use crate::{
    access::AccessPolicy,
    projector::render_page,
    sessions::{EditFailure, EditKind, EditOutcome, EditSessions},
    texts, QuestionStore,
};

#[derive(Debug, Clone)]
pub struct NavigatorSettings {
    pub page_size: usize,
    pub default_language: String,
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        Self {
            page_size: 5,
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// A rendered position in the tree: the node whose answer is shown (none at
/// the root) and one page of its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    pub node: Option<QuestionNode>,
    pub page: usize,
    pub menu: MenuView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Questions,
    Language,
}

/// Navigation controller and admin workflow over one [`QuestionStore`].
///
/// Built once at startup and shared by every event handler. Navigation keeps
/// no state between calls; the menu position travels in the callback tokens.
/// The only mutable state is the pending-edit map.
pub struct Navigator<S> {
    store: S,
    access: AccessPolicy,
    sessions: EditSessions,
    settings: NavigatorSettings,
}

impl<S: QuestionStore> Navigator<S> {
    pub fn new(store: S, access: AccessPolicy, settings: NavigatorSettings) -> Self {
        Self {
            store,
            access,
            sessions: EditSessions::new(),
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn access(&self) -> &AccessPolicy {
        &self.access
    }

    pub fn sessions(&self) -> &EditSessions {
        &self.sessions
    }

    pub fn settings(&self) -> &NavigatorSettings {
        &self.settings
    }

    /// The user's stored language, or the default when unset or unreadable.
    pub async fn resolve_language(&self, user_id: UserId) -> String {
        match self.store.language_of(user_id).await {
            Ok(Some(language)) if !language.is_empty() => language,
            Ok(_) => self.settings.default_language.clone(),
            Err(error) => {
                warn!(user_id = user_id.0, error = %format!("{error:#}"), "language lookup failed");
                self.settings.default_language.clone()
            }
        }
    }

    pub async fn root_view(&self, user_id: UserId) -> Result<NodeView, FaqError> {
        let language = self.resolve_language(user_id).await;
        let nodes = self
            .store
            .questions_by_language(&language)
            .await
            .map_err(FaqError::store_failure)?;
        Ok(NodeView {
            node: None,
            page: 0,
            menu: self.project(&nodes, NodeId::ROOT, 0, user_id),
        })
    }

    pub async fn select(&self, user_id: UserId, node_id: NodeId) -> Result<NodeView, FaqError> {
        let node = self.fetch(node_id).await?;
        self.node_view(user_id, node).await
    }

    /// One page of the children of `parent_id`; the displayed answer is unchanged.
    pub async fn page(
        &self,
        user_id: UserId,
        parent_id: NodeId,
        page: usize,
    ) -> Result<MenuView, FaqError> {
        let nodes = if parent_id.is_root() {
            let language = self.resolve_language(user_id).await;
            self.store
                .questions_by_language(&language)
                .await
                .map_err(FaqError::store_failure)?
        } else {
            let parent = self.fetch(parent_id).await?;
            self.children(parent.id).await?
        };
        Ok(self.project(&nodes, parent_id, page, user_id))
    }

    pub async fn back(&self, user_id: UserId, child_id: NodeId) -> Result<NodeView, FaqError> {
        let child = self.fetch(child_id).await?;
        if child.is_top_level() {
            return self.root_view(user_id).await;
        }
        let parent = self.fetch(child.parent_id).await?;
        self.node_view(user_id, parent).await
    }

    /// Starts a create session under `parent_id`; returns the prompt to show.
    pub async fn begin_add(&self, user_id: UserId, parent_id: NodeId) -> Result<String, FaqError> {
        self.ensure_privileged(user_id)?;
        let language = self.resolve_language(user_id).await;
        self.sessions
            .begin_add(user_id, parent_id, language.clone())
            .await;
        info!(user_id = user_id.0, parent_id = parent_id.0, %language, "add session started");
        Ok(texts::add_prompt(&language, parent_id))
    }

    /// Starts an update session for `node_id`; returns the prompt to show.
    pub async fn begin_edit(&self, user_id: UserId, node_id: NodeId) -> Result<String, FaqError> {
        self.ensure_privileged(user_id)?;
        self.sessions.begin_edit(user_id, node_id).await;
        info!(user_id = user_id.0, node_id = node_id.0, "edit session started");
        Ok(texts::edit_prompt(node_id))
    }

    /// Deletes `node_id` with its whole subtree.
    pub async fn delete(&self, user_id: UserId, node_id: NodeId) -> Result<Vec<NodeId>, FaqError> {
        self.ensure_privileged(user_id)?;
        let deleted = self
            .store
            .delete_node(node_id)
            .await
            .map_err(FaqError::store_failure)?;
        if deleted.is_empty() {
            return Err(FaqError::not_found(node_id));
        }
        info!(user_id = user_id.0, node_id = node_id.0, count = deleted.len(), "question deleted");
        Ok(deleted)
    }

    /// Handles one inbound event. Failures never escape: each maps to the
    /// reply (or silence) appropriate for its kind.
    pub async fn handle(&self, event: &InboundEvent) -> Render {
        match &event.kind {
            EventKind::Callback { data } => self.handle_callback(event.user_id, data).await,
            EventKind::Message { text, media } => {
                self.handle_message(event.user_id, text, media.as_ref()).await
            }
        }
    }

    async fn handle_callback(&self, user_id: UserId, data: &str) -> Render {
        let token: CallbackToken = match data.parse() {
            Ok(token) => token,
            Err(error) => {
                debug!(user_id = user_id.0, %error, "ignoring callback");
                return Render::Silent;
            }
        };
        debug!(user_id = user_id.0, %token, "callback received");

        if token.is_admin_action() && !self.access.is_privileged(user_id) {
            debug!(user_id = user_id.0, %token, "admin action refused");
            return Render::Silent;
        }

        match token {
            CallbackToken::Select { node_id } => match self.select(user_id, node_id).await {
                Ok(view) => Render::Replace(answer_message(view)),
                Err(error) => silent_on(error),
            },
            CallbackToken::Page { parent_id, page } => {
                match self.page(user_id, parent_id, page).await {
                    Ok(menu) => Render::EditMenu(menu),
                    Err(error) => silent_on(error),
                }
            }
            CallbackToken::Back { child_id } => match self.back(user_id, child_id).await {
                Ok(view) => Render::EditText {
                    text: texts::CHOOSE_QUESTION.to_string(),
                    menu: view.menu,
                },
                Err(error) => silent_on(error),
            },
            CallbackToken::AddQuestion { parent_id } => {
                match self.begin_add(user_id, parent_id).await {
                    Ok(prompt) => Render::Send(Outgoing::plain(prompt)),
                    Err(error) => silent_on(error),
                }
            }
            CallbackToken::Edit { node_id } => match self.begin_edit(user_id, node_id).await {
                Ok(prompt) => Render::Send(Outgoing::plain(prompt)),
                Err(error) => silent_on(error),
            },
            CallbackToken::Delete { node_id } => match self.delete(user_id, node_id).await {
                Ok(_) => Render::Send(Outgoing::plain(texts::deleted(node_id))),
                Err(error) if error.is(ErrorCode::StoreFailure) => {
                    warn!(user_id = user_id.0, node_id = node_id.0, %error, "delete failed");
                    Render::Send(Outgoing::plain(texts::DELETE_FAILED))
                }
                Err(error) => silent_on(error),
            },
        }
    }

    async fn handle_message(
        &self,
        user_id: UserId,
        text: &str,
        media: Option<&Media>,
    ) -> Render {
        let trimmed = text.trim();

        if let Some(command) = parse_command(trimmed) {
            debug!(user_id = user_id.0, ?command, "command received");
            return self.handle_command(user_id, command).await;
        }

        if let Some(language) = language_for_label(trimmed) {
            return match self.store.set_language(user_id, language).await {
                Ok(()) => {
                    info!(user_id = user_id.0, language, "language preference saved");
                    Render::Send(Outgoing::plain(texts::language_confirmation(language)))
                }
                Err(error) => {
                    warn!(user_id = user_id.0, error = %format!("{error:#}"), "saving language failed");
                    Render::Silent
                }
            };
        }

        if text.is_empty() {
            return Render::Silent;
        }

        match self.sessions.consume(&self.store, user_id, text, media).await {
            Ok(EditOutcome::NoSession) => Render::Silent,
            Ok(EditOutcome::Created(_)) => Render::Send(Outgoing::plain(texts::CREATED)),
            Ok(EditOutcome::Updated(_)) => Render::Send(Outgoing::plain(texts::UPDATED)),
            Err(failure) => edit_failure_reply(&failure),
        }
    }

    async fn handle_command(&self, user_id: UserId, command: Command) -> Render {
        match command {
            Command::Start => {
                let language = self.resolve_language(user_id).await;
                Render::Send(Outgoing::plain(texts::help(&language)))
            }
            Command::Questions => match self.root_view(user_id).await {
                Ok(view) => {
                    Render::Send(Outgoing::plain(texts::CHOOSE_QUESTION).with_menu(view.menu))
                }
                Err(error) => {
                    warn!(user_id = user_id.0, %error, "root menu unavailable");
                    Render::Send(Outgoing::plain(texts::NO_QUESTIONS))
                }
            },
            Command::Language => Render::Send(Outgoing {
                text: texts::LANGUAGE_PROMPT.to_string(),
                format: TextFormat::Plain,
                media: None,
                keyboard: Some(Keyboard::Choice(
                    SUPPORTED_LANGUAGES
                        .iter()
                        .map(|(_, label)| label.to_string())
                        .collect(),
                )),
            }),
        }
    }

    async fn node_view(&self, user_id: UserId, node: QuestionNode) -> Result<NodeView, FaqError> {
        let children = self.children(node.id).await?;
        let menu = self.project(&children, node.id, 0, user_id);
        Ok(NodeView {
            node: Some(node),
            page: 0,
            menu,
        })
    }

    async fn fetch(&self, id: NodeId) -> Result<QuestionNode, FaqError> {
        self.store
            .node_by_id(id)
            .await
            .map_err(FaqError::store_failure)?
            .ok_or_else(|| FaqError::not_found(id))
    }

    async fn children(&self, parent_id: NodeId) -> Result<Vec<QuestionNode>, FaqError> {
        self.store
            .children_of(parent_id)
            .await
            .map_err(FaqError::store_failure)
    }

    fn project(
        &self,
        nodes: &[QuestionNode],
        parent_id: NodeId,
        page: usize,
        user_id: UserId,
    ) -> MenuView {
        render_page(
            nodes,
            parent_id,
            page,
            self.settings.page_size,
            self.access.is_privileged(user_id),
        )
    }

    fn ensure_privileged(&self, user_id: UserId) -> Result<(), FaqError> {
        if self.access.is_privileged(user_id) {
            Ok(())
        } else {
            Err(FaqError::unauthorized())
        }
    }
}

fn answer_message(view: NodeView) -> Outgoing {
    let (text, media) = match view.node {
        Some(node) => (texts::answer(&node.text, &node.answer), node.media),
        None => (texts::CHOOSE_QUESTION.to_string(), None),
    };
    Outgoing {
        text,
        format: TextFormat::Markdown,
        media,
        keyboard: Some(Keyboard::Inline(view.menu)),
    }
}

/// Navigation and privileged-token failures end the interaction without a reply.
fn silent_on(error: FaqError) -> Render {
    match error.code {
        ErrorCode::StoreFailure => warn!(%error, "interaction aborted"),
        _ => debug!(%error, "interaction aborted"),
    }
    Render::Silent
}

fn edit_failure_reply(failure: &EditFailure) -> Render {
    let text = match (failure.code(), failure.kind) {
        (ErrorCode::InvalidFormat, _) => texts::INVALID_FORMAT,
        (_, EditKind::Create) => texts::CREATE_FAILED,
        (_, EditKind::Update) => texts::UPDATE_FAILED,
    };
    Render::Send(Outgoing::plain(text))
}

fn parse_command(text: &str) -> Option<Command> {
    let name = text.strip_prefix('/')?;
    let name = name.split_once('@').map_or(name, |(name, _bot)| name);
    match name {
        "start" => Some(Command::Start),
        "questions" => Some(Command::Questions),
        "language" => Some(Command::Language),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
