use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(NodeId);
id_newtype!(ChatId);
id_newtype!(MessageId);

impl NodeId {
    /// Parent id carried by top-level nodes.
    pub const ROOT: NodeId = NodeId(0);

    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

pub const DEFAULT_LANGUAGE: &str = "en";

/// Languages offered by the language picker, as (code, button label).
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[("en", "English"), ("ru", "Русский")];

pub fn language_for_label(label: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(_, l)| *l == label)
        .map(|(code, _)| *code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Document,
    Photo,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Document => "doc",
            MediaKind::Photo => "photo",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "doc" => Some(MediaKind::Document),
            "photo" => Some(MediaKind::Photo),
            _ => None,
        }
    }
}

/// Opaque media reference; `handle` is the transport's content id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub kind: MediaKind,
    pub handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionNode {
    pub id: NodeId,
    pub language: String,
    pub text: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    pub parent_id: NodeId,
    /// Derived from the parent references of other nodes, ordered by id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
}

impl QuestionNode {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_root()
    }
}

/// Fills `children` on every node from the parent references in the same slice.
pub fn attach_children(nodes: &mut [QuestionNode]) {
    let mut links: Vec<(NodeId, NodeId)> = nodes
        .iter()
        .filter(|n| !n.parent_id.is_root())
        .map(|n| (n.parent_id, n.id))
        .collect();
    links.sort();
    for node in nodes.iter_mut() {
        node.children = links
            .iter()
            .filter(|(parent, _)| *parent == node.id)
            .map(|(_, child)| *child)
            .collect();
    }
}
