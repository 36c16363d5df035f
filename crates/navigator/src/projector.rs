use shared::{
    domain::{NodeId, QuestionNode},
    protocol::{CallbackToken, MenuButton, MenuView},
};

use crate::texts;

/// Renders one page of the menu for the children of `parent_id`.
///
/// `nodes` may hold any mix of nodes; only those whose parent is `parent_id`
/// are shown, in the order given. A page past the end yields a menu with no
/// item rows. The result depends only on the arguments.
pub fn render_page(
    nodes: &[QuestionNode],
    parent_id: NodeId,
    page: usize,
    page_size: usize,
    is_admin: bool,
) -> MenuView {
    let page_size = page_size.max(1);
    let filtered: Vec<&QuestionNode> = nodes.iter().filter(|n| n.parent_id == parent_id).collect();

    let total = filtered.len();
    let start = page.saturating_mul(page_size).min(total);
    let end = start.saturating_add(page_size).min(total);

    let mut rows = Vec::new();
    for node in &filtered[start..end] {
        rows.push(vec![MenuButton::new(
            node.text.clone(),
            CallbackToken::Select { node_id: node.id },
        )]);
        if is_admin {
            rows.push(vec![
                MenuButton::new(texts::EDIT_LABEL, CallbackToken::Edit { node_id: node.id }),
                MenuButton::new(texts::DELETE_LABEL, CallbackToken::Delete { node_id: node.id }),
            ]);
        }
    }

    let mut nav_row = Vec::new();
    if page > 0 {
        nav_row.push(MenuButton::new(
            texts::PREV_LABEL,
            CallbackToken::Page {
                parent_id,
                page: page - 1,
            },
        ));
    }
    if end < total {
        nav_row.push(MenuButton::new(
            texts::NEXT_LABEL,
            CallbackToken::Page {
                parent_id,
                page: page + 1,
            },
        ));
    }
    if !nav_row.is_empty() {
        rows.push(nav_row);
    }

    if !parent_id.is_root() {
        rows.push(vec![MenuButton::new(
            texts::BACK_LABEL,
            CallbackToken::Back {
                child_id: parent_id,
            },
        )]);
    }

    if is_admin {
        rows.push(vec![MenuButton::new(
            texts::ADD_LABEL,
            CallbackToken::AddQuestion { parent_id },
        )]);
    }

    MenuView { rows }
}

#[cfg(test)]
#[path = "tests/projector_tests.rs"]
mod tests;
