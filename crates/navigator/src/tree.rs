use std::collections::{HashMap, HashSet};

use shared::domain::NodeId;

/// Ids to delete when removing `root`, deepest level first and `root` last.
///
/// `links` holds `(id, parent_id)` pairs. Traversal is iterative and keeps a
/// visited set, so a corrupted table with a parent cycle still terminates and
/// lists each id once.
pub fn cascade_order(links: &[(NodeId, NodeId)], root: NodeId) -> Vec<NodeId> {
    let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for (id, parent) in links {
        children.entry(*parent).or_default().push(*id);
    }
    for ids in children.values_mut() {
        ids.sort();
    }

    let mut visited = HashSet::from([root]);
    let mut levels = vec![vec![root]];
    loop {
        let mut next = Vec::new();
        for id in levels.last().into_iter().flatten() {
            for child in children.get(id).into_iter().flatten() {
                if visited.insert(*child) {
                    next.push(*child);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        levels.push(next);
    }

    levels.into_iter().rev().flatten().collect()
}
