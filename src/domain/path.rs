//! Root-to-node ancestry over a built forest, for breadcrumbs.

use crate::domain::entities::{Node, NodeId};
use crate::domain::forest::{Forest, TreeNode};

/// Chain of nodes from a root down to `id`, or empty when `id` is absent.
///
/// Depth-first over the forest with an explicit stack; ids are unique so the
/// first match is the only one. Presentation helper only: structural checks use
/// `NodeIndex` on flat records.
pub fn resolve_path(forest: &Forest, id: NodeId) -> Vec<Node> {
    let mut stack: Vec<(&TreeNode, usize)> = forest.roots().iter().rev().map(|r| (r, 0)).collect();
    let mut path: Vec<&Node> = Vec::new();
    while let Some((tree_node, depth)) = stack.pop() {
        path.truncate(depth);
        path.push(&tree_node.node);
        if tree_node.id() == id {
            return path.into_iter().cloned().collect();
        }
        stack.extend(tree_node.children.iter().rev().map(|c| (c, depth + 1)));
    }
    Vec::new()
}
