//! Tree builder: materializes the nested forest from flat node records.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;
use tracing::{debug, instrument};

use crate::domain::entities::{Node, NodeId};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::forest::{Forest, TreeNode};

/// Constructs forests from flat node lists.
///
/// Siblings are ordered by ascending id, so repeated builds over the same
/// records produce identical forests.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeBuilder;

impl TreeBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the forest rooted at every node without a parent.
    ///
    /// Fails with `MalformedTree` when ids repeat or when a node cannot be
    /// reached from any root (dangling parent reference or a cycle). Nesting
    /// depth is bounded only by the input size.
    #[instrument(level = "debug", skip(self, nodes), fields(nodes = nodes.len()))]
    pub fn build(&self, nodes: &[Node]) -> DomainResult<Forest> {
        let mut seen = HashSet::with_capacity(nodes.len());
        if let Some(dup) = nodes.iter().find(|n| !seen.insert(n.id)) {
            return Err(DomainError::MalformedTree(format!(
                "duplicate node id {}",
                dup.id
            )));
        }

        let relationships: BTreeMap<Option<NodeId>, Vec<&Node>> = nodes
            .iter()
            .sorted_by_key(|n| n.id)
            .into_group_map_by(|n| n.parent_id)
            .into_iter()
            .collect();

        let mut placed = 0usize;
        let mut roots = Vec::new();
        for root in relationships.get(&None).into_iter().flatten() {
            roots.extend(assemble(root, &relationships, &mut placed));
        }

        if placed != nodes.len() {
            let parents: BTreeMap<NodeId, Option<NodeId>> =
                nodes.iter().map(|n| (n.id, n.parent_id)).collect();
            let orphan = nodes
                .iter()
                .find(|n| !is_reachable(n, &parents))
                .map(|n| n.id.to_string())
                .unwrap_or_else(|| "?".to_string());
            return Err(DomainError::MalformedTree(format!(
                "{} of {} nodes unreachable from any root (first: {})",
                nodes.len() - placed,
                nodes.len(),
                orphan
            )));
        }

        debug!("build: {} roots, {} nodes", roots.len(), placed);
        Ok(Forest::new(roots))
    }
}

/// A node whose children are still being assembled.
struct Pending<'a> {
    node: &'a Node,
    remaining: std::slice::Iter<'a, &'a Node>,
    built: Vec<TreeNode>,
}

impl<'a> Pending<'a> {
    fn new(node: &'a Node, relationships: &'a BTreeMap<Option<NodeId>, Vec<&'a Node>>) -> Self {
        let children = relationships
            .get(&Some(node.id))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        Self {
            node,
            remaining: children.iter(),
            built: Vec::with_capacity(children.len()),
        }
    }

    fn finish(self) -> TreeNode {
        TreeNode::with_children(self.node.clone(), self.built)
    }
}

/// Assemble the subtree under `root` post-order with an explicit stack.
fn assemble<'a>(
    root: &'a Node,
    relationships: &'a BTreeMap<Option<NodeId>, Vec<&'a Node>>,
    placed: &mut usize,
) -> Option<TreeNode> {
    *placed += 1;
    let mut stack = vec![Pending::new(root, relationships)];
    let mut finished = None;
    while let Some(top) = stack.last_mut() {
        if let Some(child) = top.remaining.next().copied() {
            *placed += 1;
            stack.push(Pending::new(child, relationships));
            continue;
        }
        if let Some(done) = stack.pop() {
            let tree_node = done.finish();
            match stack.last_mut() {
                Some(parent) => parent.built.push(tree_node),
                None => finished = Some(tree_node),
            }
        }
    }
    finished
}

/// Whether walking parent links from `node` ends at a root.
fn is_reachable(node: &Node, parents: &BTreeMap<NodeId, Option<NodeId>>) -> bool {
    let mut current = node.parent_id;
    for _ in 0..=parents.len() {
        match current {
            None => return true,
            Some(id) => match parents.get(&id) {
                Some(parent) => current = *parent,
                None => return false,
            },
        }
    }
    false
}

/// Build a forest with a default builder.
pub fn build_forest(nodes: &[Node]) -> DomainResult<Forest> {
    TreeBuilder::new().build(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    fn node(id: u64, name: &str, parent: Option<u64>) -> Node {
        Node::new(NodeId(id), name, parent.map(NodeId))
    }

    #[test]
    fn given_unsorted_records_when_building_then_siblings_ordered_by_id() {
        let nodes = vec![
            node(4, "Birds", Some(1)),
            node(1, "Animals", None),
            node(2, "Mammals", Some(1)),
        ];

        let forest = build_forest(&nodes).unwrap();

        assert_eq!(forest.roots().len(), 1);
        let children: Vec<u64> = forest.roots()[0]
            .children
            .iter()
            .map(|c| c.id().get())
            .collect();
        assert_eq!(children, vec![2, 4]);
    }

    #[test]
    fn given_cycle_when_building_then_malformed() {
        let nodes = vec![
            node(1, "Root", None),
            node(2, "A", Some(3)),
            node(3, "B", Some(2)),
        ];

        let err = build_forest(&nodes).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedTree);
        assert!(err.to_string().contains("unreachable"));
    }

    #[test]
    fn given_dangling_parent_when_building_then_malformed() {
        let nodes = vec![node(1, "Root", None), node(2, "Lost", Some(99))];

        let err = build_forest(&nodes).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedTree);
        assert!(err.to_string().contains("first: 2"));
    }

    #[test]
    fn given_duplicate_ids_when_building_then_malformed() {
        let nodes = vec![node(1, "Root", None), node(1, "Again", None)];

        let err = build_forest(&nodes).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedTree);
    }

    #[test]
    fn given_self_parent_when_building_then_malformed() {
        let nodes = vec![node(1, "Loop", Some(1))];

        assert_eq!(
            build_forest(&nodes).unwrap_err().kind(),
            ErrorKind::MalformedTree
        );
    }

    #[test]
    fn given_no_records_when_building_then_empty_forest() {
        let forest = build_forest(&[]).unwrap();
        assert!(forest.is_empty());
    }
}
