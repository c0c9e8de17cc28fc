//! Lookups over the flat parent-pointer relation.
//!
//! Structural checks (cycle prevention, cascading delete) run here rather than
//! on a built `Forest`: the flat form is cheaper and always reflects the snapshot
//! the engine validated against.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::domain::entities::{Node, NodeId};
use crate::domain::error::{DomainError, DomainResult};

/// Borrowed index over one snapshot of node records.
#[derive(Debug)]
pub struct NodeIndex<'a> {
    by_id: HashMap<NodeId, &'a Node>,
    children: BTreeMap<NodeId, Vec<NodeId>>,
}

impl<'a> NodeIndex<'a> {
    pub fn new(nodes: &'a [Node]) -> Self {
        let mut by_id = HashMap::with_capacity(nodes.len());
        let mut children: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for node in nodes {
            by_id.insert(node.id, node);
            if let Some(parent) = node.parent_id {
                children.entry(parent).or_default().push(node.id);
            }
        }
        for ids in children.values_mut() {
            ids.sort();
        }
        Self { by_id, children }
    }

    pub fn get(&self, id: NodeId) -> Option<&'a Node> {
        self.by_id.get(&id).copied()
    }

    /// Fetch a node or fail with `NodeNotFound`.
    pub fn require(&self, id: NodeId) -> DomainResult<&'a Node> {
        self.get(id).ok_or(DomainError::NodeNotFound(id))
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ancestor chain of `id`, nearest parent first, ending at a root.
    ///
    /// The walk is bounded by the snapshot size; running past it or hitting a
    /// missing parent means the stored data is corrupt.
    pub fn ancestors(&self, id: NodeId) -> DomainResult<Vec<NodeId>> {
        let mut chain = Vec::new();
        let mut current = self.require(id)?.parent_id;
        while let Some(parent) = current {
            if chain.len() >= self.by_id.len() {
                return Err(DomainError::MalformedTree(format!(
                    "ancestor chain of node {id} does not terminate"
                )));
            }
            let parent_node = self.get(parent).ok_or_else(|| {
                DomainError::MalformedTree(format!(
                    "node {} references missing parent {parent}",
                    chain.last().copied().unwrap_or(id)
                ))
            })?;
            chain.push(parent);
            current = parent_node.parent_id;
        }
        Ok(chain)
    }

    /// Whether `ancestor` lies on the parent chain of `id`.
    pub fn is_ancestor_of(&self, ancestor: NodeId, id: NodeId) -> DomainResult<bool> {
        Ok(self.ancestors(id)?.contains(&ancestor))
    }

    /// `id` followed by all of its descendants in breadth-first order.
    pub fn subtree(&self, id: NodeId) -> DomainResult<Vec<NodeId>> {
        self.require(id)?;
        let mut closure = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if closure.len() >= self.by_id.len() {
                return Err(DomainError::MalformedTree(format!(
                    "subtree of node {id} does not terminate"
                )));
            }
            closure.push(current);
            queue.extend(self.children_of(current).iter().copied());
        }
        Ok(closure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    fn chain() -> Vec<Node> {
        vec![
            Node::new(NodeId(1), "Animals", None),
            Node::new(NodeId(2), "Mammals", Some(NodeId(1))),
            Node::new(NodeId(3), "Dogs", Some(NodeId(2))),
            Node::new(NodeId(4), "Cats", Some(NodeId(2))),
            Node::new(NodeId(5), "Plants", None),
        ]
    }

    #[test]
    fn given_leaf_when_walking_ancestors_then_nearest_first() {
        let nodes = chain();
        let index = NodeIndex::new(&nodes);

        assert_eq!(index.ancestors(NodeId(3)).unwrap(), vec![NodeId(2), NodeId(1)]);
        assert!(index.ancestors(NodeId(5)).unwrap().is_empty());
        assert!(index.is_ancestor_of(NodeId(1), NodeId(4)).unwrap());
        assert!(!index.is_ancestor_of(NodeId(5), NodeId(4)).unwrap());
    }

    #[test]
    fn given_node_when_collecting_subtree_then_breadth_first() {
        let nodes = chain();
        let index = NodeIndex::new(&nodes);

        assert_eq!(
            index.subtree(NodeId(1)).unwrap(),
            vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]
        );
        assert_eq!(index.subtree(NodeId(5)).unwrap(), vec![NodeId(5)]);
    }

    #[test]
    fn given_unknown_id_then_not_found() {
        let nodes = chain();
        let index = NodeIndex::new(&nodes);

        assert_eq!(
            index.ancestors(NodeId(42)).unwrap_err(),
            DomainError::NodeNotFound(NodeId(42))
        );
        assert_eq!(index.subtree(NodeId(42)).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn given_corrupt_cycle_when_walking_then_malformed() {
        let nodes = vec![
            Node::new(NodeId(1), "A", Some(NodeId(2))),
            Node::new(NodeId(2), "B", Some(NodeId(1))),
        ];
        let index = NodeIndex::new(&nodes);

        assert_eq!(
            index.ancestors(NodeId(1)).unwrap_err().kind(),
            ErrorKind::MalformedTree
        );
        assert_eq!(
            index.subtree(NodeId(1)).unwrap_err().kind(),
            ErrorKind::MalformedTree
        );
    }
}
