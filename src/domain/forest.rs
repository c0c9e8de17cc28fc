//! Nested tree view over the flat node relation.
//!
//! A `Forest` is derived data: it is rebuilt from the store on every read and
//! never written back.

use std::fmt;

use serde::Serialize;
use termtree::Tree;
use tracing::instrument;

use crate::domain::entities::{Node, NodeId};

/// One node of the nested view with its ordered child subtrees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub node: Node,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(node: Node) -> Self {
        Self::with_children(node, Vec::new())
    }

    pub fn with_children(node: Node, children: Vec<TreeNode>) -> Self {
        Self { node, children }
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Pre-order traversal of this subtree, self first.
    pub fn iter(&self) -> ForestIterator<'_> {
        ForestIterator { stack: vec![self] }
    }

    /// Number of nodes in this subtree, including self.
    pub fn size(&self) -> usize {
        self.iter().count()
    }

    /// Longest downward chain from this node, counted in nodes.
    fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((tree_node, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(tree_node.children.iter().map(|c| (c, level + 1)));
        }
        deepest
    }

    /// Build the termtree rendering post-order, without recursion.
    fn to_tree_string(&self) -> Tree<String> {
        let mut stack: Vec<(&TreeNode, Vec<Tree<String>>)> = vec![(self, Vec::new())];
        let mut rendered = Tree::new(String::new());
        while let Some((tree_node, leaves)) = stack.last_mut() {
            let current: &TreeNode = *tree_node;
            let done = leaves.len();
            if done < current.children.len() {
                let child = &current.children[done];
                stack.push((child, Vec::with_capacity(child.children.len())));
                continue;
            }
            if let Some((done, leaves)) = stack.pop() {
                let tree = Tree::new(done.node.to_string()).with_leaves(leaves);
                match stack.last_mut() {
                    Some((_, parent_leaves)) => parent_leaves.push(tree),
                    None => rendered = tree,
                }
            }
        }
        rendered
    }
}

impl Drop for TreeNode {
    // Unlink descendants onto a heap stack so dropping a deep chain does not
    // recurse once per level.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut tree_node) = pending.pop() {
            pending.append(&mut tree_node.children);
        }
    }
}

/// Ordered roots of the taxonomy, each carrying its subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Forest {
    roots: Vec<TreeNode>,
}

impl Forest {
    pub fn new(roots: Vec<TreeNode>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[TreeNode] {
        &self.roots
    }

    /// Total number of nodes across all trees.
    pub fn len(&self) -> usize {
        self.roots.iter().map(TreeNode::size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Pre-order traversal, roots left to right.
    pub fn iter(&self) -> ForestIterator<'_> {
        ForestIterator::new(self)
    }

    pub fn find(&self, id: NodeId) -> Option<&TreeNode> {
        self.iter().find(|tree_node| tree_node.id() == id)
    }

    /// Longest root-to-leaf chain, counted in nodes.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.roots.iter().map(TreeNode::depth).max().unwrap_or(0)
    }

    /// Flatten back into store records, in pre-order.
    pub fn flatten(&self) -> Vec<Node> {
        self.iter().map(|tree_node| tree_node.node.clone()).collect()
    }

    /// Render every tree for terminal display, one string per root.
    pub fn render(&self) -> Vec<String> {
        self.roots
            .iter()
            .map(|root| {
                let tree = root.to_tree_string();
                let rendered = tree.to_string();
                dismantle(tree);
                rendered
            })
            .collect()
    }
}

/// Drop a termtree level by level; its own drop recurses once per level.
fn dismantle(tree: Tree<String>) {
    let mut pending = vec![tree];
    while let Some(mut tree) = pending.pop() {
        pending.append(&mut tree.leaves);
    }
}

impl fmt::Display for Forest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tree in self.render() {
            f.write_str(&tree)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Forest {
    type Item = &'a TreeNode;
    type IntoIter = ForestIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ForestIterator<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> ForestIterator<'a> {
    fn new(forest: &'a Forest) -> Self {
        // Reverse so the first root is popped first
        let stack = forest.roots.iter().rev().collect();
        Self { stack }
    }
}

impl<'a> Iterator for ForestIterator<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        for child in current.children.iter().rev() {
            self.stack.push(child);
        }
        Some(current)
    }
}
