use std::collections::HashSet;
use std::sync::Arc;

use derive_more::Display;
use serde::Deserialize;
use snafu::{Snafu, ensure};

use crate::filesystem::path::{self, SEPARATOR};

/// Represents the type of a filesystem node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[display("file")]
    File,
    #[display("directory")]
    Directory,
}

/// Change classification relative to the producer's baseline. Display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ChangeStatus {
    #[display("added")]
    Added,
    #[display("modified")]
    Modified,
    #[display("deleted")]
    Deleted,
}

impl ChangeStatus {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "added" | "created" | "new" => Some(ChangeStatus::Added),
            "modified" | "changed" => Some(ChangeStatus::Modified),
            "deleted" | "removed" => Some(ChangeStatus::Deleted),
            _ => None,
        }
    }
}

/// One file or directory of a snapshot.
///
/// Children are shared through `Arc`, so `clone()` is the shallow,
/// copy-on-write clone: the node and its immediate `children` vector are
/// copied while every grandchild stays shared with the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    name: String,
    path: String,
    kind: NodeKind,
    status: Option<ChangeStatus>,
    children: Vec<Arc<TreeNode>>,
}

impl TreeNode {
    pub fn new(
        name: impl Into<String>,
        kind: NodeKind,
        children: Vec<TreeNode>,
    ) -> Result<Self, TreeNodeError> {
        let name = name.into();
        ensure!(!name.is_empty(), EmptyNameSnafu);
        ensure!(
            !name.contains(SEPARATOR),
            NameContainsSeparatorSnafu { name: name.clone() }
        );
        ensure!(
            kind == NodeKind::Directory || children.is_empty(),
            FileWithChildrenSnafu { name: name.clone() }
        );
        ensure_unique_names(&name, &children)?;

        let children = children
            .into_iter()
            .map(|child| Arc::new(child.rooted_at(Some(&name))))
            .collect();

        Ok(TreeNode {
            path: name.clone(),
            name,
            kind,
            status: None,
            children,
        })
    }

    pub fn file(name: impl Into<String>) -> Result<Self, TreeNodeError> {
        Self::new(name, NodeKind::File, Vec::new())
    }

    pub fn directory(
        name: impl Into<String>,
        children: impl IntoIterator<Item = TreeNode>,
    ) -> Result<Self, TreeNodeError> {
        Self::new(name, NodeKind::Directory, children.into_iter().collect())
    }

    pub fn with_status(mut self, status: Option<ChangeStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn status(&self) -> Option<ChangeStatus> {
        self.status
    }

    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Immediate children in producer order. Always empty for files.
    pub fn children(&self) -> &[Arc<TreeNode>] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Arc<TreeNode>> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Visits this node and every descendant depth-first, pre-order.
    pub fn visit<'a>(&'a self, visitor: &mut impl FnMut(&'a TreeNode, usize)) {
        self.visit_at(0, visitor);
    }

    fn visit_at<'a>(&'a self, depth: usize, visitor: &mut impl FnMut(&'a TreeNode, usize)) {
        visitor(self, depth);
        for child in &self.children {
            child.visit_at(depth + 1, visitor);
        }
    }

    /// Number of nodes in this subtree, the node itself included.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| child.subtree_len())
            .sum::<usize>()
    }

    /// Same node with its children swapped for `children`.
    ///
    /// Callers hand in children already rooted under this node.
    pub(crate) fn with_children(&self, children: Vec<Arc<TreeNode>>) -> Self {
        TreeNode {
            name: self.name.clone(),
            path: self.path.clone(),
            kind: self.kind,
            status: self.status,
            children,
        }
    }

    /// Re-derives `path` for this subtree as if it lived under `parent`.
    ///
    /// Subtrees whose path already matches are returned untouched; their
    /// descendants are consistent by construction.
    pub(crate) fn rooted_at(mut self, parent: Option<&str>) -> Self {
        let expected = path::join(parent, &self.name);
        if self.path == expected {
            return self;
        }

        self.children = self
            .children
            .into_iter()
            .map(|child| {
                let child = Arc::unwrap_or_clone(child);
                Arc::new(child.rooted_at(Some(&expected)))
            })
            .collect();
        self.path = expected;
        self
    }
}

pub(crate) fn ensure_unique_names(parent: &str, nodes: &[TreeNode]) -> Result<(), TreeNodeError> {
    let mut seen = HashSet::with_capacity(nodes.len());
    for node in nodes {
        ensure!(
            seen.insert(node.name.as_str()),
            DuplicateChildSnafu {
                parent,
                name: node.name.clone(),
            }
        );
    }
    Ok(())
}

#[derive(Debug, Snafu)]
pub enum TreeNodeError {
    #[snafu(display("Node name must not be empty"))]
    EmptyName,
    #[snafu(display("Node name '{}' contains a path separator", name))]
    NameContainsSeparator { name: String },
    #[snafu(display("File '{}' cannot have children", name))]
    FileWithChildren { name: String },
    #[snafu(display("'{}' contains more than one child named '{}'", parent, name))]
    DuplicateChild { parent: String, name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeNode {
        TreeNode::directory(
            "src",
            [
                TreeNode::file("main.rs").unwrap(),
                TreeNode::directory("sync", [TreeNode::file("session.rs").unwrap()]).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn derives_paths_from_ancestors() {
        let root = sample();
        let mut paths = Vec::new();
        root.visit(&mut |node, _| paths.push(node.path().to_string()));

        assert_eq!(
            paths,
            vec!["src", "src/main.rs", "src/sync", "src/sync/session.rs"]
        );
    }

    #[test]
    fn rejects_empty_names() {
        assert!(matches!(TreeNode::file(""), Err(TreeNodeError::EmptyName)));
    }

    #[test]
    fn rejects_names_with_separators() {
        assert!(matches!(
            TreeNode::file("a/b"),
            Err(TreeNodeError::NameContainsSeparator { .. })
        ));
    }

    #[test]
    fn rejects_files_with_children() {
        let result = TreeNode::new(
            "notes.txt",
            NodeKind::File,
            vec![TreeNode::file("inner").unwrap()],
        );
        assert!(matches!(result, Err(TreeNodeError::FileWithChildren { .. })));
    }

    #[test]
    fn rejects_duplicate_child_names() {
        let result = TreeNode::directory(
            "a",
            [TreeNode::file("x").unwrap(), TreeNode::file("x").unwrap()],
        );
        match result {
            Err(TreeNodeError::DuplicateChild { parent, name }) => {
                assert_eq!(parent, "a");
                assert_eq!(name, "x");
            }
            other => panic!("Expected DuplicateChild, got {other:?}"),
        }
    }

    #[test]
    fn empty_directory_has_defined_children() {
        let dir = TreeNode::directory("empty", []).unwrap();
        assert!(dir.is_directory());
        assert!(dir.children().is_empty());
    }

    #[test]
    fn clone_shares_grandchildren() {
        let root = sample();
        let copy = root.clone();

        assert_eq!(root, copy);
        for (original, cloned) in root.children().iter().zip(copy.children()) {
            assert!(Arc::ptr_eq(original, cloned));
        }
    }

    #[test]
    fn rooting_rewrites_nested_paths() {
        let moved = sample().rooted_at(Some("workspace"));
        assert_eq!(moved.path(), "workspace/src");
        let session = moved.child("sync").unwrap().child("session.rs").unwrap();
        assert_eq!(session.path(), "workspace/src/sync/session.rs");
    }

    #[test]
    fn subtree_len_counts_every_node() {
        assert_eq!(sample().subtree_len(), 4);
    }

    #[test]
    fn status_labels_are_lenient() {
        assert_eq!(ChangeStatus::from_label("Modified"), Some(ChangeStatus::Modified));
        assert_eq!(ChangeStatus::from_label("created"), Some(ChangeStatus::Added));
        assert_eq!(ChangeStatus::from_label("unknown"), None);
    }
}
