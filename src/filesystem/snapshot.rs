use std::hash::{Hash, Hasher};
use std::sync::Arc;

use metrohash::MetroHash64;

use crate::filesystem::path::{self, InvalidPathError};
use crate::filesystem::tree::{self, TreeNode, TreeNodeError};

/// One immutable point-in-time view of the watched trees.
///
/// Cloning is cheap and never copies nodes. A new snapshot shares every
/// subtree the transition that produced it did not touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    roots: Arc<Vec<Arc<TreeNode>>>,
}

impl Snapshot {
    pub fn new(roots: impl IntoIterator<Item = TreeNode>) -> Result<Self, TreeNodeError> {
        let roots = roots.into_iter().collect::<Vec<_>>();
        tree::ensure_unique_names("<root>", &roots)?;

        Ok(Self::from_shared(
            roots
                .into_iter()
                .map(|root| Arc::new(root.rooted_at(None)))
                .collect(),
        ))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_shared(roots: Vec<Arc<TreeNode>>) -> Self {
        Snapshot {
            roots: Arc::new(roots),
        }
    }

    /// Top-level nodes in producer order.
    pub fn roots(&self) -> &[Arc<TreeNode>] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of nodes across all roots.
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(|root| root.subtree_len()).sum()
    }

    /// Looks up the node addressed by `path`, e.g. a selection made in a view.
    pub fn find(&self, path: &str) -> Result<Option<&TreeNode>, InvalidPathError> {
        let segments = path::resolve(path)?;
        let mut level = self.roots();
        let mut found = None;

        for name in segments.to_vec() {
            match level.iter().find(|node| node.name() == name) {
                Some(node) => {
                    found = Some(node.as_ref());
                    level = node.children();
                }
                None => return Ok(None),
            }
        }

        Ok(found)
    }

    /// True when both snapshots hold the very same top-level sequence.
    pub fn shares_roots_with(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.roots, &other.roots)
    }

    /// Structural digest over names, kinds and nesting.
    ///
    /// Equal trees give equal fingerprints regardless of how much structure
    /// they share. Statuses are left out; they carry no structure.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = MetroHash64::default();
        self.roots.len().hash(&mut hasher);
        for root in self.roots.iter() {
            feed(root, &mut hasher);
        }
        hasher.finish()
    }
}

fn feed(node: &TreeNode, hasher: &mut impl Hasher) {
    node.name().hash(hasher);
    node.kind().hash(hasher);
    node.children().len().hash(hasher);
    for child in node.children() {
        feed(child, hasher);
    }
}
