use derive_more::Display;
use serde::Deserialize;

use crate::filesystem::TreeNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    #[display("created")]
    Created,
    #[display("modified")]
    Modified,
    #[display("deleted")]
    Deleted,
}

/// A single change reported by the producer.
///
/// Only creations carry a node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Created { path: String, node: TreeNode },
    Modified { path: String },
    Deleted { path: String },
}

impl ChangeEvent {
    pub fn created(path: impl Into<String>, node: TreeNode) -> Self {
        ChangeEvent::Created {
            path: path.into(),
            node,
        }
    }

    pub fn modified(path: impl Into<String>) -> Self {
        ChangeEvent::Modified { path: path.into() }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        ChangeEvent::Deleted { path: path.into() }
    }

    pub fn action(&self) -> ChangeAction {
        match self {
            ChangeEvent::Created { .. } => ChangeAction::Created,
            ChangeEvent::Modified { .. } => ChangeAction::Modified,
            ChangeEvent::Deleted { .. } => ChangeAction::Deleted,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            ChangeEvent::Created { path, .. }
            | ChangeEvent::Modified { path }
            | ChangeEvent::Deleted { path } => path,
        }
    }

    pub fn node(&self) -> Option<&TreeNode> {
        match self {
            ChangeEvent::Created { node, .. } => Some(node),
            _ => None,
        }
    }
}
