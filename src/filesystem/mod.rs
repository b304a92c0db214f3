//! Filesystem tree representation shared by every snapshot.
//!
//! Nodes are reference counted so successive snapshots share the subtrees a
//! change did not touch. Paths are resolved by name, segment by segment.

pub mod path;
mod snapshot;
mod tree;

pub use path::{InvalidPathError, PathSegments};
pub use snapshot::Snapshot;
pub use tree::{ChangeStatus, NodeKind, TreeNode, TreeNodeError};
