use std::sync::Arc;

use tracing::{debug, trace};

use crate::filesystem::path::{self, PathSegments};
use crate::filesystem::{InvalidPathError, Snapshot, TreeNode};
use crate::sync::ChangeEvent;

/// Applies one change event to `snapshot` and returns the next snapshot.
///
/// Only the nodes along the event's path are cloned; every other subtree is
/// shared with `snapshot`, which is left untouched. Events addressing a path
/// the snapshot does not hold are no-ops and return a snapshot sharing the
/// input's roots. So is a creation whose node is not named after the path's
/// last segment.
pub fn apply(snapshot: &Snapshot, event: &ChangeEvent) -> Result<Snapshot, InvalidPathError> {
    let segments = path::resolve(event.path())?;

    let edited = match event {
        ChangeEvent::Deleted { .. } => edit_container(snapshot.roots(), segments.parents(), |level| {
            remove_child(level, segments.leaf())
        }),
        ChangeEvent::Modified { .. } => edit_container(snapshot.roots(), segments.parents(), |level| {
            touch_child(level, segments.leaf())
        }),
        ChangeEvent::Created { node, .. } => create(snapshot, &segments, node),
    };

    match edited {
        Some(roots) => {
            debug!("Applied {} event for '{}'", event.action(), event.path());
            Ok(Snapshot::from_shared(roots))
        }
        None => {
            debug!(
                "{} event for '{}' left the snapshot unchanged",
                event.action(),
                event.path()
            );
            Ok(snapshot.clone())
        }
    }
}

/// Top-level entries are watched roots and only arrive with a full snapshot,
/// so a creation needs a parent directory to land in.
fn create(
    snapshot: &Snapshot,
    segments: &PathSegments<'_>,
    node: &TreeNode,
) -> Option<Vec<Arc<TreeNode>>> {
    let Some(parent_path) = segments.parent_path() else {
        trace!("Creation of top-level '{}' ignored", segments.leaf());
        return None;
    };

    edit_container(snapshot.roots(), segments.parents(), |level| {
        insert_child(level, segments.leaf(), node, &parent_path)
    })
}

/// Descends `chain` by name and runs `edit` on the children of the last
/// directory, rebuilding only the directories on the way back up.
///
/// Returns `None` when a directory in the chain is missing, is a file, or
/// when `edit` itself reports nothing to change.
fn edit_container<F>(level: &[Arc<TreeNode>], chain: &[&str], edit: F) -> Option<Vec<Arc<TreeNode>>>
where
    F: FnOnce(&[Arc<TreeNode>]) -> Option<Vec<Arc<TreeNode>>>,
{
    let Some((head, rest)) = chain.split_first() else {
        return edit(level);
    };

    let index = level.iter().position(|node| node.name() == *head)?;
    let directory = &level[index];
    if !directory.is_directory() {
        trace!("'{}' is a file, cannot descend into it", directory.path());
        return None;
    }

    let children = edit_container(directory.children(), rest, edit)?;
    let mut next = level.to_vec();
    next[index] = Arc::new(directory.with_children(children));
    Some(next)
}

fn remove_child(level: &[Arc<TreeNode>], name: &str) -> Option<Vec<Arc<TreeNode>>> {
    let index = level.iter().position(|node| node.name() == name)?;
    let mut next = level.to_vec();
    next.remove(index);
    Some(next)
}

/// Content-only change: the node is cloned, its structure stays as it was.
fn touch_child(level: &[Arc<TreeNode>], name: &str) -> Option<Vec<Arc<TreeNode>>> {
    let index = level.iter().position(|node| node.name() == name)?;
    let mut next = level.to_vec();
    next[index] = Arc::new(level[index].as_ref().clone());
    Some(next)
}

fn insert_child(
    level: &[Arc<TreeNode>],
    name: &str,
    node: &TreeNode,
    parent_path: &str,
) -> Option<Vec<Arc<TreeNode>>> {
    if node.name() != name {
        trace!(
            "Node '{}' cannot be created as '{}' under '{}'",
            node.name(),
            name,
            parent_path
        );
        return None;
    }
    if level.iter().any(|existing| existing.name() == name) {
        trace!("'{}' already present under '{}'", name, parent_path);
        return None;
    }

    let mut next = level.to_vec();
    next.push(Arc::new(node.clone().rooted_at(Some(parent_path))));
    Some(next)
}
