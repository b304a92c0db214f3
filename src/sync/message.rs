use serde::Deserialize;
use snafu::prelude::*;
use tracing::debug;

use crate::filesystem::path::{self, InvalidPathError};
use crate::filesystem::{ChangeStatus, NodeKind, Snapshot, TreeNode, TreeNodeError};
use crate::sync::{ChangeAction, ChangeEvent};

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Authoritative replacement of the whole tree.
    Snapshot(Snapshot),
    Change(ChangeEvent),
    Heartbeat,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum WireMessage {
    #[serde(rename = "snapshot", alias = "tree")]
    Snapshot { tree: WireTree },
    #[serde(rename = "change", alias = "file-changed")]
    Change {
        action: ChangeAction,
        path: String,
        #[serde(default)]
        node: Option<WireNode>,
    },
    #[serde(rename = "ping")]
    Ping,
}

/// Producers send either the top-level list or a root object wrapping it.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireTree {
    Forest(Vec<WireNode>),
    Root { children: Vec<WireNode> },
}

#[derive(Deserialize)]
struct WireNode {
    name: String,
    #[serde(rename = "type")]
    kind: NodeKind,
    #[serde(default)]
    children: Option<Vec<WireNode>>,
    #[serde(default)]
    status: Option<String>,
}

impl TryFrom<WireNode> for TreeNode {
    type Error = TreeNodeError;

    fn try_from(wire: WireNode) -> Result<Self, Self::Error> {
        let children = wire
            .children
            .unwrap_or_default()
            .into_iter()
            .map(TreeNode::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let status = wire.status.as_deref().and_then(|label| {
            let status = ChangeStatus::from_label(label);
            if status.is_none() {
                debug!("Ignoring unknown status '{}' on '{}'", label, wire.name);
            }
            status
        });

        Ok(TreeNode::new(wire.name, wire.kind, children)?.with_status(status))
    }
}

impl TryFrom<&str> for Message {
    type Error = MalformedMessageError;

    fn try_from(frame: &str) -> Result<Self, Self::Error> {
        let wire: WireMessage = serde_json::from_str(frame).context(DecodeSnafu)?;

        match wire {
            WireMessage::Ping => Ok(Message::Heartbeat),
            WireMessage::Snapshot { tree } => {
                let roots = match tree {
                    WireTree::Forest(nodes) | WireTree::Root { children: nodes } => nodes,
                };
                let roots = roots
                    .into_iter()
                    .map(TreeNode::try_from)
                    .collect::<Result<Vec<_>, _>>()
                    .context(InvalidTreeSnafu)?;
                let snapshot = Snapshot::new(roots).context(InvalidTreeSnafu)?;
                Ok(Message::Snapshot(snapshot))
            }
            WireMessage::Change { action, path, node } => {
                Self::change_from_wire(action, path, node).map(Message::Change)
            }
        }
    }
}

/// Raw frames are decoded as UTF-8 first, so a garbled line is just another
/// malformed message.
impl TryFrom<&[u8]> for Message {
    type Error = MalformedMessageError;

    fn try_from(frame: &[u8]) -> Result<Self, Self::Error> {
        std::str::from_utf8(frame).context(EncodingSnafu)?.try_into()
    }
}

impl Message {
    fn change_from_wire(
        action: ChangeAction,
        path: String,
        node: Option<WireNode>,
    ) -> Result<ChangeEvent, MalformedMessageError> {
        let leaf = path::resolve(&path)
            .context(ChangePathSnafu)?
            .leaf()
            .to_string();

        match action {
            ChangeAction::Created => {
                let wire = node.context(MissingNodeSnafu { path: &path })?;
                let node = TreeNode::try_from(wire).context(InvalidTreeSnafu)?;
                ensure!(
                    node.name() == leaf,
                    NodeNameMismatchSnafu {
                        path: &path,
                        name: node.name(),
                    }
                );
                Ok(ChangeEvent::created(path, node))
            }
            ChangeAction::Modified | ChangeAction::Deleted => {
                ensure!(node.is_none(), UnexpectedNodeSnafu { action, path: &path });
                Ok(match action {
                    ChangeAction::Modified => ChangeEvent::modified(path),
                    _ => ChangeEvent::deleted(path),
                })
            }
        }
    }
}

#[derive(Debug, Snafu)]
pub enum MalformedMessageError {
    #[snafu(display("Frame is not valid UTF-8"))]
    EncodingError { source: std::str::Utf8Error },
    #[snafu(display("Frame is not a recognised message"))]
    DecodeError { source: serde_json::Error },
    #[snafu(display("Message carries an invalid tree"))]
    InvalidTreeError { source: TreeNodeError },
    #[snafu(display("Change event has an unusable path"))]
    ChangePathError { source: InvalidPathError },
    #[snafu(display("Created event for '{}' has no node", path))]
    MissingNode { path: String },
    #[snafu(display("{} event for '{}' must not carry a node", action, path))]
    UnexpectedNode { action: ChangeAction, path: String },
    #[snafu(display("Created event for '{}' carries a node named '{}'", path, name))]
    NodeNameMismatch { path: String, name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decode(frame: &str) -> Result<Message, MalformedMessageError> {
        Message::try_from(frame)
    }

    #[test]
    fn decodes_ping() {
        assert_eq!(decode(r#"{"type":"ping"}"#).unwrap(), Message::Heartbeat);
    }

    #[test]
    fn decodes_snapshot_forest() {
        let frame = r#"{"type":"snapshot","tree":[
            {"name":"a","type":"directory","children":[
                {"name":"b.txt","path":"/abs/a/b.txt","type":"file","status":"modified"}
            ]},
            {"name":"x","type":"file"}
        ]}"#;

        let Message::Snapshot(snapshot) = decode(frame).unwrap() else {
            panic!("Expected snapshot");
        };
        assert_eq!(snapshot.roots().len(), 2);
        let leaf = snapshot.find("a/b.txt").unwrap().unwrap();
        assert_eq!(leaf.path(), "a/b.txt");
        assert_eq!(leaf.status(), Some(ChangeStatus::Modified));
    }

    #[test]
    fn decodes_tree_root_object() {
        let frame = r#"{"type":"tree","tree":{"name":"root","type":"directory","children":[
            {"name":"notes","type":"directory"}
        ]}}"#;

        let Message::Snapshot(snapshot) = decode(frame).unwrap() else {
            panic!("Expected snapshot");
        };
        let notes = snapshot.find("notes").unwrap().unwrap();
        assert!(notes.is_directory());
        assert!(notes.children().is_empty());
    }

    #[test]
    fn decodes_created_event() {
        let frame = r#"{"type":"change","action":"created","path":"/a/b.txt",
            "node":{"name":"b.txt","type":"file"}}"#;
        let message = decode(frame).unwrap();
        assert_eq!(
            message,
            Message::Change(ChangeEvent::created(
                "/a/b.txt",
                TreeNode::file("b.txt").unwrap()
            ))
        );
    }

    #[rstest]
    #[case(r#"{"type":"change","action":"modified","path":"a/b"}"#, ChangeAction::Modified)]
    #[case(r#"{"type":"file-changed","action":"deleted","path":"a/b"}"#, ChangeAction::Deleted)]
    fn decodes_structural_events(#[case] frame: &str, #[case] action: ChangeAction) {
        let Message::Change(event) = decode(frame).unwrap() else {
            panic!("Expected change");
        };
        assert_eq!(event.action(), action);
        assert_eq!(event.path(), "a/b");
        assert!(event.node().is_none());
    }

    #[rstest]
    #[case("not json")]
    #[case(r#"{"type":"unknown"}"#)]
    #[case(r#"{"type":"change","action":"renamed","path":"a"}"#)]
    #[case(r#"{"type":"change","action":"deleted"}"#)]
    #[case(r#"{"type":"snapshot"}"#)]
    #[case(r#"{"type":"snapshot","tree":[{"name":"a","type":"socket"}]}"#)]
    fn rejects_undecodable_frames(#[case] frame: &str) {
        assert!(matches!(
            decode(frame),
            Err(MalformedMessageError::DecodeError { .. })
        ));
    }

    #[test]
    fn decodes_raw_frames() {
        let message = Message::try_from(br#"{"type":"ping"}"#.as_slice()).unwrap();
        assert_eq!(message, Message::Heartbeat);
    }

    #[test]
    fn rejects_frames_that_are_not_utf8() {
        let result = Message::try_from([b'{', 0xff, 0xfe, b'}'].as_slice());
        assert!(matches!(
            result,
            Err(MalformedMessageError::EncodingError { .. })
        ));
    }

    #[test]
    fn created_without_node_is_malformed() {
        let result = decode(r#"{"type":"change","action":"created","path":"a/b"}"#);
        assert!(matches!(result, Err(MalformedMessageError::MissingNode { .. })));
    }

    #[test]
    fn deleted_with_node_is_malformed() {
        let frame = r#"{"type":"change","action":"deleted","path":"a/b",
            "node":{"name":"b","type":"file"}}"#;
        assert!(matches!(
            decode(frame),
            Err(MalformedMessageError::UnexpectedNode { .. })
        ));
    }

    #[test]
    fn created_node_must_match_leaf() {
        let frame = r#"{"type":"change","action":"created","path":"a/b",
            "node":{"name":"c","type":"file"}}"#;
        assert!(matches!(
            decode(frame),
            Err(MalformedMessageError::NodeNameMismatch { .. })
        ));
    }

    #[test]
    fn empty_change_path_is_malformed() {
        let frame = r#"{"type":"change","action":"modified","path":"/"}"#;
        assert!(matches!(
            decode(frame),
            Err(MalformedMessageError::ChangePathError { .. })
        ));
    }

    #[rstest]
    #[case(r#"{"type":"snapshot","tree":[{"name":"x","type":"file"},{"name":"x","type":"file"}]}"#)]
    #[case(r#"{"type":"snapshot","tree":[{"name":"f","type":"file","children":[{"name":"g","type":"file"}]}]}"#)]
    #[case(r#"{"type":"snapshot","tree":[{"name":"","type":"file"}]}"#)]
    fn rejects_invalid_trees(#[case] frame: &str) {
        assert!(matches!(
            decode(frame),
            Err(MalformedMessageError::InvalidTreeError { .. })
        ));
    }

    #[test]
    fn unknown_status_is_dropped() {
        let frame = r#"{"type":"snapshot","tree":[{"name":"x","type":"file","status":"weird"}]}"#;
        let Message::Snapshot(snapshot) = decode(frame).unwrap() else {
            panic!("Expected snapshot");
        };
        assert_eq!(snapshot.roots()[0].status(), None);
    }
}
