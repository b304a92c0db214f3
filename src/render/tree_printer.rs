use std::fmt::Write;

use colored::{ColoredString, Colorize};
use supports_color::Stream;

use crate::filesystem::{ChangeStatus, Snapshot, TreeNode};

/// Enables colored output only when stdout supports it.
pub fn configure_color() {
    colored::control::set_override(supports_color::on(Stream::Stdout).is_some());
}

/// Renders `snapshot` as an indented tree, one node per line.
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    if snapshot.is_empty() {
        return "(empty)".dimmed().to_string();
    }

    let mut out = String::new();
    for root in snapshot.roots() {
        let _ = writeln!(out, "{}", label(root));
        render_children(root, "", &mut out);
    }
    out
}

fn render_children(node: &TreeNode, prefix: &str, out: &mut String) {
    let count = node.children().len();
    for (index, child) in node.children().iter().enumerate() {
        let last = index + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        let _ = writeln!(out, "{prefix}{branch}{}", label(child));

        let nested = format!("{prefix}{}", if last { "    " } else { "│   " });
        render_children(child, &nested, out);
    }
}

fn label(node: &TreeNode) -> String {
    let name: ColoredString = if node.is_directory() {
        format!("{}/", node.name()).blue().bold()
    } else {
        node.name().normal()
    };

    match node.status() {
        Some(status) => format!("{} {}", name, status_tag(status)),
        None => name.to_string(),
    }
}

fn status_tag(status: ChangeStatus) -> ColoredString {
    let tag = format!("({status})");
    match status {
        ChangeStatus::Added => tag.green(),
        ChangeStatus::Modified => tag.yellow(),
        ChangeStatus::Deleted => tag.red(),
    }
}
