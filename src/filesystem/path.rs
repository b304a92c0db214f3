use snafu::{OptionExt, Snafu};

/// Separator used by the producer for every path it reports.
pub const SEPARATOR: char = '/';

/// A path broken into name segments. Always holds at least the leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegments<'a> {
    parents: Vec<&'a str>,
    leaf: &'a str,
}

impl<'a> PathSegments<'a> {
    /// The directory chain leading to the leaf, outermost first.
    pub fn parents(&self) -> &[&'a str] {
        &self.parents
    }

    /// The final segment, i.e. the name of the addressed node.
    pub fn leaf(&self) -> &'a str {
        self.leaf
    }

    pub fn len(&self) -> usize {
        self.parents.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Path of the leaf's parent directory, `None` for a top-level leaf.
    pub fn parent_path(&self) -> Option<String> {
        if self.parents.is_empty() {
            None
        } else {
            Some(self.parents.join(&SEPARATOR.to_string()))
        }
    }

    pub fn to_vec(&self) -> Vec<&'a str> {
        let mut all = self.parents.clone();
        all.push(self.leaf);
        all
    }
}

/// Splits `path` into name segments.
///
/// Leading separators are stripped and the empty segments produced by
/// repeated separators are skipped, so `"//a//b"` and `"a/b"` resolve alike.
pub fn resolve(path: &str) -> Result<PathSegments<'_>, InvalidPathError> {
    let mut parents = path
        .split(SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();
    let leaf = parents.pop().context(InvalidPathSnafu { path })?;

    Ok(PathSegments { parents, leaf })
}

/// Builds the path of `name` inside `parent`; a node without parent is its own path.
pub fn join(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{parent}{SEPARATOR}{name}"),
        _ => name.to_string(),
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("Path '{}' does not contain any name segment", path))]
pub struct InvalidPathError {
    path: String,
}

impl InvalidPathError {
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn strips_leading_separator() {
        let segments = resolve("/a/b/c.txt").unwrap();
        assert_eq!(segments.to_vec(), vec!["a", "b", "c.txt"]);
        assert_eq!(segments.leaf(), "c.txt");
        assert_eq!(segments.parents(), &["a", "b"]);
    }

    #[rstest]
    #[case("a", vec!["a"])]
    #[case("a/b", vec!["a", "b"])]
    #[case("///a//b///", vec!["a", "b"])]
    #[case("dir with spaces/ünïcode.md", vec!["dir with spaces", "ünïcode.md"])]
    fn resolves_segments(#[case] path: &str, #[case] expected: Vec<&str>) {
        assert_eq!(resolve(path).unwrap().to_vec(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("/")]
    #[case("////")]
    fn rejects_paths_without_segments(#[case] path: &str) {
        let error = resolve(path).unwrap_err();
        assert_eq!(error.path(), path);
    }

    #[test]
    fn parent_path_of_nested_and_top_level_leaves() {
        assert_eq!(resolve("a/b/c").unwrap().parent_path().as_deref(), Some("a/b"));
        assert_eq!(resolve("/c").unwrap().parent_path(), None);
    }

    #[test]
    fn join_builds_child_paths() {
        assert_eq!(join(None, "a"), "a");
        assert_eq!(join(Some(""), "a"), "a");
        assert_eq!(join(Some("a/b"), "c.txt"), "a/b/c.txt");
    }

    #[test]
    fn error_mentions_offending_path() {
        let message = resolve("//").unwrap_err().to_string();
        assert!(message.contains("'//'"));
    }
}
