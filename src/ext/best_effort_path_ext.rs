use std::path::{Component, Path, PathBuf};

/// Absolute, lexically normalized form of `path`, resolving symlinks when the
/// path exists.
pub fn best_effort_absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|current_dir| current_dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    normalize_lexically(&absolute)
}

/// Drops `.` components and folds `..` into its parent without touching the disk.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

pub trait BestEffortPathExt {
    fn best_effort_path_display(&self) -> String;
}

impl BestEffortPathExt for Path {
    fn best_effort_path_display(&self) -> String {
        best_effort_absolute(self).display().to_string()
    }
}

impl BestEffortPathExt for PathBuf {
    fn best_effort_path_display(&self) -> String {
        self.as_path().best_effort_path_display()
    }
}

impl BestEffortPathExt for str {
    fn best_effort_path_display(&self) -> String {
        Path::new(self).best_effort_path_display()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/a/./b/../c", "/a/c")]
    #[case("/a/b/../../..", "/")]
    #[case("a/../../b", "../b")]
    #[case("./a//b/", "a/b")]
    fn normalizes_without_disk_access(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_lexically(Path::new(input)), PathBuf::from(expected));
    }

    #[test]
    fn existing_paths_are_canonicalized() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let dotted = dir.path().join(".");
        assert_eq!(
            best_effort_absolute(&dotted),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn missing_relative_paths_become_absolute() {
        let display = "surely/missing/../file.txt".best_effort_path_display();
        assert!(Path::new(&display).is_absolute());
        assert!(display.ends_with("surely/file.txt"));
    }
}
