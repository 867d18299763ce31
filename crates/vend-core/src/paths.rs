use std::path::{Path, PathBuf};

/// Walk up from `cwd` to the first directory containing a `package.json`.
#[must_use]
pub fn project_root(cwd: &Path) -> Option<PathBuf> {
    cwd.ancestors()
        .find(|dir| dir.join("package.json").is_file())
        .map(Path::to_path_buf)
}

/// Resolve `path` against `base` unless it is already absolute.
#[must_use]
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_project_root_walks_up() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let nested = dir.path().join("src/lib");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(project_root(&nested).as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_resolve_against() {
        assert_eq!(
            resolve_against(Path::new("/host"), Path::new("vendored")),
            PathBuf::from("/host/vendored")
        );
        assert_eq!(
            resolve_against(Path::new("/host"), Path::new("/abs")),
            PathBuf::from("/abs")
        );
    }
}
