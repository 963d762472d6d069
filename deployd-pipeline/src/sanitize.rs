//! Resolving caller-supplied relative names under a fixed root.
//!
//! Every filesystem call made on behalf of a caller-supplied name goes through
//! [`resolve_within`] first.

use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// Resolve `name` as a relative path strictly under `root`.
///
/// Rejects empty names, `..` components and absolute or prefixed paths. The
/// deepest existing ancestor of the result is canonicalized and must lie
/// under the canonical `root`, so a symlink inside the tree cannot lead out
/// of it. `root` itself must exist.
pub fn resolve_within(root: &Path, name: &str) -> Result<PathBuf, PathError> {
    if name.is_empty() {
        return Err(PathError::Empty);
    }

    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(PathError::Traversal(name.to_string())),
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::Absolute(name.to_string()))
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(PathError::Empty);
    }

    let canonical_root = root.canonicalize().map_err(|source| PathError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    let candidate = root.join(&relative);

    // `root` is an ancestor of `candidate`, so this always finds an anchor.
    for ancestor in candidate.ancestors() {
        if let Ok(real) = ancestor.canonicalize() {
            if real.starts_with(&canonical_root) {
                return Ok(candidate);
            }
            break;
        }
    }
    Err(PathError::Escape(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    #[rstest]
    #[case("app.conf", "app.conf")]
    #[case("./app.conf", "app.conf")]
    #[case("conf/app.conf", "conf/app.conf")]
    #[case("not-yet/created.txt", "not-yet/created.txt")]
    fn accepts_relative_names(#[case] name: &str, #[case] expected: &str) {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("conf")).unwrap();
        assert_eq!(
            resolve_within(root.path(), name).unwrap(),
            root.path().join(expected)
        );
    }

    #[rstest]
    #[case("../secret")]
    #[case("conf/../../secret")]
    #[case("..")]
    fn rejects_traversal(#[case] name: &str) {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_within(root.path(), name),
            Err(PathError::Traversal(_))
        ));
    }

    #[test]
    fn rejects_absolute() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_within(root.path(), "/etc/passwd"),
            Err(PathError::Absolute(_))
        ));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("./")]
    fn rejects_empty(#[case] name: &str) {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_within(root.path(), name),
            Err(PathError::Empty)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escape() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("victim"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();

        assert!(matches!(
            resolve_within(root.path(), "link/victim"),
            Err(PathError::Escape(_))
        ));
    }

    #[test]
    fn missing_root_is_io_error() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_within(&root.path().join("gone"), "file"),
            Err(PathError::Io { .. })
        ));
    }
}
