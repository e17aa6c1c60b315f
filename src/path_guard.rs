//! Safe destination paths for remote-supplied names
//!
//! Repository and gist names come from an untrusted remote catalog. Every
//! filesystem operation keyed by such a name must go through [`resolve`].

use path_clean::PathClean;
use std::path::{Component, Path, PathBuf};

use crate::error::SyncError;

/// Resolve `untrusted_name` to a directory strictly below `root`.
///
/// Only the last segment of the name is used. Names that are empty, absolute,
/// or contain `..` are rejected outright, and the cleaned candidate must still
/// be a descendant of the absolute root.
pub fn resolve(root: &Path, untrusted_name: &str) -> Result<PathBuf, SyncError> {
    let reject = || SyncError::PathTraversal {
        name: untrusted_name.to_string(),
        root: root.to_path_buf(),
    };

    let name = Path::new(untrusted_name);
    let escapes = name.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if untrusted_name.trim().is_empty() || escapes {
        return Err(reject());
    }

    let base = name.file_name().ok_or_else(reject)?;

    let root_abs = absolute(root)?;
    let candidate = root_abs.join(base).clean();

    if candidate != root_abs && candidate.starts_with(&root_abs) {
        Ok(candidate)
    } else {
        Err(reject())
    }
}

fn absolute(path: &Path) -> Result<PathBuf, SyncError> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(path.clean())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_plain_name_lands_under_root() {
        let root = Path::new("/srv/mirror");
        assert_eq!(
            resolve(root, "octocat_Hello-World").unwrap(),
            PathBuf::from("/srv/mirror/octocat_Hello-World")
        );
    }

    #[test]
    fn test_only_basename_is_used() {
        let root = Path::new("/srv/mirror");
        assert_eq!(
            resolve(root, "octocat/Hello-World").unwrap(),
            PathBuf::from("/srv/mirror/Hello-World")
        );
    }

    #[test]
    fn test_rejects_escaping_names() {
        let root = Path::new("/srv/mirror");
        for name in ["../../etc", "..", "a/../../b", "/etc/passwd", "", "  ", "."] {
            assert_matches!(
                resolve(root, name),
                Err(SyncError::PathTraversal { .. }),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_relative_root_is_absolutized() {
        let resolved = resolve(Path::new("mirrors/./repos"), "r1").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("mirrors/repos/r1"));
    }

    #[quickcheck]
    fn prop_never_escapes_root(segments: Vec<String>) -> bool {
        let root = Path::new("/srv/mirror");
        let name = segments.join("/");
        match resolve(root, &name) {
            Ok(path) => path.starts_with(root) && path != root,
            Err(_) => true,
        }
    }

    #[quickcheck]
    fn prop_parent_prefix_always_rejected(tail: String) -> bool {
        let root = Path::new("/srv/mirror");
        resolve(root, &format!("../{}", tail)).is_err()
    }
}
