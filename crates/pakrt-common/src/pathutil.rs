//! Path containment helpers, adapted from `libcontainer::utils::PathBufExt`
//! (`join_safely` / `canonicalize_safely`), generalized from "join onto a container
//! rootfs" to "resolve and require containment under an arbitrary base".

use std::path::{Component, Path, PathBuf};

use crate::error::ValidationError;

pub trait PathBufExt {
    /// Joins `path` onto `self`, treating an absolute `path` as relative to `self`
    /// instead of replacing it (so `"/etc/passwd"` joined onto a rootfs lands inside the
    /// rootfs, not at the host's `/etc/passwd`).
    fn join_safely<P: AsRef<Path>>(&self, path: P) -> PathBuf;

    /// Lexically normalizes a path without requiring it to exist.
    fn normalize(&self) -> PathBuf;
}

impl PathBufExt for Path {
    fn join_safely<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        match path.strip_prefix("/") {
            Ok(stripped) => self.join(stripped),
            Err(_) => self.join(path),
        }
    }

    fn normalize(&self) -> PathBuf {
        let mut out = PathBuf::new();
        for component in self.components() {
            match component {
                Component::ParentDir => {
                    out.pop();
                }
                Component::CurDir => {}
                other => out.push(other.as_os_str()),
            }
        }
        out
    }
}

/// Resolves `input` relative to `base` and requires the normalized result to begin with
/// `base`, rejecting any `..` traversal that would escape it. `base` itself must already
/// be absolute and normalized.
pub fn sanitize_path(input: &Path, base: &Path) -> Result<PathBuf, ValidationError> {
    let joined = if input.is_absolute() {
        base.join_safely(input)
    } else {
        base.join(input)
    };
    let resolved = joined.normalize();

    if !resolved.starts_with(base) {
        return Err(ValidationError::PathTraversal {
            path: input.to_path_buf(),
            base: base.to_path_buf(),
        });
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_traversal() {
        let base = Path::new("/tmp/containers/rumah-a");
        assert!(sanitize_path(Path::new("../../etc/passwd"), base).is_err());
    }

    #[test]
    fn accepts_relative_descendant() {
        let base = Path::new("/tmp/containers/rumah-a");
        let resolved = sanitize_path(Path::new("rootfs/bin"), base).unwrap();
        assert_eq!(resolved, Path::new("/tmp/containers/rumah-a/rootfs/bin"));
    }

    #[test]
    fn absolute_input_is_rebased_not_replaced() {
        let base = Path::new("/tmp/containers/rumah-a/rootfs");
        let resolved = sanitize_path(Path::new("/etc/passwd"), base).unwrap();
        assert_eq!(
            resolved,
            Path::new("/tmp/containers/rumah-a/rootfs/etc/passwd")
        );
    }

    #[test]
    fn traversal_that_cancels_out_is_accepted() {
        let base = Path::new("/tmp/containers/rumah-a");
        let resolved = sanitize_path(Path::new("rootfs/../rootfs/bin"), base).unwrap();
        assert_eq!(resolved, Path::new("/tmp/containers/rumah-a/rootfs/bin"));
    }
}
