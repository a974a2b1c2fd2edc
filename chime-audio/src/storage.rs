//! Asset/user storage layout
//!
//! Sound assets live under a read-only asset root; user files live under a
//! writable user root. The two namespaces must not overlap, so a write can
//! never land inside the asset area. Relative paths are validated before
//! resolution: no absolute paths, no parent-directory traversal.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// The two storage namespaces the engine reads from and writes to.
#[derive(Debug, Clone)]
pub struct MediaPaths {
    asset_root: PathBuf,
    user_root: PathBuf,
}

impl MediaPaths {
    /// Build a layout from the two roots.
    ///
    /// # Errors
    /// [`Error::Storage`] if either root is nested inside the other.
    pub fn new(asset_root: PathBuf, user_root: PathBuf) -> Result<Self> {
        if user_root.starts_with(&asset_root) || asset_root.starts_with(&user_root) {
            return Err(Error::Storage(format!(
                "asset root {} and user root {} overlap",
                asset_root.display(),
                user_root.display()
            )));
        }

        Ok(Self {
            asset_root,
            user_root,
        })
    }

    /// Resolve a relative path inside the read-only asset namespace.
    pub fn asset(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let relative = relative.as_ref();
        validate_relative(relative)?;
        Ok(self.asset_root.join(relative))
    }

    /// Resolve a relative path inside the writable user namespace,
    /// creating the containing directory if needed.
    pub fn user(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let relative = relative.as_ref();
        validate_relative(relative)?;

        let resolved = self.user_root.join(relative);
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(resolved)
    }

    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    pub fn user_root(&self) -> &Path {
        &self.user_root
    }
}

/// Reject absolute paths and any form of parent-directory traversal.
fn validate_relative(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::Storage("empty path".to_string()));
    }

    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::Storage(format!(
                    "path {} escapes its root",
                    path.display()
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::Storage(format!(
                    "path {} is not relative",
                    path.display()
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> MediaPaths {
        MediaPaths::new(PathBuf::from("assets"), PathBuf::from("user")).unwrap()
    }

    #[test]
    fn test_asset_resolution() {
        let paths = layout();
        assert_eq!(
            paths.asset("sounds/effect.ogg").unwrap(),
            PathBuf::from("assets/sounds/effect.ogg")
        );
    }

    #[test]
    fn test_rejects_traversal() {
        let paths = layout();
        assert!(matches!(
            paths.asset("../secrets.ogg"),
            Err(Error::Storage(_))
        ));
        assert!(matches!(
            paths.asset("sounds/../../escape.ogg"),
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn test_rejects_absolute_paths() {
        let paths = layout();
        assert!(matches!(paths.asset("/etc/passwd"), Err(Error::Storage(_))));
    }

    #[test]
    fn test_rejects_empty_path() {
        let paths = layout();
        assert!(matches!(paths.asset(""), Err(Error::Storage(_))));
    }

    #[test]
    fn test_rejects_overlapping_roots() {
        assert!(MediaPaths::new(
            PathBuf::from("data"),
            PathBuf::from("data/user")
        )
        .is_err());
        assert!(MediaPaths::new(
            PathBuf::from("data/assets"),
            PathBuf::from("data")
        )
        .is_err());
    }

    #[test]
    fn test_user_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = MediaPaths::new(
            dir.path().join("assets"),
            dir.path().join("user"),
        )
        .unwrap();

        let resolved = paths.user("saves/slot1.dat").unwrap();
        assert!(resolved.parent().unwrap().is_dir());
        assert!(resolved.starts_with(dir.path().join("user")));
    }
}
