//! Per-run storage for extracted frames.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use vtriage_models::RunId;

use crate::error::MediaResult;

/// Directory that holds the frames of one analysis run.
///
/// A temporary scope is deleted when dropped; a persistent scope is left on
/// disk for the caller. Either way the directory starts out empty, so frames
/// from an earlier run are never picked up.
#[derive(Debug)]
pub enum FrameScope {
    Temporary(TempDir),
    Persistent(PathBuf),
}

impl FrameScope {
    /// Create a fresh temporary directory, under `parent` when given.
    pub fn temporary(parent: Option<&Path>) -> MediaResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("frames_");

        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        debug!("Created frame scope {}", dir.path().display());
        Ok(Self::Temporary(dir))
    }

    /// Create `<root>/<run_id>` inside a caller-owned directory.
    ///
    /// Fails if that directory already exists.
    pub fn persistent(root: &Path, run_id: &RunId) -> MediaResult<Self> {
        std::fs::create_dir_all(root)?;
        let dir = root.join(run_id.as_str());
        std::fs::create_dir(&dir)?;

        debug!("Created frame scope {}", dir.display());
        Ok(Self::Persistent(dir))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Temporary(dir) => dir.path(),
            Self::Persistent(dir) => dir,
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_scope_is_removed_on_drop() {
        let scope = FrameScope::temporary(None).unwrap();
        let path = scope.path().to_path_buf();
        assert!(path.exists());
        assert!(scope.is_temporary());

        drop(scope);
        assert!(!path.exists());
    }

    #[test]
    fn test_temporary_scopes_are_unique() {
        let parent = tempfile::tempdir().unwrap();
        let a = FrameScope::temporary(Some(parent.path())).unwrap();
        let b = FrameScope::temporary(Some(parent.path())).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(parent.path()));
    }

    #[test]
    fn test_persistent_scope_survives_drop() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("keep").join("frames");
        let run_id = RunId::from_string("run-1");

        let scope = FrameScope::persistent(&root, &run_id).unwrap();
        assert!(!scope.is_temporary());
        assert_eq!(scope.path(), root.join("run-1"));
        drop(scope);

        assert!(root.join("run-1").exists());
    }

    #[test]
    fn test_persistent_scope_starts_empty() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("frame_000000.jpg"), b"stale").unwrap();

        let scope = FrameScope::persistent(root.path(), &RunId::new()).unwrap();
        assert_eq!(std::fs::read_dir(scope.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_persistent_scope_refuses_reused_run_id() {
        let root = tempfile::tempdir().unwrap();
        let run_id = RunId::from_string("twice");

        FrameScope::persistent(root.path(), &run_id).unwrap();
        assert!(FrameScope::persistent(root.path(), &run_id).is_err());
    }
}
