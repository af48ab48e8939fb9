//! Version control integration.
//!
//! The tree notifies its [`Vcs`] when item files are created, edited or
//! deleted so working-copy tools can stage the changes. Detection walks
//! up from the tree root looking for a known working-copy marker.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Hooks invoked around item file mutations.
pub trait Vcs: std::fmt::Debug {
    /// Whether the working copy ignores this path.
    ///
    /// Ignored files are not announced when created.
    fn is_ignored(&self, path: &Path) -> bool;

    /// A new file was created.
    fn add(&self, path: &Path);

    /// An existing file was modified.
    fn edit(&self, path: &Path);

    /// A file was deleted.
    fn delete(&self, path: &Path);
}

/// No working copy: every hook is a no-op.
#[derive(Debug, Default)]
pub struct NullVcs;

impl Vcs for NullVcs {
    fn is_ignored(&self, _path: &Path) -> bool {
        false
    }

    fn add(&self, _path: &Path) {}
    fn edit(&self, _path: &Path) {}
    fn delete(&self, _path: &Path) {}
}

/// A git working copy.
///
/// Git tracks content, not intents, so the hooks only trace; the commit
/// itself is left to the user.
#[derive(Debug)]
pub struct GitVcs {
    root: PathBuf,
}

impl Vcs for GitVcs {
    // Checking real ignore rules would mean shelling out to git; item
    // files live next to their tracked .config.yml, so assume tracked.
    fn is_ignored(&self, _path: &Path) -> bool {
        false
    }

    fn add(&self, path: &Path) {
        debug!(root = %self.root.display(), path = %path.display(), "created");
    }

    fn edit(&self, path: &Path) {
        debug!(root = %self.root.display(), path = %path.display(), "edited");
    }

    fn delete(&self, path: &Path) {
        debug!(root = %self.root.display(), path = %path.display(), "deleted");
    }
}

/// Finds the working copy containing `path`.
#[must_use]
pub fn detect(path: &Path) -> Box<dyn Vcs> {
    let mut current = Some(path);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Box::new(GitVcs {
                root: dir.to_path_buf(),
            });
        }
        current = dir.parent();
    }
    Box::new(NullVcs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_git_working_copy() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        let vcs = detect(&nested);
        assert!(format!("{vcs:?}").contains("GitVcs"));
    }
}
