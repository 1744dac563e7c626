//! On-disk layout of a specdeck workspace.
//!
//! ```text
//! <project>/.specdeck/
//!   proposals/<slug>/{spec.md,design.md,impl.md}
//!   specs/<slug>.md
//!   archive/<slug>/
//!   maintenance/<slug>.md
//!   rules/<slug>.md
//!   state.json  config.toml  events.jsonl
//! ```

use crate::core::error::SpecdeckError;
use std::fs;
use std::path::{Path, PathBuf};

pub const WORKSPACE_DIR_NAME: &str = ".specdeck";
pub const STATE_FILE_NAME: &str = "state.json";
pub const JOURNAL_FILE_NAME: &str = "events.jsonl";

pub const SPEC_DOC: &str = "spec.md";
pub const DESIGN_DOC: &str = "design.md";
pub const IMPL_DOC: &str = "impl.md";

/// Documents hashed at activation, in reporting order.
pub const TRACKED_DOCS: [&str; 3] = [SPEC_DOC, DESIGN_DOC, IMPL_DOC];

/// Documents copied into the archive on completion.
pub const ARCHIVED_DOCS: [&str; 2] = [DESIGN_DOC, IMPL_DOC];

#[derive(Debug, Clone)]
pub struct Layout {
    pub root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn proposals_dir(&self) -> PathBuf {
        self.root.join("proposals")
    }

    pub fn proposal_dir(&self, slug: &str) -> PathBuf {
        self.proposals_dir().join(slug)
    }

    pub fn specs_dir(&self) -> PathBuf {
        self.root.join("specs")
    }

    pub fn spec_path(&self, slug: &str) -> PathBuf {
        self.specs_dir().join(format!("{slug}.md"))
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }

    pub fn maintenance_dir(&self) -> PathBuf {
        self.root.join("maintenance")
    }

    pub fn rules_dir(&self) -> PathBuf {
        self.root.join("rules")
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE_NAME)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.root.join(JOURNAL_FILE_NAME)
    }

    /// Create every area directory. Idempotent.
    pub fn ensure_dirs(&self) -> Result<(), SpecdeckError> {
        for dir in [
            self.proposals_dir(),
            self.specs_dir(),
            self.archive_dir(),
            self.maintenance_dir(),
            self.rules_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(SpecdeckError::io("create dir", &dir))?;
        }
        Ok(())
    }
}

/// Walk up from `start_dir` to the nearest directory holding `.specdeck/`.
pub fn find_workspace_root(start_dir: &Path) -> Result<PathBuf, SpecdeckError> {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join(WORKSPACE_DIR_NAME);
        if candidate.is_dir() {
            return Ok(candidate);
        }
        current = dir.parent();
    }
    Err(SpecdeckError::NotFound(format!(
        "no {} workspace above {} (run `specdeck init`)",
        WORKSPACE_DIR_NAME,
        start_dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_workspace_from_nested_dir() {
        let tmp = tempdir().unwrap();
        let ws = tmp.path().join(WORKSPACE_DIR_NAME);
        fs::create_dir_all(&ws).unwrap();
        let nested = tmp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_workspace_root(&nested).unwrap(), ws);
    }

    #[test]
    fn missing_workspace_is_not_found() {
        let tmp = tempdir().unwrap();
        let err = find_workspace_root(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn ensure_dirs_is_idempotent() {
        let tmp = tempdir().unwrap();
        let layout = Layout::new(tmp.path());
        layout.ensure_dirs().unwrap();
        layout.ensure_dirs().unwrap();
        assert!(layout.proposals_dir().is_dir());
        assert!(layout.rules_dir().is_dir());
    }
}
