//! Best-effort git snapshot after a proposal completes.
//!
//! Nothing here may fail the calling operation: the caller logs the error
//! and moves on.

use std::path::Path;
use std::process::Command;

pub fn run_git(repo_root: &Path, args: &[&str]) -> Result<String, String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .map_err(|e| format!("git failed: {}", e))?;

    if !output.status.success() {
        return Err(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Committed(String),
    Skipped(&'static str),
}

/// Stage `paths` (relative to `repo_root`) and commit them with `message`.
pub fn snapshot(repo_root: &Path, paths: &[&Path], message: &str) -> Result<SnapshotOutcome, String> {
    if run_git(repo_root, &["rev-parse", "--is-inside-work-tree"]).is_err() {
        return Ok(SnapshotOutcome::Skipped("not_a_git_repo"));
    }

    let mut add_args: Vec<String> = vec!["add".into(), "-A".into(), "--".into()];
    add_args.extend(paths.iter().map(|p| p.to_string_lossy().into_owned()));
    let add_refs: Vec<&str> = add_args.iter().map(String::as_str).collect();
    run_git(repo_root, &add_refs)?;

    let staged = run_git(repo_root, &["diff", "--cached", "--name-only"])?;
    if staged.is_empty() {
        return Ok(SnapshotOutcome::Skipped("no_changes"));
    }

    run_git(repo_root, &["commit", "-m", message, "--no-verify"])?;
    let head = run_git(repo_root, &["rev-parse", "HEAD"])?;
    Ok(SnapshotOutcome::Committed(head))
}
