use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpecdeckError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("{op} failed for {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid slug: {0:?} is not a normalized identifier")]
    InvalidSlug(String),
    #[error("Malformed {what}{}: {reason}", line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    Malformed {
        what: String,
        line: Option<usize>,
        reason: String,
    },
    #[error("Cannot activate {slug}: unmet dependencies: {}", missing.join(", "))]
    DependencyUnmet { slug: String, missing: Vec<String> },
    #[error("Cyclic dependency: {}", render_cycles(cycles))]
    CyclicDependency { cycles: Vec<Vec<String>> },
    #[error("Proposal {0} is active; deactivate it first or pass --force")]
    ActiveProposal(String),
    #[error("Config error: {0}")]
    Config(String),
}

fn render_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|c| c.join(" -> "))
        .collect::<Vec<_>>()
        .join("; ")
}

impl SpecdeckError {
    /// Wrap an I/O failure with the operation and path it happened on.
    pub fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| SpecdeckError::Io { op, path, source }
    }

    /// Stable machine-readable discriminator used in RPC and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            SpecdeckError::IoError(_) | SpecdeckError::Io { .. } => "io_failure",
            SpecdeckError::Json(_) => "malformed",
            SpecdeckError::NotFound(_) => "not_found",
            SpecdeckError::AlreadyExists(_) => "already_exists",
            SpecdeckError::InvalidSlug(_) => "invalid_slug",
            SpecdeckError::Malformed { .. } => "malformed",
            SpecdeckError::DependencyUnmet { .. } => "dependency_unmet",
            SpecdeckError::CyclicDependency { .. } => "cyclic_dependency",
            SpecdeckError::ActiveProposal(_) => "active_proposal",
            SpecdeckError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_includes_line_when_known() {
        let err = SpecdeckError::Malformed {
            what: "maintenance/security.md".to_string(),
            line: Some(7),
            reason: "missing [id=...]".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed maintenance/security.md (line 7): missing [id=...]"
        );
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn io_wrapper_keeps_context() {
        let wrap = SpecdeckError::io("read", "/tmp/x");
        let err = wrap(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(err.to_string().starts_with("read failed for /tmp/x"));
        assert_eq!(err.kind(), "io_failure");
    }

    #[test]
    fn cycles_render_as_arrows() {
        let err = SpecdeckError::CyclicDependency {
            cycles: vec![vec!["a".into(), "b".into(), "a".into()]],
        };
        assert_eq!(err.to_string(), "Cyclic dependency: a -> b -> a");
    }
}
