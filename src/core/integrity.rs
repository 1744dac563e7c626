//! Drift detection for activated proposals.
//!
//! Hashes are captured when a proposal is activated. Anything that reads the
//! active proposal later re-hashes and compares; additions and modifications
//! are reported, deletions are not.

use crate::core::error::SpecdeckError;
use crate::core::layout::TRACKED_DOCS;
use crate::core::repo::Repository;
use crate::core::state::FileHashes;
use sha2::{Digest, Sha256};
use tracing::debug;

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hash every tracked document that exists. Absent documents are omitted.
pub fn capture_hashes(repo: &dyn Repository, slug: &str) -> Result<FileHashes, SpecdeckError> {
    let mut out = FileHashes::new();
    for doc in TRACKED_DOCS {
        if let Some(bytes) = repo.read_document(slug, doc)? {
            out.insert(doc.to_string(), hash_bytes(&bytes));
        }
    }
    debug!(slug, files = out.len(), "captured integrity hashes");
    Ok(out)
}

/// Tracked documents that are new or modified since `stored` was captured,
/// in tracked order.
pub fn verify(
    repo: &dyn Repository,
    slug: &str,
    stored: &FileHashes,
) -> Result<Vec<String>, SpecdeckError> {
    let mut changed = Vec::new();
    for doc in TRACKED_DOCS {
        let Some(bytes) = repo.read_document(slug, doc)? else {
            continue;
        };
        let current = hash_bytes(&bytes);
        if stored.get(doc) != Some(&current) {
            changed.push(doc.to_string());
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::repo::MemRepository;

    fn repo() -> MemRepository {
        MemRepository::new().with_proposal("auth", &[("spec.md", "# Auth"), ("design.md", "d")])
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn capture_omits_absent_documents() {
        let hashes = capture_hashes(&repo(), "auth").unwrap();
        assert_eq!(
            hashes.keys().cloned().collect::<Vec<_>>(),
            vec!["design.md", "spec.md"]
        );
    }

    #[test]
    fn unchanged_documents_verify_clean() {
        let repo = repo();
        let stored = capture_hashes(&repo, "auth").unwrap();
        assert!(verify(&repo, "auth", &stored).unwrap().is_empty());
    }

    #[test]
    fn modified_document_is_reported_alone() {
        let repo = repo();
        let stored = capture_hashes(&repo, "auth").unwrap();
        repo.write_document("auth", "design.md", "d2").unwrap();
        assert_eq!(verify(&repo, "auth", &stored).unwrap(), vec!["design.md"]);
    }

    #[test]
    fn added_document_is_reported() {
        let repo = repo();
        let stored = capture_hashes(&repo, "auth").unwrap();
        repo.write_document("auth", "impl.md", "tasks").unwrap();
        assert_eq!(verify(&repo, "auth", &stored).unwrap(), vec!["impl.md"]);
    }

    #[test]
    fn deleted_document_is_not_reported() {
        let repo = repo();
        let stored = capture_hashes(&repo, "auth").unwrap();
        repo.remove_document("auth", "design.md");
        assert!(verify(&repo, "auth", &stored).unwrap().is_empty());
    }
}
