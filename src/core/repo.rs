//! Document repository: the only path by which engine code touches
//! proposal, spec, archive, maintenance, and rule documents.
//!
//! [`FsRepository`] is the real backend over a [`Layout`]. [`MemRepository`]
//! keeps everything in memory so consistency logic can be exercised without
//! a disk.

use crate::core::error::SpecdeckError;
use crate::core::layout::Layout;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

pub trait Repository {
    /// Proposal slugs, sorted.
    fn list_proposals(&self) -> Result<Vec<String>, SpecdeckError>;
    fn proposal_exists(&self, slug: &str) -> Result<bool, SpecdeckError>;
    fn create_proposal(&self, slug: &str) -> Result<(), SpecdeckError>;
    /// Raw bytes of one proposal document; `None` when absent.
    fn read_document(&self, slug: &str, doc: &str) -> Result<Option<Vec<u8>>, SpecdeckError>;
    fn write_document(&self, slug: &str, doc: &str, content: &str) -> Result<(), SpecdeckError>;
    fn delete_proposal(&self, slug: &str) -> Result<(), SpecdeckError>;

    /// Completed specification slugs, sorted.
    fn list_completed(&self) -> Result<Vec<String>, SpecdeckError>;
    fn read_completed(&self, slug: &str) -> Result<Option<String>, SpecdeckError>;
    fn write_completed(&self, slug: &str, content: &str) -> Result<(), SpecdeckError>;

    fn write_archive(&self, slug: &str, doc: &str, content: &[u8]) -> Result<(), SpecdeckError>;
    /// File names archived under `slug`, sorted.
    fn list_archive(&self, slug: &str) -> Result<Vec<String>, SpecdeckError>;

    fn list_maintenance(&self) -> Result<Vec<String>, SpecdeckError>;
    fn read_maintenance(&self, slug: &str) -> Result<Option<String>, SpecdeckError>;
    fn write_maintenance(&self, slug: &str, content: &str) -> Result<(), SpecdeckError>;

    fn list_rules(&self) -> Result<Vec<String>, SpecdeckError>;

    /// Document as text; invalid UTF-8 is replaced rather than rejected.
    fn read_text(&self, slug: &str, doc: &str) -> Result<Option<String>, SpecdeckError> {
        Ok(self
            .read_document(slug, doc)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }
}

#[derive(Debug, Clone)]
pub struct FsRepository {
    layout: Layout,
}

impl FsRepository {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, SpecdeckError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SpecdeckError::io("read", path)(e)),
    }
}

fn write_with_parents(path: &Path, content: &[u8]) -> Result<(), SpecdeckError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(SpecdeckError::io("create dir", parent))?;
    }
    fs::write(path, content).map_err(SpecdeckError::io("write", path))
}

/// Sorted entry names of `dir`. A missing directory is empty.
fn list_entries(dir: &Path, want_dirs: bool, ext: Option<&str>) -> Result<Vec<String>, SpecdeckError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SpecdeckError::io("list", dir)(e)),
    };
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(SpecdeckError::io("list", dir))?;
        let path = entry.path();
        if path.is_dir() != want_dirs {
            continue;
        }
        let name = match ext {
            Some(ext) => {
                if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                    continue;
                }
                path.file_stem().map(|s| s.to_string_lossy().into_owned())
            }
            None => path.file_name().map(|s| s.to_string_lossy().into_owned()),
        };
        if let Some(name) = name.filter(|n| !n.starts_with('.')) {
            out.push(name);
        }
    }
    out.sort();
    Ok(out)
}

impl Repository for FsRepository {
    fn list_proposals(&self) -> Result<Vec<String>, SpecdeckError> {
        list_entries(&self.layout.proposals_dir(), true, None)
    }

    fn proposal_exists(&self, slug: &str) -> Result<bool, SpecdeckError> {
        Ok(self.layout.proposal_dir(slug).is_dir())
    }

    fn create_proposal(&self, slug: &str) -> Result<(), SpecdeckError> {
        let dir = self.layout.proposal_dir(slug);
        fs::create_dir_all(&dir).map_err(SpecdeckError::io("create dir", &dir))
    }

    fn read_document(&self, slug: &str, doc: &str) -> Result<Option<Vec<u8>>, SpecdeckError> {
        read_optional(&self.layout.proposal_dir(slug).join(doc))
    }

    fn write_document(&self, slug: &str, doc: &str, content: &str) -> Result<(), SpecdeckError> {
        write_with_parents(&self.layout.proposal_dir(slug).join(doc), content.as_bytes())
    }

    fn delete_proposal(&self, slug: &str) -> Result<(), SpecdeckError> {
        let dir = self.layout.proposal_dir(slug);
        fs::remove_dir_all(&dir).map_err(SpecdeckError::io("delete", &dir))
    }

    fn list_completed(&self) -> Result<Vec<String>, SpecdeckError> {
        list_entries(&self.layout.specs_dir(), false, Some("md"))
    }

    fn read_completed(&self, slug: &str) -> Result<Option<String>, SpecdeckError> {
        Ok(read_optional(&self.layout.spec_path(slug))?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn write_completed(&self, slug: &str, content: &str) -> Result<(), SpecdeckError> {
        write_with_parents(&self.layout.spec_path(slug), content.as_bytes())
    }

    fn write_archive(&self, slug: &str, doc: &str, content: &[u8]) -> Result<(), SpecdeckError> {
        write_with_parents(&self.layout.archive_dir().join(slug).join(doc), content)
    }

    fn list_archive(&self, slug: &str) -> Result<Vec<String>, SpecdeckError> {
        list_entries(&self.layout.archive_dir().join(slug), false, None)
    }

    fn list_maintenance(&self) -> Result<Vec<String>, SpecdeckError> {
        list_entries(&self.layout.maintenance_dir(), false, Some("md"))
    }

    fn read_maintenance(&self, slug: &str) -> Result<Option<String>, SpecdeckError> {
        let path = self.layout.maintenance_dir().join(format!("{slug}.md"));
        Ok(read_optional(&path)?.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn write_maintenance(&self, slug: &str, content: &str) -> Result<(), SpecdeckError> {
        let path = self.layout.maintenance_dir().join(format!("{slug}.md"));
        write_with_parents(&path, content.as_bytes())
    }

    fn list_rules(&self) -> Result<Vec<String>, SpecdeckError> {
        list_entries(&self.layout.rules_dir(), false, Some("md"))
    }
}

type Docs = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Default)]
struct MemTree {
    proposals: BTreeMap<String, Docs>,
    completed: BTreeMap<String, String>,
    archive: BTreeMap<String, Docs>,
    maintenance: BTreeMap<String, String>,
    rules: BTreeMap<String, String>,
}

/// In-memory repository. Single-threaded, like the engine it backs.
#[derive(Debug, Default)]
pub struct MemRepository {
    tree: RefCell<MemTree>,
}

impl MemRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proposal(self, slug: &str, docs: &[(&str, &str)]) -> Self {
        {
            let mut tree = self.tree.borrow_mut();
            let entry = tree.proposals.entry(slug.to_string()).or_default();
            for (doc, content) in docs {
                entry.insert(doc.to_string(), content.as_bytes().to_vec());
            }
        }
        self
    }

    pub fn with_completed(self, slug: &str, content: &str) -> Self {
        self.tree
            .borrow_mut()
            .completed
            .insert(slug.to_string(), content.to_string());
        self
    }

    pub fn with_maintenance(self, slug: &str, content: &str) -> Self {
        self.tree
            .borrow_mut()
            .maintenance
            .insert(slug.to_string(), content.to_string());
        self
    }

    pub fn with_rule(self, slug: &str, content: &str) -> Self {
        self.tree
            .borrow_mut()
            .rules
            .insert(slug.to_string(), content.to_string());
        self
    }

    pub fn remove_document(&self, slug: &str, doc: &str) {
        if let Some(docs) = self.tree.borrow_mut().proposals.get_mut(slug) {
            docs.remove(doc);
        }
    }
}

impl Repository for MemRepository {
    fn list_proposals(&self) -> Result<Vec<String>, SpecdeckError> {
        Ok(self.tree.borrow().proposals.keys().cloned().collect())
    }

    fn proposal_exists(&self, slug: &str) -> Result<bool, SpecdeckError> {
        Ok(self.tree.borrow().proposals.contains_key(slug))
    }

    fn create_proposal(&self, slug: &str) -> Result<(), SpecdeckError> {
        self.tree
            .borrow_mut()
            .proposals
            .entry(slug.to_string())
            .or_default();
        Ok(())
    }

    fn read_document(&self, slug: &str, doc: &str) -> Result<Option<Vec<u8>>, SpecdeckError> {
        Ok(self
            .tree
            .borrow()
            .proposals
            .get(slug)
            .and_then(|docs| docs.get(doc))
            .cloned())
    }

    fn write_document(&self, slug: &str, doc: &str, content: &str) -> Result<(), SpecdeckError> {
        self.tree
            .borrow_mut()
            .proposals
            .entry(slug.to_string())
            .or_default()
            .insert(doc.to_string(), content.as_bytes().to_vec());
        Ok(())
    }

    fn delete_proposal(&self, slug: &str) -> Result<(), SpecdeckError> {
        self.tree
            .borrow_mut()
            .proposals
            .remove(slug)
            .map(|_| ())
            .ok_or_else(|| SpecdeckError::NotFound(format!("proposal {slug}")))
    }

    fn list_completed(&self) -> Result<Vec<String>, SpecdeckError> {
        Ok(self.tree.borrow().completed.keys().cloned().collect())
    }

    fn read_completed(&self, slug: &str) -> Result<Option<String>, SpecdeckError> {
        Ok(self.tree.borrow().completed.get(slug).cloned())
    }

    fn write_completed(&self, slug: &str, content: &str) -> Result<(), SpecdeckError> {
        self.tree
            .borrow_mut()
            .completed
            .insert(slug.to_string(), content.to_string());
        Ok(())
    }

    fn write_archive(&self, slug: &str, doc: &str, content: &[u8]) -> Result<(), SpecdeckError> {
        self.tree
            .borrow_mut()
            .archive
            .entry(slug.to_string())
            .or_default()
            .insert(doc.to_string(), content.to_vec());
        Ok(())
    }

    fn list_archive(&self, slug: &str) -> Result<Vec<String>, SpecdeckError> {
        Ok(self
            .tree
            .borrow()
            .archive
            .get(slug)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn list_maintenance(&self) -> Result<Vec<String>, SpecdeckError> {
        Ok(self.tree.borrow().maintenance.keys().cloned().collect())
    }

    fn read_maintenance(&self, slug: &str) -> Result<Option<String>, SpecdeckError> {
        Ok(self.tree.borrow().maintenance.get(slug).cloned())
    }

    fn write_maintenance(&self, slug: &str, content: &str) -> Result<(), SpecdeckError> {
        self.tree
            .borrow_mut()
            .maintenance
            .insert(slug.to_string(), content.to_string());
        Ok(())
    }

    fn list_rules(&self) -> Result<Vec<String>, SpecdeckError> {
        Ok(self.tree.borrow().rules.keys().cloned().collect())
    }
}
