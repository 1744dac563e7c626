//! The single persisted state record (`state.json`).
//!
//! The directory tree is the primary store; this file is a side index of
//! which proposals are active, which one is primary, the integrity hashes
//! captured at activation, and when each maintenance requirement was last
//! actioned. It can drift from the tree, so [`StateStore::reconcile`] is the
//! one place stale references are dropped.

use crate::core::error::SpecdeckError;
use crate::core::repo::Repository;
use crate::core::slug;
use serde::{Deserialize, Deserializer, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const STATE_VERSION: u32 = 1;

pub type FileHashes = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub primary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hashes: BTreeMap<String, FileHashes>,
    #[serde(
        default,
        rename = "maintenanceState",
        deserialize_with = "null_as_default"
    )]
    pub maintenance_state: BTreeMap<String, BTreeMap<String, String>>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

/// Older records may carry `null` where a collection is expected.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for WorkspaceState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            active: Vec::new(),
            primary: String::new(),
            hashes: BTreeMap::new(),
            maintenance_state: BTreeMap::new(),
        }
    }
}

impl WorkspaceState {
    pub fn is_active(&self, slug: &str) -> bool {
        self.active.iter().any(|s| s == slug)
    }

    pub fn primary(&self) -> Option<&str> {
        (!self.primary.is_empty()).then_some(self.primary.as_str())
    }

    /// Add to `active` (if absent), make primary, and store hashes.
    pub fn activate(&mut self, slug: &str, hashes: FileHashes) {
        if !self.is_active(slug) {
            self.active.push(slug.to_string());
        }
        self.primary = slug.to_string();
        self.hashes.insert(slug.to_string(), hashes);
    }

    /// Drop every reference to `slug`. A vacated primary falls back to the
    /// first remaining active slug. Returns whether anything changed.
    pub fn forget(&mut self, slug: &str) -> bool {
        let before = self.active.len();
        self.active.retain(|s| s != slug);
        let had_hashes = self.hashes.remove(slug).is_some();
        let was_primary = self.primary == slug;
        if was_primary {
            self.primary = self.active.first().cloned().unwrap_or_default();
        }
        before != self.active.len() || had_hashes || was_primary
    }

    pub fn last_actioned(&self, item: &str, id: &str) -> Option<&str> {
        self.maintenance_state
            .get(item)
            .and_then(|m| m.get(id))
            .map(String::as_str)
    }

    pub fn set_actioned(&mut self, item: &str, id: &str, ts: String) {
        self.maintenance_state
            .entry(item.to_string())
            .or_default()
            .insert(id.to_string(), ts);
    }

    /// Restore the record's own invariants: `active` holds distinct
    /// normalized slugs, `primary ∈ active ∪ {""}`, and `hashes` is keyed
    /// only by active slugs.
    pub fn normalize(&mut self) {
        let mut seen = Vec::with_capacity(self.active.len());
        self.active.retain(|s| {
            if !slug::is_slug(s) || seen.contains(s) {
                false
            } else {
                seen.push(s.clone());
                true
            }
        });
        if !self.primary.is_empty() && !self.is_active(&self.primary) {
            self.primary = self.active.first().cloned().unwrap_or_default();
        }
        let active = &self.active;
        self.hashes.retain(|slug, _| active.contains(slug));
    }
}

#[derive(Debug)]
enum Backing {
    File(PathBuf),
    Memory(RefCell<Option<String>>),
}

/// Loads and saves [`WorkspaceState`]. No locking: `save` overwrites the
/// whole record and the last writer wins.
#[derive(Debug)]
pub struct StateStore {
    backing: Backing,
}

impl StateStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            backing: Backing::File(path.into()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backing: Backing::Memory(RefCell::new(None)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File(p) => Some(p),
            Backing::Memory(_) => None,
        }
    }

    fn read_raw(&self) -> Result<Option<String>, SpecdeckError> {
        match &self.backing {
            Backing::File(path) => match fs::read_to_string(path) {
                Ok(s) => Ok(Some(s)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(SpecdeckError::io("read state", path)(e)),
            },
            Backing::Memory(cell) => Ok(cell.borrow().clone()),
        }
    }

    /// Missing record → fresh default state. Unparsable → `Malformed`.
    pub fn load(&self) -> Result<WorkspaceState, SpecdeckError> {
        let Some(raw) = self.read_raw()? else {
            debug!("no state record yet; starting from defaults");
            return Ok(WorkspaceState::default());
        };
        if raw.trim().is_empty() {
            return Ok(WorkspaceState::default());
        }
        let mut state: WorkspaceState =
            serde_json::from_str(&raw).map_err(|e| SpecdeckError::Malformed {
                what: self.describe(),
                line: Some(e.line()),
                reason: e.to_string(),
            })?;
        state.normalize();
        Ok(state)
    }

    pub fn save(&self, state: &WorkspaceState) -> Result<(), SpecdeckError> {
        let mut body = serde_json::to_string_pretty(state)?;
        body.push('\n');
        match &self.backing {
            Backing::File(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(SpecdeckError::io("create dir", parent))?;
                }
                let tmp = path.with_extension("json.tmp");
                fs::write(&tmp, &body).map_err(SpecdeckError::io("write state", &tmp))?;
                fs::rename(&tmp, path).map_err(SpecdeckError::io("replace state", path))?;
            }
            Backing::Memory(cell) => {
                *cell.borrow_mut() = Some(body);
            }
        }
        Ok(())
    }

    /// Drop references to proposals whose directories are gone. Returns the
    /// slugs that were dropped; the caller decides whether to save.
    pub fn reconcile(
        &self,
        state: &mut WorkspaceState,
        repo: &dyn Repository,
    ) -> Result<Vec<String>, SpecdeckError> {
        let mut referenced: Vec<String> = state.active.clone();
        if !state.primary.is_empty() && !referenced.contains(&state.primary) {
            referenced.push(state.primary.clone());
        }
        referenced.extend(
            state
                .hashes
                .keys()
                .filter(|k| !state.active.contains(*k))
                .cloned(),
        );

        let mut dropped = Vec::new();
        for slug in referenced {
            if !repo.proposal_exists(&slug)? && state.forget(&slug) {
                warn!(slug = %slug, "dropping stale reference to missing proposal");
                dropped.push(slug);
            }
        }
        Ok(dropped)
    }

    fn describe(&self) -> String {
        match &self.backing {
            Backing::File(p) => p.display().to_string(),
            Backing::Memory(_) => "state record".to_string(),
        }
    }
}
