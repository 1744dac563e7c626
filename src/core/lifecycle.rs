//! Proposal lifecycle: create → activate → develop → validate → complete | remove.
//!
//! Every operation here is a single logical unit, but none is transactional
//! across files: a failure part-way through `complete` leaves whatever was
//! already copied in place and surfaces the error.

use crate::core::error::SpecdeckError;
use crate::core::git::{self, SnapshotOutcome};
use crate::core::graph::{self, DepStatus, Graph};
use crate::core::integrity;
use crate::core::layout::{ARCHIVED_DOCS, DESIGN_DOC, IMPL_DOC, SPEC_DOC, TRACKED_DOCS};
use crate::core::slug::{require_slug, slugify};
use crate::core::state::{FileHashes, WorkspaceState};
use crate::core::templates::TemplateData;
use crate::core::workspace::Workspace;
use crate::plugins::maintenance;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalSummary {
    pub slug: String,
    pub active: bool,
    pub primary: bool,
    pub documents: Vec<String>,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateOutcome {
    pub slug: String,
    pub hashes: FileHashes,
    /// The proposal was already active; only its hashes were refreshed.
    pub refreshed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeactivateOutcome {
    pub slug: String,
    pub primary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompleteOutcome {
    pub slug: String,
    pub archived: Vec<String>,
    pub snapshot: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub slug: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyRef {
    pub slug: String,
    pub status: DepStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalContext {
    pub slug: String,
    pub documents: BTreeMap<String, String>,
    pub dependencies: Vec<DependencyRef>,
    /// Files that changed since activation and were accepted by `confirm`.
    pub modified: Vec<String>,
}

/// Result of reading the active proposal. `Modified` is the integrity gate
/// refusing to proceed; the caller must re-activate or confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ContextOutcome {
    Ready(ProposalContext),
    Modified { slug: String, changed: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphReport {
    pub nodes: Graph,
    pub cycles: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenanceSummary {
    pub slug: String,
    pub requirements: usize,
    pub due: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceStatus {
    pub primary: Option<String>,
    pub proposals: Vec<ProposalSummary>,
    pub completed: Vec<String>,
    pub rules: Vec<String>,
    pub maintenance: Vec<MaintenanceSummary>,
    pub cycles: Vec<Vec<String>>,
    /// State references to proposals that no longer exist on disk.
    pub stale: Vec<String>,
}

impl Workspace {
    /// Load state and drop references to vanished proposals. The caller
    /// decides whether the repaired state is saved.
    fn load_reconciled(&self) -> Result<(WorkspaceState, Vec<String>), SpecdeckError> {
        let mut state = self.store().load()?;
        let dropped = self.store().reconcile(&mut state, self.repo())?;
        Ok((state, dropped))
    }

    fn require_proposal(&self, slug: &str) -> Result<(), SpecdeckError> {
        require_slug(slug)?;
        if self.repo().proposal_exists(slug)? {
            Ok(())
        } else {
            Err(SpecdeckError::NotFound(format!("proposal {slug}")))
        }
    }

    fn record(&self, op: &str, slug: &str, detail: serde_json::Value) -> Result<(), SpecdeckError> {
        self.journal().record(self.clock().now(), op, slug, detail)
    }

    fn template_data<'a>(&self, name: &'a str, slug: &'a str, date: &'a str) -> TemplateData<'a> {
        TemplateData::from([("name", name), ("slug", slug), ("date", date)])
    }

    /// Scaffold a new proposal from templates. Returns its slug.
    pub fn create_proposal(&self, name: &str) -> Result<String, SpecdeckError> {
        let slug = slugify(name)?;
        if self.repo().proposal_exists(&slug)? {
            return Err(SpecdeckError::AlreadyExists(format!("proposal {slug}")));
        }
        if self.repo().read_completed(&slug)?.is_some() {
            return Err(SpecdeckError::AlreadyExists(format!(
                "completed spec {slug}"
            )));
        }

        let date = self.clock().now().format("%Y-%m-%d").to_string();
        let data = self.template_data(name.trim(), &slug, &date);
        let rendered = TRACKED_DOCS
            .iter()
            .map(|doc| Ok((*doc, self.templates().render(doc, &data)?)))
            .collect::<Result<Vec<_>, SpecdeckError>>()?;

        self.repo().create_proposal(&slug)?;
        for (doc, content) in rendered {
            self.repo().write_document(&slug, doc, &content)?;
        }
        self.record("proposal.create", &slug, serde_json::json!({ "name": name.trim() }))?;
        info!(slug = %slug, "proposal created");
        Ok(slug)
    }

    /// Scaffold a maintenance document. Returns its slug.
    pub fn create_maintenance_item(&self, name: &str) -> Result<String, SpecdeckError> {
        let slug = slugify(name)?;
        if self.repo().read_maintenance(&slug)?.is_some() {
            return Err(SpecdeckError::AlreadyExists(format!("maintenance item {slug}")));
        }
        let date = self.clock().now().format("%Y-%m-%d").to_string();
        let data = self.template_data(name.trim(), &slug, &date);
        let content = self.templates().render("maintenance.md", &data)?;
        maintenance::parse_requirements(&content, &format!("maintenance/{slug}.md"))?;
        self.repo().write_maintenance(&slug, &content)?;
        self.record("maintenance.create", &slug, serde_json::Value::Null)?;
        info!(slug = %slug, "maintenance item created");
        Ok(slug)
    }

    /// Activate `slug` and make it primary. Every declared dependency must be
    /// a completed spec; with `block_cycles`, the slug must not sit on a cycle.
    pub fn activate(&self, slug: &str) -> Result<ActivateOutcome, SpecdeckError> {
        self.require_proposal(slug)?;
        let (mut state, _) = self.load_reconciled()?;
        let nodes = graph::build(self.repo(), &state)?;

        if self.config().lifecycle.block_cycles {
            let cycles = graph::cycles_through(&graph::detect_cycles(&nodes), slug);
            if !cycles.is_empty() {
                return Err(SpecdeckError::CyclicDependency { cycles });
            }
        }
        let missing = graph::missing_dependencies(&nodes, slug);
        if !missing.is_empty() {
            return Err(SpecdeckError::DependencyUnmet {
                slug: slug.to_string(),
                missing,
            });
        }

        let hashes = integrity::capture_hashes(self.repo(), slug)?;
        let refreshed = state.is_active(slug);
        state.activate(slug, hashes.clone());
        self.store().save(&state)?;
        self.record(
            "proposal.activate",
            slug,
            serde_json::json!({ "files": hashes.keys().collect::<Vec<_>>(), "refreshed": refreshed }),
        )?;
        info!(slug, files = hashes.len(), refreshed, "proposal activated");
        Ok(ActivateOutcome {
            slug: slug.to_string(),
            hashes,
            refreshed,
        })
    }

    /// Deactivate `slug`, or the primary when `None`.
    pub fn deactivate(&self, slug: Option<&str>) -> Result<DeactivateOutcome, SpecdeckError> {
        let slug = slug.map(require_slug).transpose()?;
        let (mut state, _) = self.load_reconciled()?;
        let target = match slug {
            Some(s) => s.to_string(),
            None => state
                .primary()
                .map(str::to_string)
                .ok_or_else(|| SpecdeckError::NotFound("no primary proposal".to_string()))?,
        };
        if !state.is_active(&target) {
            return Err(SpecdeckError::NotFound(format!(
                "active proposal {target}"
            )));
        }
        state.forget(&target);
        self.store().save(&state)?;
        self.record("proposal.deactivate", &target, serde_json::Value::Null)?;
        info!(slug = %target, primary = %state.primary, "proposal deactivated");
        Ok(DeactivateOutcome {
            slug: target,
            primary: state.primary().map(str::to_string),
        })
    }

    /// Read-only health check of one proposal. Never saves state.
    pub fn validate(&self, slug: &str) -> Result<ValidationReport, SpecdeckError> {
        self.require_proposal(slug)?;
        let (state, _) = self.load_reconciled()?;
        let mut report = ValidationReport {
            slug: slug.to_string(),
            ..ValidationReport::default()
        };

        if self.repo().read_document(slug, SPEC_DOC)?.is_none() {
            report.errors.push(format!("missing required document {SPEC_DOC}"));
        }
        for doc in [DESIGN_DOC, IMPL_DOC] {
            if self.repo().read_document(slug, doc)?.is_none() {
                report.warnings.push(format!("missing document {doc}"));
            }
        }

        let nodes = graph::build(self.repo(), &state)?;
        for dep in graph::missing_dependencies(&nodes, slug) {
            report.warnings.push(format!(
                "dependency {} is {}",
                dep,
                graph::dep_status(&nodes, &dep).as_str()
            ));
        }
        for cycle in graph::cycles_through(&graph::detect_cycles(&nodes), slug) {
            report
                .warnings
                .push(format!("dependency cycle: {}", cycle.join(" -> ")));
        }

        if let Some(stored) = state.hashes.get(slug) {
            let changed = integrity::verify(self.repo(), slug, stored)?;
            if !changed.is_empty() {
                report.warnings.push(format!(
                    "modified since activation: {}",
                    changed.join(", ")
                ));
            }
        }
        Ok(report)
    }

    /// Promote the spec to `specs/<slug>.md`, archive design/impl, delete the
    /// proposal, and clear it from state. No rollback on partial failure.
    pub fn complete(&self, slug: &str) -> Result<CompleteOutcome, SpecdeckError> {
        self.require_proposal(slug)?;
        let spec = self.repo().read_text(slug, SPEC_DOC)?.ok_or_else(|| {
            SpecdeckError::NotFound(format!("{SPEC_DOC} for proposal {slug}"))
        })?;
        if self.repo().read_completed(slug)?.is_some() {
            return Err(SpecdeckError::AlreadyExists(format!("completed spec {slug}")));
        }
        // State must be readable before the tree is touched.
        let (mut state, _) = self.load_reconciled()?;

        let mut archived = Vec::new();
        for doc in ARCHIVED_DOCS {
            if let Some(bytes) = self.repo().read_document(slug, doc)? {
                self.repo().write_archive(slug, doc, &bytes)?;
                archived.push(doc.to_string());
            }
        }
        self.repo().write_completed(slug, &spec)?;
        self.repo().delete_proposal(slug)?;

        state.forget(slug);
        self.store().save(&state)?;
        self.record(
            "proposal.complete",
            slug,
            serde_json::json!({ "archived": archived }),
        )?;
        info!(slug, archived = archived.len(), "proposal completed");

        let snapshot = self.snapshot_after_complete(slug);
        Ok(CompleteOutcome {
            slug: slug.to_string(),
            archived,
            snapshot,
        })
    }

    /// Commit the workspace if configured. Failures are logged, not returned.
    fn snapshot_after_complete(&self, slug: &str) -> Option<String> {
        if !self.config().git.snapshot_on_complete {
            return None;
        }
        let layout = self.layout()?;
        let project_root = layout.root.parent().unwrap_or(Path::new("."));
        let message = format!("{} complete {}", self.config().git.message_prefix, slug);
        match git::snapshot(project_root, &[layout.root.as_path()], &message) {
            Ok(SnapshotOutcome::Committed(head)) => Some(head),
            Ok(SnapshotOutcome::Skipped(reason)) => {
                info!(slug, reason, "git snapshot skipped");
                None
            }
            Err(e) => {
                warn!(slug, error = %e, "git snapshot failed; completion stands");
                None
            }
        }
    }

    /// Delete a proposal outright. Active proposals need `force`.
    pub fn remove(&self, slug: &str, force: bool) -> Result<(), SpecdeckError> {
        self.require_proposal(slug)?;
        let (mut state, _) = self.load_reconciled()?;
        if state.is_active(slug) && !force {
            return Err(SpecdeckError::ActiveProposal(slug.to_string()));
        }
        self.repo().delete_proposal(slug)?;
        state.forget(slug);
        self.store().save(&state)?;
        self.record("proposal.remove", slug, serde_json::json!({ "force": force }))?;
        info!(slug, force, "proposal removed");
        Ok(())
    }

    /// Read an active proposal (the primary when `slug` is `None`) behind the
    /// integrity gate. Confirming proceeds with modified files but does not
    /// refresh the stored hashes.
    pub fn context(&self, slug: Option<&str>, confirm: bool) -> Result<ContextOutcome, SpecdeckError> {
        let slug = slug.map(require_slug).transpose()?;
        let (state, _) = self.load_reconciled()?;
        let target = match slug {
            Some(s) => s.to_string(),
            None => state
                .primary()
                .map(str::to_string)
                .ok_or_else(|| SpecdeckError::NotFound("no active proposal".to_string()))?,
        };
        if !state.is_active(&target) {
            return Err(SpecdeckError::NotFound(format!("active proposal {target}")));
        }

        let empty = FileHashes::new();
        let stored = state.hashes.get(&target).unwrap_or(&empty);
        let changed = integrity::verify(self.repo(), &target, stored)?;
        if !changed.is_empty() && !confirm {
            warn!(slug = %target, changed = ?changed, "integrity check failed");
            return Ok(ContextOutcome::Modified {
                slug: target,
                changed,
            });
        }

        let mut documents = BTreeMap::new();
        for doc in TRACKED_DOCS {
            if let Some(text) = self.repo().read_text(&target, doc)? {
                documents.insert(doc.to_string(), text);
            }
        }
        let nodes = graph::build(self.repo(), &state)?;
        let dependencies = nodes
            .get(&target)
            .map(|n| {
                n.depends_on
                    .iter()
                    .map(|d| DependencyRef {
                        slug: d.clone(),
                        status: graph::dep_status(&nodes, d),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(ContextOutcome::Ready(ProposalContext {
            slug: target,
            documents,
            dependencies,
            modified: changed,
        }))
    }

    pub fn list_proposals(&self) -> Result<Vec<ProposalSummary>, SpecdeckError> {
        let (state, _) = self.load_reconciled()?;
        self.summaries(&state)
    }

    fn summaries(&self, state: &WorkspaceState) -> Result<Vec<ProposalSummary>, SpecdeckError> {
        let mut out = Vec::new();
        for slug in self.repo().list_proposals()? {
            let mut documents = Vec::new();
            let mut depends_on = Vec::new();
            for doc in TRACKED_DOCS {
                if let Some(bytes) = self.repo().read_document(&slug, doc)? {
                    if doc == SPEC_DOC {
                        depends_on = graph::parse_depends_on(&String::from_utf8_lossy(&bytes));
                    }
                    documents.push(doc.to_string());
                }
            }
            out.push(ProposalSummary {
                active: state.is_active(&slug),
                primary: state.primary == slug,
                slug,
                documents,
                depends_on,
            });
        }
        Ok(out)
    }

    /// Dependency graph, optionally narrowed to one slug's neighborhood.
    pub fn dependency_graph(&self, focus: Option<&str>) -> Result<GraphReport, SpecdeckError> {
        let (state, _) = self.load_reconciled()?;
        let all = graph::build(self.repo(), &state)?;
        let cycles = graph::detect_cycles(&all);
        let Some(focus) = focus else {
            return Ok(GraphReport { nodes: all, cycles });
        };
        let nodes = graph::relevant_subgraph(&all, focus);
        if nodes.is_empty() {
            return Err(SpecdeckError::NotFound(format!("graph node {focus}")));
        }
        let cycles = cycles
            .into_iter()
            .filter(|c| c.iter().all(|s| nodes.contains_key(s)))
            .collect();
        Ok(GraphReport { nodes, cycles })
    }

    /// Whole-workspace overview. Read-only: stale references are reported,
    /// not repaired.
    pub fn status(&self) -> Result<WorkspaceStatus, SpecdeckError> {
        let (state, stale) = self.load_reconciled()?;
        let nodes = graph::build(self.repo(), &state)?;
        let maintenance = self
            .list_maintenance()?
            .into_iter()
            .map(|item| MaintenanceSummary {
                due: item.due_count(),
                requirements: item.requirements.len(),
                slug: item.slug,
            })
            .collect();
        Ok(WorkspaceStatus {
            primary: state.primary().map(str::to_string),
            proposals: self.summaries(&state)?,
            completed: self.repo().list_completed()?,
            rules: self.repo().list_rules()?,
            maintenance,
            cycles: graph::detect_cycles(&nodes),
            stale,
        })
    }

    /// Persist the reconciled state. Returns the slugs that were dropped.
    pub fn repair(&self) -> Result<Vec<String>, SpecdeckError> {
        let (state, dropped) = self.load_reconciled()?;
        if !dropped.is_empty() {
            self.store().save(&state)?;
            self.record("state.repair", "", serde_json::json!({ "dropped": dropped }))?;
        }
        Ok(dropped)
    }
}
