//! The engine value every operation runs against.
//!
//! A `Workspace` bundles the document repository, the state store, the
//! clock, configuration, and the audit journal for one workspace root.
//! Nothing is global, so several workspaces can live in one process.

use crate::core::config::{self, Config};
use crate::core::error::SpecdeckError;
use crate::core::journal::Journal;
use crate::core::layout::{self, Layout};
use crate::core::repo::{FsRepository, Repository};
use crate::core::state::StateStore;
use crate::core::templates::{EmbeddedTemplates, TemplateRenderer};
use crate::core::time::{Clock, SystemClock};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct Workspace {
    repo: Box<dyn Repository>,
    store: StateStore,
    clock: Box<dyn Clock>,
    templates: Box<dyn TemplateRenderer>,
    config: Config,
    journal: Journal,
    layout: Option<Layout>,
}

impl Workspace {
    /// Open the on-disk workspace rooted at `root` (the `.specdeck` dir).
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SpecdeckError> {
        let layout = Layout::new(root);
        let config = config::load_config(&layout.root)?;
        Ok(Self {
            repo: Box::new(FsRepository::new(layout.clone())),
            store: StateStore::at(layout.state_path()),
            clock: Box::new(SystemClock),
            templates: Box::new(EmbeddedTemplates),
            config,
            journal: Journal::at(layout.journal_path()),
            layout: Some(layout),
        })
    }

    /// Find the nearest workspace above `start_dir` and open it.
    pub fn discover(start_dir: &Path) -> Result<Self, SpecdeckError> {
        Self::open(layout::find_workspace_root(start_dir)?)
    }

    /// Create the directory layout and a default config under
    /// `<project_dir>/.specdeck`, then open it. Existing files are kept.
    pub fn init(project_dir: &Path) -> Result<Self, SpecdeckError> {
        let root = project_dir.join(layout::WORKSPACE_DIR_NAME);
        let layout = Layout::new(&root);
        layout.ensure_dirs()?;
        let config_path = root.join(config::CONFIG_FILE_NAME);
        if !config_path.exists() {
            std::fs::write(&config_path, config::default_config_toml())
                .map_err(SpecdeckError::io("write config", &config_path))?;
        }
        info!(root = %root.display(), "workspace initialized");
        Self::open(root)
    }

    /// Fully in-memory workspace over the given repository.
    pub fn in_memory(repo: impl Repository + 'static) -> Self {
        Self {
            repo: Box::new(repo),
            store: StateStore::in_memory(),
            clock: Box::new(SystemClock),
            templates: Box::new(EmbeddedTemplates),
            config: Config::default(),
            journal: Journal::disabled(),
            layout: None,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Swap the clock in place, returning the previous one.
    pub fn replace_clock(&mut self, clock: Box<dyn Clock>) -> Box<dyn Clock> {
        std::mem::replace(&mut self.clock, clock)
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_templates(mut self, templates: impl TemplateRenderer + 'static) -> Self {
        self.templates = Box::new(templates);
        self
    }

    pub fn repo(&self) -> &dyn Repository {
        self.repo.as_ref()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn templates(&self) -> &dyn TemplateRenderer {
        self.templates.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// On-disk layout; `None` for in-memory workspaces.
    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }
}
