//! CLI struct definitions for the specdeck command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use crate::plugins::maintenance::MaintenanceCli;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "specdeck",
    version = env!("CARGO_PKG_VERSION"),
    about = "Local-first workspace engine for change proposals, completed specs, and recurring maintenance."
)]
pub(crate) struct Cli {
    /// Workspace directory (the `.specdeck` dir). Discovered from the
    /// current directory when omitted.
    #[clap(long, global = true)]
    pub root: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Format {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args, Debug)]
pub(crate) struct FormatArg {
    /// Output format.
    #[clap(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create `.specdeck/` with its directory layout and a default config.
    Init {
        /// Project directory (default: current directory).
        dir: Option<PathBuf>,
    },
    #[clap(flatten)]
    Workspace(WorkspaceCommand),
}

/// Commands that run against an existing workspace.
#[derive(Subcommand, Debug)]
pub(crate) enum WorkspaceCommand {
    /// Scaffold a new proposal from templates.
    New {
        /// Human-readable proposal name; the slug is derived from it.
        name: String,
        #[clap(flatten)]
        out: FormatArg,
    },
    /// Activate a proposal and make it primary.
    Activate {
        slug: String,
        #[clap(flatten)]
        out: FormatArg,
    },
    /// Deactivate a proposal (the primary when no slug is given).
    Deactivate {
        slug: Option<String>,
        #[clap(flatten)]
        out: FormatArg,
    },
    /// Check a proposal's documents and dependencies. Read-only.
    Validate {
        slug: String,
        #[clap(flatten)]
        out: FormatArg,
    },
    /// Promote a proposal's spec to a completed spec and archive the rest.
    Complete {
        slug: String,
        #[clap(flatten)]
        out: FormatArg,
    },
    /// Delete a proposal.
    Remove {
        slug: String,
        /// Remove even if the proposal is active.
        #[clap(long)]
        force: bool,
        #[clap(flatten)]
        out: FormatArg,
    },
    /// Print an active proposal's documents, refusing if they drifted.
    Context {
        slug: Option<String>,
        /// Proceed even though documents changed since activation.
        #[clap(long)]
        confirm: bool,
        #[clap(flatten)]
        out: FormatArg,
    },
    /// List proposals.
    List {
        #[clap(flatten)]
        out: FormatArg,
    },
    /// Workspace overview.
    Status {
        #[clap(flatten)]
        out: FormatArg,
    },
    /// Show the dependency graph, or one slug's neighborhood.
    Graph {
        slug: Option<String>,
        /// Emit Graphviz DOT.
        #[clap(long, conflicts_with = "format")]
        dot: bool,
        #[clap(flatten)]
        out: FormatArg,
    },
    /// Drop state references to proposals that no longer exist.
    Repair {
        #[clap(flatten)]
        out: FormatArg,
    },
    /// Recurring maintenance requirements.
    Maintenance(MaintenanceCli),
    /// Serve line-delimited JSON requests on stdin.
    Rpc,
}
