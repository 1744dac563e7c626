//! specdeck: a local-first workspace engine for change proposals.
//!
//! A workspace is a `.specdeck/` directory holding proposals under
//! development, completed specs, archived design notes, and recurring
//! maintenance requirements. The engine keeps three things consistent:
//!
//! - **Activation**: which proposals are active and which one is primary,
//!   gated on every declared dependency being a completed spec.
//! - **Drift**: SHA-256 hashes captured at activation, checked before an
//!   active proposal's documents are handed out again.
//! - **Schedule**: when each maintenance requirement was last actioned and
//!   whether it is due.
//!
//! # Examples
//!
//! ```bash
//! specdeck init
//! specdeck new "Add auth"
//! specdeck activate add-auth
//! specdeck context
//! specdeck complete add-auth
//! specdeck maintenance due
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: the `Workspace` engine, persisted state, integrity, dependency
//!   graph, proposal lifecycle, and the RPC surface
//! - [`plugins`]: subsystems on top of the engine (maintenance scheduling)

pub mod core;
pub mod plugins;

mod cli;

use crate::core::error::SpecdeckError;
use crate::core::graph;
use crate::core::lifecycle::ContextOutcome;
use crate::core::time::command_envelope;
use crate::core::tui;
use crate::core::workspace::Workspace;
use chrono::{DateTime, Utc};
use clap::Parser;
use cli::{Cli, Command, Format, WorkspaceCommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit code when `validate` reports errors.
pub const EXIT_INVALID: u8 = 1;
/// Exit code when `context` refuses because documents drifted.
pub const EXIT_MODIFIED: u8 = 2;

fn open_workspace(root: Option<PathBuf>, current_dir: &Path) -> Result<Workspace, SpecdeckError> {
    match root {
        Some(root) if root.is_dir() => Workspace::open(root),
        Some(root) => Err(SpecdeckError::NotFound(format!(
            "workspace directory {}",
            root.display()
        ))),
        None => Workspace::discover(current_dir),
    }
}

/// Print `value` as a JSON envelope, or run `text` for human output.
fn emit(
    format: Format,
    at: DateTime<Utc>,
    cmd: &str,
    value: impl serde::Serialize,
    text: impl FnOnce(),
) -> Result<(), SpecdeckError> {
    match format {
        Format::Json => {
            let payload = serde_json::json!({ "result": serde_json::to_value(value)? });
            println!("{}", serde_json::to_string_pretty(&command_envelope(at, cmd, "ok", payload))?);
        }
        Format::Text => text(),
    }
    Ok(())
}

pub fn run() -> Result<ExitCode, SpecdeckError> {
    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;

    let command = match cli.command {
        Command::Init { dir } => {
            let project = dir.unwrap_or(current_dir);
            let ws = Workspace::init(&project)?;
            if let Some(layout) = ws.layout() {
                tui::render_box("SPECDECK", &layout.root.display().to_string(), tui::BoxStyle::Success);
            }
            return Ok(ExitCode::SUCCESS);
        }
        Command::Workspace(command) => command,
    };

    let mut ws = open_workspace(cli.root, &current_dir)?;

    match command {
        WorkspaceCommand::New { name, out } => {
            let slug = ws.create_proposal(&name)?;
            emit(out.format, ws.clock().now(), "new", serde_json::json!({ "slug": slug }), || {
                println!("Created proposal {slug}");
            })?;
        }
        WorkspaceCommand::Activate { slug, out } => {
            let outcome = ws.activate(&slug)?;
            emit(out.format, ws.clock().now(), "activate", &outcome, || {
                let verb = if outcome.refreshed { "Refreshed" } else { "Activated" };
                println!("{verb} {} ({} files tracked), now primary", outcome.slug, outcome.hashes.len());
            })?;
        }
        WorkspaceCommand::Deactivate { slug, out } => {
            let outcome = ws.deactivate(slug.as_deref())?;
            emit(out.format, ws.clock().now(), "deactivate", &outcome, || {
                match &outcome.primary {
                    Some(p) => println!("Deactivated {}; primary is now {p}", outcome.slug),
                    None => println!("Deactivated {}; no active proposals remain", outcome.slug),
                }
            })?;
        }
        WorkspaceCommand::Validate { slug, out } => {
            let report = ws.validate(&slug)?;
            emit(out.format, ws.clock().now(), "validate", &report, || tui::print_validation(&report))?;
            if !report.is_ok() {
                return Ok(ExitCode::from(EXIT_INVALID));
            }
        }
        WorkspaceCommand::Complete { slug, out } => {
            let outcome = ws.complete(&slug)?;
            emit(out.format, ws.clock().now(), "complete", &outcome, || {
                println!("Completed {} → specs/{}.md", outcome.slug, outcome.slug);
                if !outcome.archived.is_empty() {
                    println!("Archived {}", outcome.archived.join(", "));
                }
                if let Some(head) = &outcome.snapshot {
                    println!("Snapshot {head}");
                }
            })?;
        }
        WorkspaceCommand::Remove { slug, force, out } => {
            ws.remove(&slug, force)?;
            emit(out.format, ws.clock().now(), "remove", serde_json::json!({ "slug": slug }), || {
                println!("Removed {slug}");
            })?;
        }
        WorkspaceCommand::Context { slug, confirm, out } => {
            let outcome = ws.context(slug.as_deref(), confirm)?;
            let modified = matches!(outcome, ContextOutcome::Modified { .. });
            emit(out.format, ws.clock().now(), "context", &outcome, || match &outcome {
                ContextOutcome::Ready(ctx) => {
                    for (doc, text) in &ctx.documents {
                        println!("===== {doc} =====\n{text}");
                    }
                    for dep in &ctx.dependencies {
                        println!("depends on: {} ({})", dep.slug, dep.status.as_str());
                    }
                }
                ContextOutcome::Modified { slug, changed } => {
                    eprintln!(
                        "{slug} changed since activation: {}. Re-activate, or pass --confirm.",
                        changed.join(", ")
                    );
                }
            })?;
            if modified {
                return Ok(ExitCode::from(EXIT_MODIFIED));
            }
        }
        WorkspaceCommand::List { out } => {
            let proposals = ws.list_proposals()?;
            emit(out.format, ws.clock().now(), "list", &proposals, || tui::print_proposals(&proposals))?;
        }
        WorkspaceCommand::Status { out } => {
            let status = ws.status()?;
            emit(out.format, ws.clock().now(), "status", &status, || tui::print_status(&status))?;
        }
        WorkspaceCommand::Graph { slug, dot, out } => {
            let report = ws.dependency_graph(slug.as_deref())?;
            if dot {
                print!("{}", graph::render_dot(&report.nodes));
            } else {
                emit(out.format, ws.clock().now(), "graph", &report, || {
                    print!("{}", graph::render_tree(&report.nodes));
                    for c in &report.cycles {
                        println!("cycle: {}", c.join(" -> "));
                    }
                })?;
            }
        }
        WorkspaceCommand::Repair { out } => {
            let dropped = ws.repair()?;
            emit(out.format, ws.clock().now(), "repair", serde_json::json!({ "dropped": dropped }), || {
                if dropped.is_empty() {
                    println!("State is consistent");
                } else {
                    println!("Dropped stale references: {}", dropped.join(", "));
                }
            })?;
        }
        WorkspaceCommand::Maintenance(m) => crate::plugins::maintenance::run_maintenance_cli(&ws, m)?,
        WorkspaceCommand::Rpc => {
            let stdin = io::stdin();
            crate::core::rpc::serve(&mut ws, stdin.lock(), io::stdout().lock())?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
