//! Recurring maintenance requirements and their due schedule.
//!
//! Requirements are parsed fresh from `maintenance/<slug>.md` on every query;
//! only the last-actioned timestamps live in the state record.

use crate::core::error::SpecdeckError;
use crate::core::fields;
use crate::core::slug;
use crate::core::state::WorkspaceState;
use crate::core::time::{self, Clock};
use crate::core::workspace::Workspace;
use chrono::{DateTime, Duration, Months, Utc};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

pub const REQUIREMENTS_HEADING: &str = "Requirements";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 6] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Biweekly,
        Frequency::Monthly,
        Frequency::Quarterly,
        Frequency::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }

    /// `from + interval`, month-based intervals on the calendar (a month end
    /// clamps to the shorter month's last day). `None` only on overflow.
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Frequency::Daily => from.checked_add_signed(Duration::days(1)),
            Frequency::Weekly => from.checked_add_signed(Duration::days(7)),
            Frequency::Biweekly => from.checked_add_signed(Duration::days(14)),
            Frequency::Monthly => from.checked_add_months(Months::new(1)),
            Frequency::Quarterly => from.checked_add_months(Months::new(3)),
            Frequency::Yearly => from.checked_add_months(Months::new(12)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown frequency {:?}", s.trim()))
    }
}

/// One requirement as declared in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementDecl {
    pub id: String,
    pub text: String,
    pub freq: Option<Frequency>,
    pub line: usize,
}

/// A requirement annotated against the state record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub id: String,
    pub text: String,
    pub freq: Option<Frequency>,
    pub due: bool,
    pub last_actioned: Option<String>,
    pub next_due: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenanceItem {
    pub slug: String,
    pub title: Option<String>,
    pub requirements: Vec<Requirement>,
}

impl MaintenanceItem {
    pub fn due_count(&self) -> usize {
        self.requirements.iter().filter(|r| r.due).count()
    }
}

/// Parse the requirement list of one maintenance document. All-or-nothing:
/// the first problem discards the whole parse.
pub fn parse_requirements(doc: &str, what: &str) -> Result<Vec<RequirementDecl>, SpecdeckError> {
    let Some(lines) = fields::section(doc, REQUIREMENTS_HEADING) else {
        return Ok(Vec::new());
    };
    let malformed = |line: usize, reason: String| SpecdeckError::Malformed {
        what: what.to_string(),
        line: Some(line),
        reason,
    };

    let mut out = Vec::new();
    let mut first_seen: BTreeMap<String, usize> = BTreeMap::new();
    for (line_no, line) in lines {
        if !fields::is_bullet(line) {
            continue;
        }
        let tokens = fields::tokenize_line(line);
        let id = match tokens.get("id") {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                return Err(malformed(
                    line_no,
                    format!("missing [id=...] in {:?}", line.trim()),
                ));
            }
        };
        let freq = match tokens.get("freq") {
            Some(raw) => Some(raw.parse::<Frequency>().map_err(|e| malformed(line_no, e))?),
            None => None,
        };
        if let Some(first) = first_seen.get(&id) {
            return Err(malformed(
                line_no,
                format!("duplicate id {:?} (first on line {}, again on line {})", id, first, line_no),
            ));
        }
        first_seen.insert(id.clone(), line_no);
        out.push(RequirementDecl {
            id,
            text: tokens.text,
            freq,
            line: line_no,
        });
    }
    debug!(what, count = out.len(), "parsed maintenance requirements");
    Ok(out)
}

/// Due if there is no frequency, it was never actioned, the timestamp is
/// unreadable, or a full interval has elapsed (`now == next_due` is due).
pub fn is_due(freq: Option<Frequency>, last_actioned: Option<&str>, now: DateTime<Utc>) -> bool {
    let (Some(freq), Some(last)) = (freq, last_actioned) else {
        return true;
    };
    let Some(last) = time::parse_ts(last) else {
        return true;
    };
    match freq.next_after(last) {
        Some(next) => now >= next,
        None => true,
    }
}

fn next_due(freq: Option<Frequency>, last_actioned: Option<&str>) -> Option<DateTime<Utc>> {
    let last = time::parse_ts(last_actioned?)?;
    freq?.next_after(last)
}

fn first_heading(doc: &str) -> Option<String> {
    doc.lines()
        .find_map(|l| l.strip_prefix("# "))
        .map(|t| t.trim().to_string())
}

pub fn annotate(
    slug: &str,
    doc: &str,
    state: &WorkspaceState,
    now: DateTime<Utc>,
) -> Result<MaintenanceItem, SpecdeckError> {
    let decls = parse_requirements(doc, &format!("maintenance/{slug}.md"))?;
    let requirements = decls
        .into_iter()
        .map(|d| {
            let last = state.last_actioned(slug, &d.id);
            Requirement {
                due: is_due(d.freq, last, now),
                next_due: next_due(d.freq, last).map(time::format_ts),
                last_actioned: last.map(str::to_string),
                id: d.id,
                text: d.text,
                freq: d.freq,
            }
        })
        .collect();
    Ok(MaintenanceItem {
        slug: slug.to_string(),
        title: first_heading(doc),
        requirements,
    })
}

impl Workspace {
    pub fn maintenance_item(&self, slug: &str) -> Result<MaintenanceItem, SpecdeckError> {
        slug::require_slug(slug)?;
        let doc = self
            .repo()
            .read_maintenance(slug)?
            .ok_or_else(|| SpecdeckError::NotFound(format!("maintenance item {slug}")))?;
        let state = self.store().load()?;
        annotate(slug, &doc, &state, self.clock().now())
    }

    /// Every maintenance item, sorted by slug. One malformed document fails
    /// the whole listing.
    pub fn list_maintenance(&self) -> Result<Vec<MaintenanceItem>, SpecdeckError> {
        let state = self.store().load()?;
        let now = self.clock().now();
        let mut items = Vec::new();
        for slug in self.repo().list_maintenance()? {
            if let Some(doc) = self.repo().read_maintenance(&slug)? {
                items.push(annotate(&slug, &doc, &state, now)?);
            }
        }
        Ok(items)
    }

    /// Items reduced to their due requirements; items with none are dropped.
    pub fn due_maintenance(&self) -> Result<Vec<MaintenanceItem>, SpecdeckError> {
        Ok(self
            .list_maintenance()?
            .into_iter()
            .filter_map(|mut item| {
                item.requirements.retain(|r| r.due);
                (!item.requirements.is_empty()).then_some(item)
            })
            .collect())
    }

    /// Record `now` as the last-actioned time of `slug`/`id`.
    pub fn mark_actioned(&self, slug: &str, id: &str) -> Result<String, SpecdeckError> {
        slug::require_slug(slug)?;
        let doc = self
            .repo()
            .read_maintenance(slug)?
            .ok_or_else(|| SpecdeckError::NotFound(format!("maintenance item {slug}")))?;
        let decls = parse_requirements(&doc, &format!("maintenance/{slug}.md"))?;
        if !decls.iter().any(|d| d.id == id) {
            return Err(SpecdeckError::NotFound(format!("requirement {id} in {slug}")));
        }

        let now = self.clock().now();
        let ts = time::format_ts(now);
        let mut state = self.store().load()?;
        state.set_actioned(slug, id, ts.clone());
        self.store().save(&state)?;
        self.journal().record(
            now,
            "maintenance.actioned",
            slug,
            serde_json::json!({ "id": id }),
        )?;
        info!(item = slug, requirement = id, at = %ts, "requirement actioned");
        Ok(ts)
    }
}

#[derive(Parser, Debug)]
#[clap(name = "maintenance", about = "Recurring maintenance requirements and their schedule.")]
pub struct MaintenanceCli {
    #[clap(subcommand)]
    pub command: MaintenanceCommand,
}

#[derive(Subcommand, Debug)]
pub enum MaintenanceCommand {
    /// List maintenance items and every requirement's due status.
    List {
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Show only requirements that are currently due.
    Due {
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Record that a requirement was actioned now.
    Done {
        /// Maintenance item slug.
        slug: String,
        /// Requirement id.
        id: String,
    },
    /// Scaffold a new maintenance document.
    New {
        /// Human-readable item name.
        name: String,
    },
}

fn print_items(items: &[MaintenanceItem], format: &str) -> Result<(), SpecdeckError> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("No maintenance requirements found.");
        return Ok(());
    }
    for item in items {
        crate::core::tui::print_maintenance_item(item);
    }
    Ok(())
}

pub fn run_maintenance_cli(ws: &Workspace, cli: MaintenanceCli) -> Result<(), SpecdeckError> {
    match cli.command {
        MaintenanceCommand::List { format } => print_items(&ws.list_maintenance()?, &format),
        MaintenanceCommand::Due { format } => print_items(&ws.due_maintenance()?, &format),
        MaintenanceCommand::Done { slug, id } => {
            let ts = ws.mark_actioned(&slug, &id)?;
            println!(
                "{}",
                time::command_envelope(
                    ws.clock().now(),
                    "maintenance.done",
                    "ok",
                    serde_json::json!({ "slug": slug, "id": id, "actioned_at": ts })
                )
            );
            Ok(())
        }
        MaintenanceCommand::New { name } => {
            let slug = ws.create_maintenance_item(&name)?;
            println!("Created maintenance/{slug}.md");
            Ok(())
        }
    }
}
