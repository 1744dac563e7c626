//! Human-facing terminal rendering. JSON output never goes through here.

use crate::core::lifecycle::{ProposalSummary, ValidationReport, WorkspaceStatus};
use crate::plugins::maintenance::MaintenanceItem;
use colored::Colorize;
use std::env;

const MIN_BOX_WIDTH: usize = 40;
const MAX_BOX_WIDTH: usize = 60;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoxStyle {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ItemStatus {
    Active,
    Idle,
    Due,
    Ok,
    Warn,
    Fail,
}

impl ItemStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            ItemStatus::Active => "▶",
            ItemStatus::Idle => "·",
            ItemStatus::Due => "⏰",
            ItemStatus::Ok => "✅",
            ItemStatus::Warn => "⚠️",
            ItemStatus::Fail => "❌",
        }
    }
}

pub fn terminal_width() -> usize {
    env::var("COLUMNS")
        .ok()
        .and_then(|c| c.parse().ok())
        .unwrap_or(80)
}

fn box_width() -> usize {
    terminal_width().clamp(MIN_BOX_WIDTH, MAX_BOX_WIDTH)
}

/// Centered single-line content between `left` and `right` borders.
pub fn box_row(left: &str, content: &str, right: &str, width: usize) -> String {
    let padding = width.saturating_sub(2).saturating_sub(content.chars().count());
    let left_pad = padding / 2;
    format!(
        "{left}{}{content}{}{right}",
        " ".repeat(left_pad),
        " ".repeat(padding - left_pad)
    )
}

pub fn render_box(title: &str, subtitle: &str, style: BoxStyle) {
    let w = box_width();
    let lines = [
        format!("╔{}╗", "═".repeat(w - 2)),
        box_row("║", title, "║", w),
        box_row("║", subtitle, "║", w),
        format!("╚{}╝", "═".repeat(w - 2)),
    ];
    for (i, line) in lines.iter().enumerate() {
        if i == 2 && subtitle.is_empty() {
            continue;
        }
        let painted = match style {
            BoxStyle::Info => line.bright_cyan(),
            BoxStyle::Success => line.bright_green(),
            BoxStyle::Warning => line.bright_yellow(),
            BoxStyle::Error => line.bright_red(),
        };
        println!("{}", if i == 1 { painted.bold() } else { painted });
    }
}

pub fn print_section(title: &str) {
    println!();
    println!("  {}", title.bold());
}

pub fn print_item(item: &str, status: ItemStatus) {
    let icon = status.icon();
    let icon = match status {
        ItemStatus::Active | ItemStatus::Ok => icon.bright_green(),
        ItemStatus::Due | ItemStatus::Warn => icon.bright_yellow(),
        ItemStatus::Idle => icon.bright_black(),
        ItemStatus::Fail => icon.bright_red(),
    };
    println!("    {} {}", icon, item.bright_white());
}

fn proposal_line(p: &ProposalSummary) -> String {
    let mut line = p.slug.clone();
    if p.primary {
        line.push_str(" (primary)");
    }
    if !p.depends_on.is_empty() {
        line.push_str(&format!("  ← {}", p.depends_on.join(", ")));
    }
    line
}

pub fn print_proposals(proposals: &[ProposalSummary]) {
    if proposals.is_empty() {
        println!("No proposals. Create one with `specdeck new <name>`.");
        return;
    }
    print_section("Proposals");
    for p in proposals {
        let status = if p.active { ItemStatus::Active } else { ItemStatus::Idle };
        print_item(&proposal_line(p), status);
    }
}

pub fn print_status(status: &WorkspaceStatus) {
    let subtitle = match &status.primary {
        Some(p) => format!("primary: {p}"),
        None => "no active proposal".to_string(),
    };
    render_box("SPECDECK", &subtitle, BoxStyle::Info);

    print_proposals(&status.proposals);

    print_section(&format!("Completed specs ({})", status.completed.len()));
    for slug in &status.completed {
        print_item(slug, ItemStatus::Ok);
    }
    if !status.rules.is_empty() {
        print_section(&format!("Rules ({})", status.rules.len()));
        for slug in &status.rules {
            print_item(slug, ItemStatus::Idle);
        }
    }
    if !status.maintenance.is_empty() {
        print_section("Maintenance");
        for m in &status.maintenance {
            let s = if m.due > 0 { ItemStatus::Due } else { ItemStatus::Ok };
            print_item(&format!("{}: {}/{} due", m.slug, m.due, m.requirements), s);
        }
    }
    if !status.cycles.is_empty() {
        print_section("Dependency cycles");
        for c in &status.cycles {
            print_item(&c.join(" -> "), ItemStatus::Warn);
        }
    }
    if !status.stale.is_empty() {
        print_section("Stale state references (run `specdeck repair`)");
        for s in &status.stale {
            print_item(s, ItemStatus::Warn);
        }
    }
}

pub fn print_validation(report: &ValidationReport) {
    if report.is_ok() {
        render_box(&format!("{} is valid", report.slug), "", BoxStyle::Success);
    } else {
        render_box(&format!("{} is invalid", report.slug), "", BoxStyle::Error);
    }
    for e in &report.errors {
        print_item(e, ItemStatus::Fail);
    }
    for w in &report.warnings {
        print_item(w, ItemStatus::Warn);
    }
}

pub fn print_maintenance_item(item: &MaintenanceItem) {
    let title = item.title.as_deref().unwrap_or(&item.slug);
    print_section(&format!("{} [{}]", title, item.slug));
    for r in &item.requirements {
        let freq = r.freq.map(|f| f.as_str()).unwrap_or("unscheduled");
        let when = match (&r.last_actioned, &r.next_due) {
            (_, Some(next)) if !r.due => format!("next {next}"),
            (Some(last), _) => format!("last {last}"),
            (None, _) => "never actioned".to_string(),
        };
        let status = if r.due { ItemStatus::Due } else { ItemStatus::Ok };
        print_item(&format!("{} ({}, {}) {}", r.id, freq, when, r.text), status);
    }
}
