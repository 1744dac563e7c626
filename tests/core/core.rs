use chrono::{TimeZone, Utc};
use specdeck::core::error::SpecdeckError;
use specdeck::core::lifecycle::ContextOutcome;
use specdeck::core::state::StateStore;
use specdeck::core::time::FixedClock;
use specdeck::core::workspace::Workspace;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2026, 4, 1, 9, 30, 0).unwrap())
}

fn write_spec(root: &Path, slug: &str, depends_on: &str) {
    let dir = root.join("proposals").join(slug);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("spec.md"),
        format!("# {slug}\n\n**Depends on**: {depends_on}\n"),
    )
    .unwrap();
}

#[test]
fn full_lifecycle_on_disk() {
    let tmp = tempdir().unwrap();
    let ws = Workspace::init(tmp.path()).unwrap().with_clock(clock());
    let root = ws.layout().unwrap().root.clone();

    let slug = ws.create_proposal("Add Auth").unwrap();
    assert_eq!(slug, "add-auth");
    let spec = fs::read_to_string(root.join("proposals/add-auth/spec.md")).unwrap();
    assert!(spec.starts_with("# Add Auth"));
    assert!(spec.contains("2026-04-01"));

    ws.activate(&slug).unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(root.join("state.json")).unwrap()).unwrap();
    assert_eq!(raw["active"], serde_json::json!(["add-auth"]));
    assert_eq!(raw["primary"], "add-auth");
    assert_eq!(raw["hashes"]["add-auth"].as_object().unwrap().len(), 3);
    assert!(raw["maintenanceState"].is_object());

    let outcome = ws.complete(&slug).unwrap();
    assert_eq!(outcome.archived, vec!["design.md", "impl.md"]);
    assert_eq!(outcome.snapshot, None);
    assert!(root.join("specs/add-auth.md").is_file());
    assert!(root.join("archive/add-auth/design.md").is_file());
    assert!(root.join("archive/add-auth/impl.md").is_file());
    assert!(!root.join("proposals/add-auth").exists());

    let state = ws.store().load().unwrap();
    assert!(state.active.is_empty());
    assert_eq!(state.primary, "");

    let ops: Vec<String> = ws
        .journal()
        .read_all()
        .unwrap()
        .into_iter()
        .map(|e| e.op)
        .collect();
    assert_eq!(
        ops,
        vec!["proposal.create", "proposal.activate", "proposal.complete"]
    );
}

#[test]
fn dependency_gate_opens_after_completion() {
    let tmp = tempdir().unwrap();
    let ws = Workspace::init(tmp.path()).unwrap();
    let root = ws.layout().unwrap().root.clone();
    write_spec(&root, "db", "none");
    write_spec(&root, "auth", "db <!-- needs the schema -->");

    match ws.activate("auth") {
        Err(SpecdeckError::DependencyUnmet { slug, missing }) => {
            assert_eq!(slug, "auth");
            assert_eq!(missing, vec!["db"]);
        }
        other => panic!("expected DependencyUnmet, got {other:?}"),
    }
    assert!(!root.join("state.json").exists());

    ws.complete("db").unwrap();
    ws.activate("auth").unwrap();
}

#[test]
fn edited_document_trips_the_integrity_gate() {
    let tmp = tempdir().unwrap();
    let ws = Workspace::init(tmp.path()).unwrap();
    let root = ws.layout().unwrap().root.clone();
    write_spec(&root, "x", "none");
    ws.activate("x").unwrap();

    fs::write(root.join("proposals/x/spec.md"), "# x\n\nrewritten\n").unwrap();
    match ws.context(None, false).unwrap() {
        ContextOutcome::Modified { slug, changed } => {
            assert_eq!(slug, "x");
            assert_eq!(changed, vec!["spec.md"]);
        }
        other => panic!("expected Modified, got {other:?}"),
    }

    let report = ws.validate("x").unwrap();
    assert!(report.warnings.iter().any(|w| w.contains("modified since activation")));
}

#[test]
fn deleted_proposal_is_reconciled_out_of_state() {
    let tmp = tempdir().unwrap();
    let ws = Workspace::init(tmp.path()).unwrap();
    let root = ws.layout().unwrap().root.clone();
    write_spec(&root, "a", "none");
    write_spec(&root, "b", "none");
    ws.activate("a").unwrap();
    ws.activate("b").unwrap();

    fs::remove_dir_all(root.join("proposals/b")).unwrap();
    assert_eq!(ws.status().unwrap().stale, vec!["b"]);

    // The next mutation persists the repaired state.
    ws.deactivate(Some("a")).unwrap();
    let state = ws.store().load().unwrap();
    assert!(state.active.is_empty());
    assert!(state.hashes.is_empty());
}

#[test]
fn malformed_state_file_is_reported_with_line() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("state.json");
    fs::write(&path, "{\n  \"active\": [\n").unwrap();
    match StateStore::at(&path).load() {
        Err(SpecdeckError::Malformed { line, .. }) => assert!(line.is_some()),
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn cycle_blocking_follows_config() {
    let tmp = tempdir().unwrap();
    let ws = Workspace::init(tmp.path()).unwrap();
    let root = ws.layout().unwrap().root.clone();
    write_spec(&root, "a", "b");
    write_spec(&root, "b", "a");
    assert_eq!(ws.activate("a").unwrap_err().kind(), "cyclic_dependency");

    fs::write(root.join("config.toml"), "[lifecycle]\nblock_cycles = false\n").unwrap();
    let ws = Workspace::open(&root).unwrap();
    // Advisory now; the unmet dependency still blocks.
    assert_eq!(ws.activate("a").unwrap_err().kind(), "dependency_unmet");

    let report = ws.dependency_graph(None).unwrap();
    assert_eq!(report.cycles, vec![vec!["a", "b", "a"]]);
}

#[test]
fn path_like_slugs_never_reach_the_tree() {
    let tmp = tempdir().unwrap();
    let ws = Workspace::init(tmp.path()).unwrap().with_clock(clock());
    let root = ws.layout().unwrap().root.clone();
    write_spec(&root, "keep-me", "none");
    fs::write(root.join("specs/done.md"), "# done\n").unwrap();

    for bad in ["", ".", "..", "a/b", "../specs/done"] {
        assert_eq!(ws.remove(bad, true).unwrap_err().kind(), "invalid_slug", "{bad:?}");
        assert_eq!(ws.activate(bad).unwrap_err().kind(), "invalid_slug", "{bad:?}");
        assert_eq!(ws.complete(bad).unwrap_err().kind(), "invalid_slug", "{bad:?}");
    }
    assert!(root.join("proposals/keep-me/spec.md").is_file());
    assert!(root.join("specs/done.md").is_file());
    assert!(!root.join("state.json").exists());
}

#[test]
fn unreadable_state_leaves_completion_untouched() {
    let tmp = tempdir().unwrap();
    let ws = Workspace::init(tmp.path()).unwrap().with_clock(clock());
    let root = ws.layout().unwrap().root.clone();
    write_spec(&root, "x", "none");
    fs::write(root.join("proposals/x/impl.md"), "notes\n").unwrap();
    fs::write(root.join("state.json"), "{ not json").unwrap();

    assert_eq!(ws.complete("x").unwrap_err().kind(), "malformed");
    assert!(root.join("proposals/x/spec.md").is_file());
    assert!(root.join("proposals/x/impl.md").is_file());
    assert!(!root.join("specs/x.md").exists());
    assert!(!root.join("archive/x").exists());
}
