use chrono::{DateTime, Duration, TimeZone, Utc};
use specdeck::core::error::SpecdeckError;
use specdeck::core::time::FixedClock;
use specdeck::core::workspace::Workspace;
use specdeck::plugins::maintenance::Frequency;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const SECURITY: &str = "# Security hygiene\n\n\
## Requirements\n\n\
- Run dependency scan [id=scan] [freq=weekly]\n\
- [freq=monthly] Rotate deploy keys [id=rotate]\n\n\
## Notes\n\n\
- Not a requirement [freq=daily]\n";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap()
}

fn setup() -> (tempfile::TempDir, PathBuf) {
    let tmp = tempdir().unwrap();
    let ws = Workspace::init(tmp.path()).unwrap();
    let root = ws.layout().unwrap().root.clone();
    fs::write(root.join("maintenance/security.md"), SECURITY).unwrap();
    (tmp, root)
}

fn at(root: &Path, now: DateTime<Utc>) -> Workspace {
    Workspace::open(root).unwrap().with_clock(FixedClock(now))
}

fn due_ids(ws: &Workspace) -> Vec<String> {
    ws.due_maintenance()
        .unwrap()
        .into_iter()
        .flat_map(|item| item.requirements.into_iter().map(|r| r.id))
        .collect()
}

#[test]
fn weekly_requirement_comes_due_exactly_seven_days_later() {
    let (_tmp, root) = setup();
    let ws = at(&root, t0());
    assert_eq!(due_ids(&ws), vec!["scan", "rotate"]);

    let ts = ws.mark_actioned("security", "scan").unwrap();
    assert_eq!(ts, "2026-01-05T08:00:00Z");
    assert_eq!(due_ids(&ws), vec!["rotate"]);

    let early = at(&root, t0() + Duration::days(7) - Duration::seconds(1));
    assert_eq!(due_ids(&early), vec!["rotate"]);

    let on_time = at(&root, t0() + Duration::days(7));
    assert_eq!(due_ids(&on_time), vec!["scan", "rotate"]);
}

#[test]
fn listing_annotates_schedule() {
    let (_tmp, root) = setup();
    at(&root, t0()).mark_actioned("security", "rotate").unwrap();

    let items = at(&root, t0() + Duration::days(1)).list_maintenance().unwrap();
    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.title.as_deref(), Some("Security hygiene"));
    assert_eq!(item.due_count(), 1);

    let rotate = &item.requirements[1];
    assert_eq!(rotate.text, "Rotate deploy keys");
    assert_eq!(rotate.freq, Some(Frequency::Monthly));
    assert!(!rotate.due);
    assert_eq!(rotate.last_actioned.as_deref(), Some("2026-01-05T08:00:00Z"));
    assert_eq!(rotate.next_due.as_deref(), Some("2026-02-05T08:00:00Z"));
}

#[test]
fn actioned_timestamps_persist_under_camel_case_key() {
    let (_tmp, root) = setup();
    at(&root, t0()).mark_actioned("security", "scan").unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(root.join("state.json")).unwrap()).unwrap();
    assert_eq!(
        raw["maintenanceState"]["security"]["scan"],
        "2026-01-05T08:00:00Z"
    );
}

#[test]
fn unknown_item_or_requirement_is_not_found() {
    let (_tmp, root) = setup();
    let ws = at(&root, t0());
    assert_eq!(ws.mark_actioned("ghost", "scan").unwrap_err().kind(), "not_found");
    assert_eq!(ws.mark_actioned("security", "ghost").unwrap_err().kind(), "not_found");
    assert!(!root.join("state.json").exists());
}

#[test]
fn duplicate_ids_fail_the_whole_listing() {
    let (_tmp, root) = setup();
    fs::write(
        root.join("maintenance/ops.md"),
        "# Ops\n## Requirements\n- Backup [id=backup]\n- Restore drill [id=backup] [freq=yearly]\n",
    )
    .unwrap();
    match at(&root, t0()).list_maintenance() {
        Err(SpecdeckError::Malformed { line, reason, .. }) => {
            assert_eq!(line, Some(4));
            assert!(reason.contains("line 3"), "{reason}");
        }
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn scaffolded_item_is_immediately_due() {
    let (_tmp, root) = setup();
    let ws = at(&root, t0());
    let slug = ws.create_maintenance_item("Weekly review").unwrap();
    assert_eq!(slug, "weekly-review");
    assert!(root.join("maintenance/weekly-review.md").is_file());
    let item = ws.maintenance_item(&slug).unwrap();
    assert_eq!(item.due_count(), item.requirements.len());
    assert_eq!(
        ws.create_maintenance_item("weekly review").unwrap_err().kind(),
        "already_exists"
    );
}

#[test]
fn sub_second_marks_keep_the_weekly_boundary_exact() {
    let (_tmp, root) = setup();
    let marked = t0() + Duration::milliseconds(900);
    let ts = at(&root, marked).mark_actioned("security", "scan").unwrap();
    assert_eq!(ts, "2026-01-05T08:00:00.900Z");

    let week = t0() + Duration::days(7);
    assert_eq!(due_ids(&at(&root, week)), vec!["rotate"]);
    assert_eq!(
        due_ids(&at(&root, week + Duration::milliseconds(900))),
        vec!["scan", "rotate"]
    );
}

#[test]
fn path_like_item_slugs_are_rejected() {
    let (_tmp, root) = setup();
    let ws = at(&root, t0());
    for bad in ["..", "../specs/x", "a/b", ""] {
        assert_eq!(ws.mark_actioned(bad, "scan").unwrap_err().kind(), "invalid_slug");
        assert_eq!(ws.maintenance_item(bad).unwrap_err().kind(), "invalid_slug");
    }
    assert!(!root.join("state.json").exists());
}
