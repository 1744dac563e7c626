//! Shared clock and timestamp helpers.
//!
//! Engine code never calls `Utc::now()` directly; it asks the injected
//! [`Clock`] so scheduling can be tested at exact boundary instants.

use chrono::{DateTime, SecondsFormat, Utc};
use ulid::Ulid;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant. Used by tests and by RPC callers that
/// pass an explicit `now`.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// RFC 3339 with a `Z` suffix. Whole seconds print bare
/// (`2026-03-01T09:30:00Z`); sub-second instants keep their fraction so a
/// stored timestamp never reads earlier than the instant it records.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Lenient RFC 3339 parse; any offset is normalized to UTC.
pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Envelope wrapped around every `--format json` command result.
pub fn command_envelope(
    at: DateTime<Utc>,
    cmd: &str,
    status: &str,
    extra: serde_json::Value,
) -> serde_json::Value {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": format_ts(at),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
