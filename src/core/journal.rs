//! Append-only audit log of state mutations (`events.jsonl`).

use crate::core::error::SpecdeckError;
use crate::core::time::{format_ts, new_event_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JournalEvent {
    pub ts: String,
    pub event_id: String,
    pub op: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub detail: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct Journal {
    path: Option<PathBuf>,
}

impl Journal {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A journal that records nothing.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn record(
        &self,
        at: DateTime<Utc>,
        op: &str,
        subject: &str,
        detail: serde_json::Value,
    ) -> Result<(), SpecdeckError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let ev = JournalEvent {
            ts: format_ts(at),
            event_id: new_event_id(),
            op: op.to_string(),
            subject: subject.to_string(),
            detail,
        };
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(SpecdeckError::io("open journal", path))?;
        writeln!(f, "{}", serde_json::to_string(&ev)?)
            .map_err(SpecdeckError::io("append journal", path))?;
        Ok(())
    }

    /// All recorded events, oldest first. Missing file → empty.
    pub fn read_all(&self) -> Result<Vec<JournalEvent>, SpecdeckError> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path).map_err(SpecdeckError::io("read journal", path))?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| SpecdeckError::Malformed {
                    what: path.display().to_string(),
                    line: Some(i + 1),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}
