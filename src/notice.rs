//! Purpose: Define a stable, structured schema for non-fatal stderr notices.
//! Exports: `Notice`, `notice_json`, `sync_notice`.
//! Role: Shared contract helper for CLI diagnostics (overwrite/skip during sync).
//! Invariants: Notices are non-fatal and never alter stdout payloads.
//! Invariants: JSON schema is additive-only once published.
use serde_json::{Map, Value, json};

use crate::core::sync::{SyncEvent, SyncEventKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub cmd: String,
    pub path: String,
    pub message: String,
    pub details: Map<String, Value>,
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    inner.insert("time".to_string(), json!(notice.time));
    inner.insert("cmd".to_string(), json!(notice.cmd));
    inner.insert("path".to_string(), json!(notice.path));
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}

pub fn sync_notice(event: &SyncEvent, time: String) -> Notice {
    let path = event.path.display().to_string();
    let message = match event.kind {
        SyncEventKind::Overwrite => format!("{path} exists, overwrite"),
        SyncEventKind::Skip => format!("{path} exists, skip"),
    };
    Notice {
        kind: event.kind.as_str().to_string(),
        time,
        cmd: "sync".to_string(),
        path,
        message,
        details: Map::new(),
    }
}
