//! # Failure Ledger
//!
//! Failed and rejected events waiting for an operator, newest first.
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  push rejects event ─────┐                                             │
//! │                          ├──► prepend(entry, retries_count = 0)        │
//! │  push call fails ────────┘                                             │
//! │                                                                         │
//! │  retry, rejected again ──────► update in place (same id, retries + 1)  │
//! │  retry, acknowledged ────────► remove                                  │
//! │  discard ────────────────────► remove                                  │
//! │  clone-and-edit ─────────────► untouched                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use till_core::FailureEntry;

use crate::error::SyncResult;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureLedger {
    entries: Vec<FailureEntry>,
}

impl FailureLedger {
    pub fn from_entries(entries: Vec<FailureEntry>) -> Self {
        FailureLedger { entries }
    }

    /// Puts `batch` at the front, keeping the batch's own order.
    pub fn prepend_all(&mut self, batch: Vec<FailureEntry>) {
        if batch.is_empty() {
            return;
        }
        let older = std::mem::replace(&mut self.entries, batch);
        self.entries.extend(older);
    }

    pub fn get(&self, id: &str) -> Option<&FailureEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut FailureEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<FailureEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn entries(&self) -> &[FailureEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies the ledger into an export document.
    pub fn export(&self, device_id: Option<String>, exported_at: DateTime<Utc>) -> FailureExport {
        FailureExport {
            exported_at,
            device_id,
            count: self.entries.len(),
            entries: self.entries.clone(),
        }
    }
}

/// Downloadable snapshot of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureExport {
    pub exported_at: DateTime<Utc>,
    pub device_id: Option<String>,
    pub count: usize,
    pub entries: Vec<FailureEntry>,
}

impl FailureExport {
    pub fn to_json_pretty(&self) -> SyncResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// e.g. `sync-failures-20261014T091500Z.json`
    pub fn file_name(&self) -> String {
        format!(
            "sync-failures-{}.json",
            self.exported_at.format("%Y%m%dT%H%M%SZ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;
    use till_core::{Event, FailureReason, Payload, RejectCode};

    fn entry(event_type: &str) -> FailureEntry {
        let now = Utc::now();
        FailureEntry::new(
            &Event::new(event_type, Payload::new(), now),
            FailureReason::transport("offline", RejectCode::DomainRuleViolation, Value::Null),
            now,
        )
    }

    #[test]
    fn test_prepend_keeps_batch_order() {
        let mut ledger = FailureLedger::from_entries(vec![entry("old.one")]);
        ledger.prepend_all(vec![entry("new.a"), entry("new.b")]);

        let types: Vec<&str> = ledger.entries().iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["new.a", "new.b", "old.one"]);
    }

    #[test]
    fn test_get_and_remove() {
        let first = entry("invoice.create");
        let id = first.id.clone();
        let mut ledger = FailureLedger::from_entries(vec![first, entry("stock.adjust")]);

        assert!(ledger.get(&id).is_some());
        ledger.get_mut(&id).unwrap().reason = "edited".into();
        assert_eq!(ledger.remove(&id).unwrap().reason, "edited");
        assert!(ledger.remove(&id).is_none());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_export_document() {
        let ledger = FailureLedger::from_entries(vec![entry("invoice.create")]);
        let at = Utc.with_ymd_and_hms(2026, 10, 14, 9, 15, 0).unwrap();
        let export = ledger.export(Some("register-1".into()), at);

        assert_eq!(export.count, 1);
        assert_eq!(export.file_name(), "sync-failures-20261014T091500Z.json");

        let json: Value = serde_json::from_str(&export.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["device_id"], "register-1");
        assert_eq!(json["entries"][0]["eventType"], "invoice.create");
        // export reads, never mutates
        assert_eq!(ledger.len(), 1);
    }
}
