// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for gate decisions and registry changes.
//!
//! Events are appended to a daily JSONL file. Writers go through the
//! [`AuditSink`] trait so tests can capture events in memory.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{StorageError, StoragePaths, StorageResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Gate decisions
    GateApproved,
    GateBlocked,
    GatePending,

    // Time-lock events
    TimeLockCancelled,
    TimeLockReleased,

    // Registry events
    ScamReported,
    ScamDatabaseUpdated,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Resource affected (time lock id, scam address, ...).
    pub resource_id: Option<String>,
    /// Resource type (time_lock, scam_address, ...).
    pub resource_type: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> StorageResult<()>;
}

/// Daily JSONL files under `{root}/audit/{date}/events.jsonl`.
#[derive(Debug)]
pub struct JsonlAuditLog {
    paths: StoragePaths,
    write_lock: Mutex<()>,
}

impl JsonlAuditLog {
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            write_lock: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Read audit events for a specific date (`YYYY-MM-DD`).
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.paths.audit_events_file(date);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.display().to_string()),
            _ => StorageError::Io(e),
        })?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StorageError::from))
            .collect()
    }

    /// Read events for an inclusive date range. Days without a log are skipped.
    pub fn read_events_range(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> StorageResult<Vec<AuditEvent>> {
        let start = parse_date(start_date)?;
        let end = parse_date(end_date)?;

        let mut all_events = Vec::new();
        let mut current = start;
        while current <= end {
            match self.read_events(&current.format("%Y-%m-%d").to_string()) {
                Ok(events) => all_events.extend(events),
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            current = current
                .succ_opt()
                .ok_or_else(|| StorageError::InvalidDate("date overflow".to_string()))?;
        }
        Ok(all_events)
    }

    pub fn search_by_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
        date: &str,
    ) -> StorageResult<Vec<AuditEvent>> {
        Ok(self
            .read_events(date)?
            .into_iter()
            .filter(|e| {
                e.resource_type.as_deref() == Some(resource_type)
                    && e.resource_id.as_deref() == Some(resource_id)
            })
            .collect())
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        fs::create_dir_all(self.paths.audit_date_dir(&date))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.paths.audit_events_file(&date))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, event: &AuditEvent) -> StorageResult<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

fn parse_date(date: &str) -> StorageResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| StorageError::InvalidDate(format!("{date}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, JsonlAuditLog) {
        let temp = TempDir::new().unwrap();
        let log = JsonlAuditLog::new(StoragePaths::new(temp.path()));
        (temp, log)
    }

    fn today() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::GateBlocked)
            .with_resource("transaction", "tx-1")
            .failed("Incorrect PIN");

        assert!(!event.success);
        assert_eq!(event.error, Some("Incorrect PIN".to_string()));
        assert_eq!(event.resource_type.as_deref(), Some("transaction"));
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, log) = setup();
        log.record(&AuditEvent::new(AuditEventType::GateApproved)).unwrap();
        log.record(&AuditEvent::new(AuditEventType::GatePending)).unwrap();

        let events = log.read_events(&today()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::GateApproved);
        assert_eq!(events[1].event_type, AuditEventType::GatePending);
    }

    #[test]
    fn missing_day_is_not_found() {
        let (_temp, log) = setup();
        assert!(matches!(
            log.read_events("2001-01-01"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn range_skips_missing_days() {
        let (_temp, log) = setup();
        log.record(&AuditEvent::new(AuditEventType::ScamReported)).unwrap();

        let yesterday = (Utc::now() - chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        let events = log.read_events_range(&yesterday, &today()).unwrap();
        assert_eq!(events.len(), 1);
        assert!(log.read_events_range("not-a-date", &today()).is_err());
    }

    #[test]
    fn search_by_resource() {
        let (_temp, log) = setup();
        log.record(
            &AuditEvent::new(AuditEventType::TimeLockCancelled).with_resource("time_lock", "tl-1"),
        )
        .unwrap();
        log.record(
            &AuditEvent::new(AuditEventType::TimeLockReleased).with_resource("time_lock", "tl-2"),
        )
        .unwrap();

        let events = log.search_by_resource("time_lock", "tl-1", &today()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::TimeLockCancelled);
    }

    #[test]
    fn memory_sink_captures_events() {
        let sink = MemoryAuditLog::default();
        sink.record(&AuditEvent::new(AuditEventType::ScamDatabaseUpdated))
            .unwrap();
        assert_eq!(sink.events().len(), 1);
    }
}
