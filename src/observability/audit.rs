use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::Caller;

/// Audit log entry. Never carries setting values.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub audit_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub schema_version: u32,
    pub actor_id: String,
    pub org_id: i64,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub details: serde_json::Value,
}

impl AuditEntry {
    pub fn new(
        caller: &Caller,
        action: &str,
        target_type: Option<&str>,
        target_id: Option<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            schema_version: 1,
            actor_id: caller.subject.clone(),
            org_id: caller.org_id,
            action: action.to_string(),
            target_type: target_type.map(String::from),
            target_id,
            details,
        }
    }

    /// Create entry for an integration test request. `outcome` is `success`,
    /// `delivery_failed`, or the error kind that aborted the test.
    pub fn integration_tested(
        caller: &Caller,
        integration_type: &str,
        integration_uid: &str,
        receiver_ref: Option<&str>,
        outcome: &str,
    ) -> Self {
        let target_id = (!integration_uid.is_empty()).then(|| integration_uid.to_string());
        Self::new(
            caller,
            "test",
            Some("integration"),
            target_id,
            serde_json::json!({
                "integration_type": integration_type,
                "receiver_ref": receiver_ref,
                "outcome": outcome,
            }),
        )
    }
}

/// Audit log writer (JSON Lines format)
pub struct AuditLogWriter {
    writer: Mutex<BufWriter<File>>,
}

impl AuditLogWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn write(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let json = serde_json::to_string(entry)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| std::io::Error::other("audit writer lock poisoned"))?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Permission;
    use tempfile::NamedTempFile;

    fn caller() -> Caller {
        Caller::new("ops", 7, vec![Permission::ReceiversTest])
    }

    #[test]
    fn test_audit_entry_serialization() {
        let entry = AuditEntry::integration_tested(&caller(), "slack", "i1", Some("r1"), "success");

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"action\":\"test\""));
        assert!(json.contains("\"actor_id\":\"ops\""));
        assert!(json.contains("\"org_id\":7"));
        assert!(json.contains("\"target_id\":\"i1\""));
        assert!(json.contains("\"receiver_ref\":\"r1\""));
    }

    #[test]
    fn test_ephemeral_integration_has_no_target_id() {
        let entry = AuditEntry::integration_tested(&caller(), "webhook", "", None, "delivery_failed");
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("target_id").is_none());
        assert_eq!(json["details"]["outcome"], "delivery_failed");
    }

    #[test]
    fn test_audit_log_writer() {
        let temp_file = NamedTempFile::new().unwrap();
        let writer = AuditLogWriter::new(temp_file.path()).unwrap();

        writer
            .write(&AuditEntry::integration_tested(&caller(), "teams", "i9", None, "success"))
            .unwrap();
        writer
            .write(&AuditEntry::integration_tested(&caller(), "teams", "i9", None, "validation_failed"))
            .unwrap();

        let contents = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.ends_with('\n'));
    }
}
