//! Row mapping between SQLite and the inventory model.

use crate::error::StoreError;
use inventory_core::{AuditAction, AuditEntry, DeviceRecord};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(crate) const DEVICE_COLS: &str = "device_id, record_json, created_at, updated_at";

pub(crate) const AUDIT_COLS: &str =
    "audit_id, device_id, hostname, action, field_name, old_value, new_value, at, actor, session_id, reason";

pub(crate) fn parse_uuid(column: &'static str, value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|_| StoreError::Column { column, value: value.to_string() })
}

/// Raw device columns, decoded outside the rusqlite closure.
pub(crate) struct DeviceRow {
    device_id: String,
    record_json: String,
    created_at: String,
    updated_at: Option<String>,
}

impl DeviceRow {
    pub(crate) fn read(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DeviceRow { device_id: r.get(0)?, record_json: r.get(1)?, created_at: r.get(2)?, updated_at: r.get(3)? })
    }

    /// The id and timestamp columns win over whatever the JSON body says.
    pub(crate) fn into_record(self) -> Result<DeviceRecord, StoreError> {
        let mut rec: DeviceRecord = serde_json::from_str(&self.record_json)?;
        rec.id = Some(parse_uuid("device_id", &self.device_id)?);
        rec.created_at = Some(self.created_at);
        rec.updated_at = self.updated_at;
        Ok(rec)
    }
}

pub(crate) struct AuditRow {
    id: i64,
    device_id: Option<String>,
    hostname: String,
    action: String,
    field_name: Option<String>,
    old_value: Option<String>,
    new_value: Option<String>,
    at: String,
    actor: String,
    session_id: Option<String>,
    reason: Option<String>,
}

impl AuditRow {
    pub(crate) fn read(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(AuditRow {
            id: r.get(0)?,
            device_id: r.get(1)?,
            hostname: r.get(2)?,
            action: r.get(3)?,
            field_name: r.get(4)?,
            old_value: r.get(5)?,
            new_value: r.get(6)?,
            at: r.get(7)?,
            actor: r.get(8)?,
            session_id: r.get(9)?,
            reason: r.get(10)?,
        })
    }

    pub(crate) fn into_entry(self) -> Result<AuditEntry, StoreError> {
        let action: AuditAction =
            self.action.parse().map_err(|_| StoreError::Column { column: "action", value: self.action.clone() })?;
        Ok(AuditEntry {
            id: self.id,
            device_id: self.device_id.as_deref().map(|v| parse_uuid("device_id", v)).transpose()?,
            hostname: self.hostname,
            action,
            field_name: self.field_name,
            old_value: self.old_value,
            new_value: self.new_value,
            at: self.at,
            actor: self.actor,
            session_id: self.session_id.as_deref().map(|v| parse_uuid("session_id", v)).transpose()?,
            reason: self.reason,
        })
    }
}

/// A deleted device as it was at the moment of deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedDevice {
    pub record: DeviceRecord,
    pub deleted_at: String,
    pub deleted_by: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanErrorRow {
    pub session_id: Uuid,
    pub target: String,
    pub code: String,
    pub message: String,
    pub at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRow {
    pub session_id: Uuid,
    pub kind: String,
    pub actor: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub processed: i64,
    pub failed: i64,
}
