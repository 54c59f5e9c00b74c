use crate::error::StoreError;
use crate::rows::{parse_uuid, ArchivedDevice, AuditRow, ScanErrorRow, SessionRow, AUDIT_COLS};
use crate::Db;
use inventory_core::{now_rfc3339, AuditEntry, DeviceRecord, DiscoverySession, EngineError};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use uuid::Uuid;

fn audit_where(conn: &Connection, clause: &str, key: &dyn ToSql) -> Result<Vec<AuditEntry>, StoreError> {
    let sql = format!("SELECT {AUDIT_COLS} FROM audit_log WHERE {clause} = ?1 ORDER BY audit_id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([key], AuditRow::read)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?.into_entry()?);
    }
    Ok(out)
}

impl Db {
    /// Every audit entry for `device_id`, oldest first. Entries survive the
    /// device's deletion.
    pub fn audit_for_device(&self, device_id: Uuid) -> Result<Vec<AuditEntry>, EngineError> {
        let conn = self.conn()?;
        Ok(audit_where(&conn, "device_id", &device_id.to_string())?)
    }

    /// Audit history by hostname, including hosts that no longer exist.
    pub fn audit_for_hostname(&self, hostname: &str) -> Result<Vec<AuditEntry>, EngineError> {
        let conn = self.conn()?;
        Ok(audit_where(&conn, "hostname", &hostname)?)
    }

    pub fn audit_for_session(&self, session: DiscoverySession) -> Result<Vec<AuditEntry>, EngineError> {
        let conn = self.conn()?;
        Ok(audit_where(&conn, "session_id", &session.to_string())?)
    }

    pub fn audit_count(&self) -> Result<i64, EngineError> {
        let conn = self.conn()?;
        let n = conn.query_row("SELECT COUNT(1) FROM audit_log", [], |r| r.get(0)).map_err(StoreError::from)?;
        Ok(n)
    }

    /// Archived copies of deleted devices with this hostname, newest first.
    pub fn archived(&self, hostname: &str) -> Result<Vec<ArchivedDevice>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT record_json, deleted_at, deleted_by, reason FROM device_archive
                 WHERE hostname = ?1 ORDER BY archive_id DESC",
            )
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map([hostname], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?, r.get::<_, String>(3)?))
            })
            .map_err(StoreError::from)?;
        let mut out = Vec::new();
        for row in rows {
            let (json, deleted_at, deleted_by, reason) = row.map_err(StoreError::from)?;
            let record: DeviceRecord = serde_json::from_str(&json).map_err(StoreError::from)?;
            out.push(ArchivedDevice { record, deleted_at, deleted_by, reason });
        }
        Ok(out)
    }

    /// Register a session label. Sessions are optional; audit rows may
    /// reference ids that were never registered here.
    pub fn begin_session(&self, session: DiscoverySession, kind: &str, actor: &str) -> Result<(), EngineError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO discovery_sessions(session_id,kind,actor,started_at) VALUES (?,?,?,?)",
            params![session.to_string(), kind, actor, now_rfc3339()],
        )
        .map_err(StoreError::from)?;
        Ok(())
    }

    pub fn finish_session(&self, session: DiscoverySession, processed: usize, failed: usize) -> Result<(), EngineError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE discovery_sessions SET finished_at=?, processed=?, failed=? WHERE session_id=?",
            params![now_rfc3339(), processed as i64, failed as i64, session.to_string()],
        )
        .map_err(StoreError::from)?;
        Ok(())
    }

    pub fn session(&self, session: DiscoverySession) -> Result<Option<SessionRow>, EngineError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT session_id, kind, actor, started_at, finished_at, processed, failed
                 FROM discovery_sessions WHERE session_id = ?1",
                [session.to_string()],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, Option<String>>(4)?,
                        r.get::<_, i64>(5)?,
                        r.get::<_, i64>(6)?,
                    ))
                },
            )
            .optional()
            .map_err(StoreError::from)?;
        let Some((id, kind, actor, started_at, finished_at, processed, failed)) = row else {
            return Ok(None);
        };
        Ok(Some(SessionRow {
            session_id: parse_uuid("session_id", &id)?,
            kind,
            actor,
            started_at,
            finished_at,
            processed,
            failed,
        }))
    }

    pub fn scan_errors(&self, session: DiscoverySession) -> Result<Vec<ScanErrorRow>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT target, code, message, at FROM scan_errors WHERE session_id = ?1 ORDER BY error_id")
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map([session.to_string()], |r| {
                Ok(ScanErrorRow { session_id: session.id(), target: r.get(0)?, code: r.get(1)?, message: r.get(2)?, at: r.get(3)? })
            })
            .map_err(StoreError::from)?;
        Ok(rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)?)
    }
}
