use crate::rows::{AuditRow, AUDIT_COLS};
use crate::Db;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Serialize)]
struct CsvRow<'a> {
    audit_id: i64,
    at: &'a str,
    action: &'a str,
    hostname: &'a str,
    device_id: String,
    field_name: &'a str,
    old_value: &'a str,
    new_value: &'a str,
    actor: &'a str,
    session_id: String,
    reason: &'a str,
}

impl Db {
    /// Write the whole audit trail to `out` as CSV, oldest entry first.
    /// Returns the number of rows written.
    pub fn export_audit_csv(&self, out: &Path) -> Result<usize> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {AUDIT_COLS} FROM audit_log ORDER BY audit_id"))?;
        let mut rows = stmt.query([])?;
        let mut wtr = csv::Writer::from_path(out)?;
        let mut n = 0usize;
        while let Some(row) = rows.next()? {
            let e = AuditRow::read(row)?.into_entry()?;
            wtr.serialize(CsvRow {
                audit_id: e.id,
                at: &e.at,
                action: e.action.as_str(),
                hostname: &e.hostname,
                device_id: e.device_id.map(|u| u.to_string()).unwrap_or_default(),
                field_name: e.field_name.as_deref().unwrap_or(""),
                old_value: e.old_value.as_deref().unwrap_or(""),
                new_value: e.new_value.as_deref().unwrap_or(""),
                actor: &e.actor,
                session_id: e.session_id.map(|u| u.to_string()).unwrap_or_default(),
                reason: e.reason.as_deref().unwrap_or(""),
            })?;
            n += 1;
        }
        wtr.flush()?;
        info!(rows = n, path = %out.display(), "audit trail exported");
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_core::{AuditedStore, ChangeContext, DeviceRecord};

    #[test]
    fn export_writes_header_and_one_line_per_entry() {
        let db = Db::open_in_memory().unwrap();
        let ctx = ChangeContext::new("alice", None, "initial load");
        let stored = db.add(&DeviceRecord { hostname: "WKS-01".into(), ..Default::default() }, &ctx).unwrap();
        db.update(&DeviceRecord { total_ram_gb: Some(16.0), ..stored }, &ctx).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.csv");
        assert_eq!(db.export_audit_csv(&path).unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("audit_id,at,action,hostname"));
        assert!(lines[1].contains(",CREATE,WKS-01,"));
        assert!(lines[2].contains(",UPDATE,WKS-01,") && lines[2].contains("TotalRamGb,,16,alice"));
    }
}
