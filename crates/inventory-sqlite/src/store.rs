use crate::error::StoreError;
use crate::rows::{DeviceRow, DEVICE_COLS};
use crate::Db;
use inventory_core::{
    now_rfc3339, AuditAction, AuditedStore, ChangeContext, DeviceRecord, DeviceStore, DiscoverySession, EngineError,
    Field,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

/// One line describing a whole device, used for CREATE and DELETE rows.
fn summary(r: &DeviceRecord) -> String {
    let mut parts = vec![format!("hostname={}", r.hostname)];
    for (k, v) in [("ip", &r.ip_address), ("mac", &r.mac_address), ("serial", &r.serial_number), ("model", &r.model)] {
        if let Some(v) = v {
            parts.push(format!("{k}={v}"));
        }
    }
    parts.join(" ")
}

fn blank_to_none(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

/// Attributes outside the comparable field set that updates still audit.
fn extra_values(r: &DeviceRecord) -> [(&'static str, Option<String>); 7] {
    let l = &r.location;
    [
        ("Status", Some(r.status.to_string())),
        ("Location.Area", l.area.clone()),
        ("Location.Zone", l.zone.clone()),
        ("Location.Line", l.line.clone()),
        ("Location.Pitch", l.pitch.clone()),
        ("Location.Floor", l.floor.clone()),
        ("Location.Pillar", l.pillar.clone()),
    ]
}

fn changed_fields(old: &DeviceRecord, new: &DeviceRecord) -> Vec<(String, Option<String>, Option<String>)> {
    let mut out: Vec<_> = Field::all()
        .into_iter()
        .filter_map(|f| {
            let (o, n) = (f.value(old), f.value(new));
            (o != n).then(|| (f.name(), o, n))
        })
        .collect();
    for ((name, o), (_, n)) in extra_values(old).into_iter().zip(extra_values(new)) {
        if o != n {
            out.push((name.to_string(), o, n));
        }
    }
    out
}

struct AuditRecord<'a> {
    device_id: Option<Uuid>,
    hostname: &'a str,
    action: AuditAction,
    field_name: Option<&'a str>,
    old_value: Option<&'a str>,
    new_value: Option<&'a str>,
}

fn append_audit(conn: &Connection, a: AuditRecord<'_>, ctx: &ChangeContext) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO audit_log(device_id,hostname,action,field_name,old_value,new_value,at,actor,session_id,reason)
         VALUES (?,?,?,?,?,?,?,?,?,?)",
        params![
            a.device_id.map(|u| u.to_string()),
            a.hostname,
            a.action.as_str(),
            a.field_name,
            a.old_value,
            a.new_value,
            now_rfc3339(),
            ctx.actor,
            ctx.session.map(|s| s.to_string()),
            blank_to_none(&ctx.reason),
        ],
    )?;
    Ok(())
}

fn load_where(conn: &Connection, clause: &str, key: &str) -> Result<Option<DeviceRecord>, StoreError> {
    let sql = format!("SELECT {DEVICE_COLS} FROM devices WHERE {clause} = ?1");
    conn.query_row(&sql, [key], DeviceRow::read).optional()?.map(DeviceRow::into_record).transpose()
}

fn load_many(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<DeviceRecord>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, DeviceRow::read)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?.into_record()?);
    }
    Ok(out)
}

fn escape_like(q: &str) -> String {
    q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn require_reason(ctx: &ChangeContext, action: &'static str) -> Result<(), StoreError> {
    if ctx.has_reason() {
        Ok(())
    } else {
        Err(EngineError::ChangeReasonRequired { action }.into())
    }
}

impl Db {
    fn add_tx(&self, record: &DeviceRecord, ctx: &ChangeContext) -> Result<DeviceRecord, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        if load_where(&tx, "hostname", &record.hostname)?.is_some() {
            return Err(EngineError::DuplicateHostname { hostname: record.hostname.clone() }.into());
        }
        let id = record.id.unwrap_or_else(Uuid::now_v7);
        let created_at = now_rfc3339();
        let stored = DeviceRecord { id: Some(id), created_at: Some(created_at.clone()), updated_at: None, ..record.clone() };
        tx.execute(
            "INSERT INTO devices(device_id,hostname,serial_number,ip_address,mac_address,model,status,record_json,created_at)
             VALUES (?,?,?,?,?,?,?,?,?)",
            params![
                id.to_string(),
                stored.hostname,
                stored.serial_number,
                stored.ip_address,
                stored.mac_address,
                stored.model,
                stored.status.as_str(),
                serde_json::to_string(&stored)?,
                created_at,
            ],
        )?;
        let desc = summary(&stored);
        append_audit(
            &tx,
            AuditRecord {
                device_id: Some(id),
                hostname: &stored.hostname,
                action: AuditAction::Create,
                field_name: None,
                old_value: None,
                new_value: Some(&desc),
            },
            ctx,
        )?;
        tx.commit()?;
        info!(hostname = %stored.hostname, device_id = %id, "device created");
        Ok(stored)
    }

    fn update_tx(&self, record: &DeviceRecord, ctx: &ChangeContext) -> Result<usize, StoreError> {
        require_reason(ctx, "update")?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let existing = match record.id {
            Some(id) => load_where(&tx, "device_id", &id.to_string())?,
            None => load_where(&tx, "hostname", &record.hostname)?,
        };
        let Some(existing) = existing else {
            return Err(EngineError::NotFound { hostname: record.hostname.clone() }.into());
        };
        if existing.hostname != record.hostname && load_where(&tx, "hostname", &record.hostname)?.is_some() {
            return Err(EngineError::DuplicateHostname { hostname: record.hostname.clone() }.into());
        }

        let changes = changed_fields(&existing, record);
        if changes.is_empty() {
            return Ok(0);
        }
        let id = existing.id.ok_or(StoreError::Column { column: "device_id", value: String::new() })?;
        let stored = DeviceRecord {
            id: Some(id),
            created_at: existing.created_at.clone(),
            updated_at: Some(now_rfc3339()),
            ..record.clone()
        };
        tx.execute(
            "UPDATE devices SET hostname=?, serial_number=?, ip_address=?, mac_address=?, model=?, status=?, record_json=?, updated_at=?
             WHERE device_id=?",
            params![
                stored.hostname,
                stored.serial_number,
                stored.ip_address,
                stored.mac_address,
                stored.model,
                stored.status.as_str(),
                serde_json::to_string(&stored)?,
                stored.updated_at,
                id.to_string(),
            ],
        )?;
        for (name, old, new) in &changes {
            append_audit(
                &tx,
                AuditRecord {
                    device_id: Some(id),
                    hostname: &stored.hostname,
                    action: AuditAction::Update,
                    field_name: Some(name.as_str()),
                    old_value: old.as_deref(),
                    new_value: new.as_deref(),
                },
                ctx,
            )?;
        }
        tx.commit()?;
        info!(hostname = %stored.hostname, changed = changes.len(), "device updated");
        Ok(changes.len())
    }

    fn delete_tx(&self, hostname: &str, ctx: &ChangeContext) -> Result<DeviceRecord, StoreError> {
        require_reason(ctx, "delete")?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let Some(existing) = load_where(&tx, "hostname", hostname)? else {
            return Err(EngineError::NotFound { hostname: hostname.to_string() }.into());
        };
        let id = existing.id.map(|u| u.to_string()).unwrap_or_default();
        tx.execute(
            "INSERT INTO device_archive(device_id,hostname,record_json,deleted_at,deleted_by,reason) VALUES (?,?,?,?,?,?)",
            params![id, existing.hostname, serde_json::to_string(&existing)?, now_rfc3339(), ctx.actor, ctx.reason.trim()],
        )?;
        let desc = summary(&existing);
        append_audit(
            &tx,
            AuditRecord {
                device_id: existing.id,
                hostname: &existing.hostname,
                action: AuditAction::Delete,
                field_name: None,
                old_value: Some(&desc),
                new_value: None,
            },
            ctx,
        )?;
        tx.execute("DELETE FROM devices WHERE device_id=?", [&id])?;
        tx.commit()?;
        info!(hostname, device_id = %id, "device archived and removed");
        Ok(existing)
    }

    /// Refresh the discovery stamps of a matching device and note the scan.
    /// The stamps are not audited fields, so only a DISCOVER row is written.
    fn discovery_tx(&self, record: &DeviceRecord, ctx: &ChangeContext) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let Some(mut existing) = load_where(&tx, "hostname", &record.hostname)? else {
            return Err(EngineError::NotFound { hostname: record.hostname.clone() }.into());
        };
        let id = existing.id.ok_or(StoreError::Column { column: "device_id", value: String::new() })?;
        if record.last_discovered.is_some() {
            existing.last_discovered = record.last_discovered.clone();
        }
        if record.discovery_method.is_some() {
            existing.discovery_method = record.discovery_method;
        }
        tx.execute(
            "UPDATE devices SET record_json=? WHERE device_id=?",
            params![serde_json::to_string(&existing)?, id.to_string()],
        )?;
        append_audit(
            &tx,
            AuditRecord {
                device_id: Some(id),
                hostname: &existing.hostname,
                action: AuditAction::Discover,
                field_name: None,
                old_value: None,
                new_value: record.last_discovered.as_deref(),
            },
            ctx,
        )?;
        tx.commit()?;
        debug!(hostname = %existing.hostname, "discovery noted");
        Ok(())
    }

    fn scan_error(&self, session: DiscoverySession, target: &str, code: &str, message: &str) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO scan_errors(session_id,target,code,message,at) VALUES (?,?,?,?,?)",
            params![session.to_string(), target, code, message, now_rfc3339()],
        )?;
        Ok(())
    }
}

impl DeviceStore for Db {
    fn get_by_hostname(&self, hostname: &str) -> Result<Option<DeviceRecord>, EngineError> {
        let conn = self.conn()?;
        Ok(load_where(&conn, "hostname", hostname)?)
    }

    /// Substring match over hostname, serial, IP, MAC and model.
    fn search(&self, query: &str) -> Result<Vec<DeviceRecord>, EngineError> {
        let q = query.trim();
        if q.is_empty() {
            return self.list();
        }
        let pattern = format!("%{}%", escape_like(q));
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {DEVICE_COLS} FROM devices
             WHERE hostname LIKE ?1 ESCAPE '\\' OR serial_number LIKE ?1 ESCAPE '\\' OR ip_address LIKE ?1 ESCAPE '\\'
                OR mac_address LIKE ?1 ESCAPE '\\' OR model LIKE ?1 ESCAPE '\\'
             ORDER BY hostname"
        );
        Ok(load_many(&conn, &sql, &[&pattern as &dyn rusqlite::ToSql])?)
    }

    fn list(&self) -> Result<Vec<DeviceRecord>, EngineError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {DEVICE_COLS} FROM devices ORDER BY hostname");
        Ok(load_many(&conn, &sql, &[])?)
    }
}

impl AuditedStore for Db {
    fn add(&self, record: &DeviceRecord, ctx: &ChangeContext) -> Result<DeviceRecord, EngineError> {
        Ok(self.add_tx(record, ctx)?)
    }

    fn update(&self, record: &DeviceRecord, ctx: &ChangeContext) -> Result<usize, EngineError> {
        Ok(self.update_tx(record, ctx)?)
    }

    fn delete(&self, hostname: &str, ctx: &ChangeContext) -> Result<DeviceRecord, EngineError> {
        Ok(self.delete_tx(hostname, ctx)?)
    }

    fn record_discovery(&self, record: &DeviceRecord, ctx: &ChangeContext) -> Result<(), EngineError> {
        Ok(self.discovery_tx(record, ctx)?)
    }

    fn record_scan_error(&self, session: DiscoverySession, target: &str, code: &str, message: &str) -> Result<(), EngineError> {
        Ok(self.scan_error(session, target, code, message)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_core::{DeviceStatus, DiscoveryMethod, Location};
    use pretty_assertions::assert_eq;

    fn rec(hostname: &str) -> DeviceRecord {
        DeviceRecord {
            hostname: hostname.into(),
            ip_address: Some("10.0.0.5".into()),
            serial_number: Some("7XK2Q93".into()),
            model: Some("OptiPlex 7090".into()),
            total_ram_gb: Some(8.0),
            ..Default::default()
        }
    }

    fn ctx(reason: &str) -> ChangeContext {
        ChangeContext::new("alice", None, reason)
    }

    #[test]
    fn summary_lists_known_identifiers() {
        assert_eq!(summary(&rec("WKS-01")), "hostname=WKS-01 ip=10.0.0.5 serial=7XK2Q93 model=OptiPlex 7090");
    }

    #[test]
    fn add_assigns_id_and_timestamps() {
        let db = Db::open_in_memory().unwrap();
        let stored = db.add(&rec("WKS-01"), &ctx("")).unwrap();
        assert!(stored.id.is_some());
        assert!(stored.created_at.is_some());
        assert_eq!(db.get_by_hostname("WKS-01").unwrap(), Some(stored));
        assert_eq!(db.get_by_hostname("wks-01").unwrap(), None);
    }

    #[test]
    fn duplicate_hostname_is_refused() {
        let db = Db::open_in_memory().unwrap();
        db.add(&rec("WKS-01"), &ctx("")).unwrap();
        let err = db.add(&rec("WKS-01"), &ctx("again")).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateHostname { .. }));
        assert_eq!(db.list().unwrap().len(), 1);
    }

    #[test]
    fn renaming_onto_a_live_hostname_is_refused() {
        let db = Db::open_in_memory().unwrap();
        db.add(&rec("WKS-01"), &ctx("")).unwrap();
        let mut b = db.add(&rec("WKS-02"), &ctx("")).unwrap();
        b.hostname = "WKS-01".into();
        let err = db.update(&b, &ctx("rename")).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateHostname { .. }));
    }

    #[test]
    fn update_of_unknown_device_is_not_found() {
        let db = Db::open_in_memory().unwrap();
        let err = db.update(&rec("GHOST"), &ctx("fix")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn no_op_update_writes_nothing() {
        let db = Db::open_in_memory().unwrap();
        let stored = db.add(&rec("WKS-01"), &ctx("")).unwrap();
        assert_eq!(db.update(&stored, &ctx("recheck")).unwrap(), 0);
        assert_eq!(db.get_by_hostname("WKS-01").unwrap().unwrap().updated_at, None);
    }

    #[test]
    fn location_and_status_changes_are_counted() {
        let db = Db::open_in_memory().unwrap();
        let mut stored = db.add(&rec("WKS-01"), &ctx("")).unwrap();
        stored.status = DeviceStatus::Maintenance;
        stored.location = Location { floor: Some("2".into()), ..Default::default() };
        assert_eq!(db.update(&stored, &ctx("moved")).unwrap(), 2);
    }

    #[test]
    fn search_matches_substrings_and_escapes_wildcards() {
        let db = Db::open_in_memory().unwrap();
        db.add(&rec("WKS-01"), &ctx("")).unwrap();
        db.add(&DeviceRecord { hostname: "SRV_DB".into(), ..Default::default() }, &ctx("")).unwrap();
        let hits: Vec<String> = db.search("optiplex").unwrap().into_iter().map(|r| r.hostname).collect();
        assert_eq!(hits, vec!["WKS-01".to_string()]);
        let hits: Vec<String> = db.search("_").unwrap().into_iter().map(|r| r.hostname).collect();
        assert_eq!(hits, vec!["SRV_DB".to_string()]);
        assert_eq!(db.search("  ").unwrap().len(), 2);
    }

    #[test]
    fn discovery_note_requires_a_live_device() {
        let db = Db::open_in_memory().unwrap();
        let err = db.record_discovery(&rec("GHOST"), &ctx("")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn discovery_refreshes_stamps_without_update_rows() {
        let db = Db::open_in_memory().unwrap();
        let first = DeviceRecord {
            last_discovered: Some("2026-01-01T00:00:00Z".into()),
            discovery_method: Some(DiscoveryMethod::BulkScan),
            ..rec("WKS-01")
        };
        db.add(&first, &ctx("")).unwrap();

        let seen = DeviceRecord {
            last_discovered: Some("2026-10-15T08:00:00Z".into()),
            discovery_method: Some(DiscoveryMethod::Scan),
            ..rec("WKS-01")
        };
        db.record_discovery(&seen, &ctx("")).unwrap();

        let stored = db.get_by_hostname("WKS-01").unwrap().unwrap();
        assert_eq!(stored.last_discovered.as_deref(), Some("2026-10-15T08:00:00Z"));
        assert_eq!(stored.discovery_method, Some(DiscoveryMethod::Scan));
        assert_eq!(stored.updated_at, None);
        let actions: Vec<AuditAction> = db.audit_for_hostname("WKS-01").unwrap().into_iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Create, AuditAction::Discover]);
    }
}
