pub const MIG_0001_INIT: &str = r#"
BEGIN;

CREATE TABLE devices (
  device_id       TEXT PRIMARY KEY,
  hostname        TEXT NOT NULL UNIQUE,
  serial_number   TEXT,
  ip_address      TEXT,
  mac_address     TEXT,
  model           TEXT,
  status          TEXT NOT NULL CHECK (status IN ('active','inactive','maintenance','retired')),
  record_json     TEXT NOT NULL,
  created_at      TEXT NOT NULL,
  updated_at      TEXT
);

CREATE TABLE device_archive (
  archive_id      INTEGER PRIMARY KEY AUTOINCREMENT,
  device_id       TEXT NOT NULL,
  hostname        TEXT NOT NULL,
  record_json     TEXT NOT NULL,
  deleted_at      TEXT NOT NULL,
  deleted_by      TEXT NOT NULL,
  reason          TEXT NOT NULL
);

-- device_id is a weak reference: no foreign key, no cascade.
CREATE TABLE audit_log (
  audit_id        INTEGER PRIMARY KEY AUTOINCREMENT,
  device_id       TEXT,
  hostname        TEXT NOT NULL,
  action          TEXT NOT NULL CHECK (action IN ('CREATE','UPDATE','DELETE','DISCOVER')),
  field_name      TEXT,
  old_value       TEXT,
  new_value       TEXT,
  at              TEXT NOT NULL,
  actor           TEXT NOT NULL,
  session_id      TEXT,
  reason          TEXT
);

CREATE TRIGGER audit_log_no_update BEFORE UPDATE ON audit_log
BEGIN
  SELECT RAISE(ABORT, 'audit_log is append-only');
END;

CREATE TRIGGER audit_log_no_delete BEFORE DELETE ON audit_log
BEGIN
  SELECT RAISE(ABORT, 'audit_log is append-only');
END;

CREATE TABLE discovery_sessions (
  session_id      TEXT PRIMARY KEY,
  kind            TEXT NOT NULL,
  actor           TEXT NOT NULL,
  started_at      TEXT NOT NULL,
  finished_at     TEXT,
  processed       INTEGER DEFAULT 0,
  failed          INTEGER DEFAULT 0
);

CREATE TABLE scan_errors (
  error_id        INTEGER PRIMARY KEY AUTOINCREMENT,
  session_id      TEXT NOT NULL,
  target          TEXT NOT NULL,
  code            TEXT NOT NULL,
  message         TEXT NOT NULL,
  at              TEXT NOT NULL
);

CREATE INDEX idx_audit_device ON audit_log(device_id);
CREATE INDEX idx_audit_session ON audit_log(session_id);
CREATE INDEX idx_audit_hostname ON audit_log(hostname);
CREATE INDEX idx_archive_hostname ON device_archive(hostname);
CREATE INDEX idx_scan_errors_session ON scan_errors(session_id);

COMMIT;
"#;
