//! SQLite-backed device inventory with an append-only audit trail.
//!
//! Live devices, archived copies of deleted ones, the audit log, discovery
//! sessions and per-target scan errors all live in one database file. The
//! audit log refers to devices by id without a foreign key, and triggers
//! reject any UPDATE or DELETE against it.

mod error;
mod export;
mod open;
mod query;
mod rows;
mod schema;
mod store;

pub use error::StoreError;
pub use open::Db;
pub use rows::{ArchivedDevice, ScanErrorRow, SessionRow};
