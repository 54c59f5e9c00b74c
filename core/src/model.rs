use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Target;

/// Most secondary adapters kept on a snapshot or record.
pub const MAX_SECONDARY_ADAPTERS: usize = 3;
/// Most drives kept on a snapshot or record.
pub const MAX_DRIVES: usize = 4;

/// Outcome of fetching one fact group. A failed group degrades to
/// `Unavailable` instead of failing the whole collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Gathered<T> {
    Available(T),
    Unavailable(String),
}

impl<T> Gathered<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Gathered::Available(_))
    }

    pub fn available(&self) -> Option<&T> {
        match self {
            Gathered::Available(v) => Some(v),
            Gathered::Unavailable(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Gathered<U> {
        match self {
            Gathered::Available(v) => Gathered::Available(f(v)),
            Gathered::Unavailable(r) => Gathered::Unavailable(r),
        }
    }
}

impl<T, E: fmt::Display> From<Result<T, E>> for Gathered<T> {
    fn from(r: Result<T, E>) -> Self {
        match r {
            Ok(v) => Gathered::Available(v),
            Err(e) => Gathered::Unavailable(e.to_string()),
        }
    }
}

// ── Raw facts, as reported by a collector ───────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareFacts {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub asset_tag: String,
    pub bios_version: String,
    pub processor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryModule {
    /// Capacity as reported, e.g. `8 GB`, `16384 MB` or a byte count.
    pub capacity: String,
    pub kind: String,
    pub speed: String,
    pub manufacturer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDisk {
    pub name: String,
    pub capacity: String,
    pub kind: String,
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsFacts {
    pub name: String,
    pub version: String,
    pub architecture: String,
    pub install_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAdapter {
    pub name: String,
    pub ip_address: String,
    pub mac_address: String,
    pub subnet_mask: String,
    /// Separator-delimited list, as reported.
    pub dns_servers: String,
    pub default_gateway: String,
    pub connected: bool,
    pub wireless: bool,
}

/// Everything a collector learned about one target, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFacts {
    pub target: Target,
    pub computer_name: String,
    pub hardware: Gathered<HardwareFacts>,
    pub memory: Gathered<Vec<MemoryModule>>,
    pub storage: Gathered<Vec<RawDisk>>,
    pub os: Gathered<OsFacts>,
    pub network: Gathered<Vec<RawAdapter>>,
    pub domain: Gathered<String>,
    pub collected_at: String,
}

// ── Normalized snapshot ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySummary {
    pub modules: Vec<MemoryModule>,
    pub total_ram_gb: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterSlot {
    pub name: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
}

impl AdapterSlot {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.ip_address.is_none() && self.mac_address.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drive {
    pub name: Option<String>,
    pub capacity_gb: Option<f64>,
    pub kind: Option<String>,
    pub model: Option<String>,
}

impl Drive {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.capacity_gb.is_none() && self.kind.is_none() && self.model.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimaryAdapter {
    pub name: String,
    pub ip_address: String,
    pub mac_address: String,
    pub subnet_mask: String,
    pub default_gateway: String,
    pub dns_primary: String,
    pub dns_secondary: String,
    pub wireless: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub primary: Option<PrimaryAdapter>,
    pub secondary: Vec<AdapterSlot>,
}

/// Immutable point-in-time capture of one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub target: Target,
    pub computer_name: String,
    pub hardware: Gathered<HardwareFacts>,
    pub memory: Gathered<MemorySummary>,
    pub drives: Gathered<Vec<Drive>>,
    pub os: Gathered<OsFacts>,
    pub network: Gathered<NetworkSummary>,
    pub domain: Gathered<String>,
    pub captured_at: String,
}

// ── Device record ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub area: Option<String>,
    pub zone: Option<String>,
    pub line: Option<String>,
    pub pitch: Option<String>,
    pub floor: Option<String>,
    pub pillar: Option<String>,
}

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self { $($name::$variant => $s),+ }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($name::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
    Retired,
}

string_enum!(DeviceStatus {
    Active => "active",
    Inactive => "inactive",
    Maintenance => "maintenance",
    Retired => "retired",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryMethod {
    Manual,
    Scan,
    BulkScan,
}

string_enum!(DiscoveryMethod {
    Manual => "manual",
    Scan => "scan",
    BulkScan => "bulk_scan",
});

/// The durable inventory entity for one host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: Option<Uuid>,
    pub hostname: String,

    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub asset_tag: Option<String>,
    pub bios_version: Option<String>,
    pub processor: Option<String>,
    pub total_ram_gb: Option<f64>,

    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub os_architecture: Option<String>,
    pub os_install_date: Option<String>,
    pub domain: Option<String>,

    pub adapter_name: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub subnet_mask: Option<String>,
    pub default_gateway: Option<String>,
    pub dns_primary: Option<String>,
    pub dns_secondary: Option<String>,
    pub wireless: Option<bool>,
    pub secondary_adapters: Vec<AdapterSlot>,
    pub drives: Vec<Drive>,

    pub location: Location,
    pub status: DeviceStatus,
    pub discovery_method: Option<DiscoveryMethod>,
    pub last_discovered: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

// ── Comparison ──────────────────────────────────────────────────────

/// One changed field between a stored record and a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: crate::Field,
    pub old: Option<String>,
    pub new: Option<String>,
    pub apply: bool,
}

/// The ordered diff for one (snapshot, record) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub target: Target,
    /// Stored record, if the device was already in inventory.
    pub stored: Option<DeviceRecord>,
    /// The snapshot projected onto the record shape.
    pub candidate: DeviceRecord,
    pub diffs: Vec<FieldDiff>,
}

impl ComparisonResult {
    pub fn is_new_device(&self) -> bool {
        self.stored.is_none()
    }

    pub fn has_changes(&self) -> bool {
        !self.diffs.is_empty()
    }
}

// ── Audit ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Discover,
}

string_enum!(AuditAction {
    Create => "CREATE",
    Update => "UPDATE",
    Delete => "DELETE",
    Discover => "DISCOVER",
});

/// Immutable record of one change. `device_id` is a weak reference: the
/// entry outlives the device it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub device_id: Option<Uuid>,
    pub hostname: String,
    pub action: AuditAction,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub at: String,
    pub actor: String,
    pub session_id: Option<Uuid>,
    pub reason: Option<String>,
}

/// Correlation label for one scan or bulk run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoverySession(pub Uuid);

impl DiscoverySession {
    pub fn new() -> Self {
        DiscoverySession(Uuid::now_v7())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl Default for DiscoverySession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DiscoverySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ── Bulk scan ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Added,
    Updated,
    Skipped,
    Failed,
}

string_enum!(Outcome {
    Added => "added",
    Updated => "updated",
    Skipped => "skipped",
    Failed => "failed",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub target: String,
    pub outcome: Outcome,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkScanResult {
    pub session: DiscoverySession,
    pub total: usize,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<TargetOutcome>,
    pub duration_ms: u128,
    pub failure_report: Option<std::path::PathBuf>,
    /// Set when targets failed but the report could not be written.
    pub failure_report_error: Option<String>,
}

impl BulkScanResult {
    pub fn succeeded(&self) -> usize {
        self.added + self.updated + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gathered_from_result() {
        let ok: Gathered<u8> = Ok::<u8, String>(3).into();
        assert_eq!(ok.available(), Some(&3));
        let bad: Gathered<u8> = Err::<u8, String>("dmidecode: permission denied".into()).into();
        assert!(!bad.is_available());
        assert_eq!(bad, Gathered::Unavailable("dmidecode: permission denied".into()));
    }

    #[test]
    fn string_enums_round_trip_through_their_names() {
        assert_eq!("bulk_scan".parse::<DiscoveryMethod>().unwrap(), DiscoveryMethod::BulkScan);
        assert_eq!(AuditAction::Delete.as_str(), "DELETE");
        assert!("deleted".parse::<AuditAction>().is_err());
        assert_eq!(DeviceStatus::default(), DeviceStatus::Active);
    }

    #[test]
    fn empty_slots_are_detected() {
        assert!(AdapterSlot::default().is_empty());
        assert!(!Drive { capacity_gb: Some(512.0), ..Default::default() }.is_empty());
    }
}
