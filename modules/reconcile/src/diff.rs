//! Field-by-field comparison of a snapshot against a stored record.

use inventory_core::{ComparisonResult, DeviceRecord, DiscoveryMethod, FactGroup, Field, FieldDiff, Snapshot};

fn opt(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Whether `group` was actually gathered for this snapshot. Fields of a
/// group that failed are left out of the comparison entirely.
pub fn group_available(snapshot: &Snapshot, group: FactGroup) -> bool {
    match group {
        FactGroup::Identity => true,
        FactGroup::Hardware => snapshot.hardware.is_available(),
        FactGroup::Memory => snapshot.memory.is_available(),
        FactGroup::Storage => snapshot.drives.is_available(),
        FactGroup::Os => snapshot.os.is_available(),
        FactGroup::Network => snapshot.network.is_available(),
        FactGroup::Domain => snapshot.domain.is_available(),
    }
}

/// The snapshot projected onto the shape of a device record.
pub fn candidate_record(s: &Snapshot) -> DeviceRecord {
    let mut r = DeviceRecord {
        hostname: s.computer_name.clone(),
        discovery_method: Some(DiscoveryMethod::Scan),
        last_discovered: Some(s.captured_at.clone()),
        ..Default::default()
    };
    if let Some(hw) = s.hardware.available() {
        r.manufacturer = opt(&hw.manufacturer);
        r.model = opt(&hw.model);
        r.serial_number = opt(&hw.serial_number);
        r.asset_tag = opt(&hw.asset_tag);
        r.bios_version = opt(&hw.bios_version);
        r.processor = opt(&hw.processor);
    }
    if let Some(mem) = s.memory.available() {
        r.total_ram_gb = (mem.total_ram_gb > 0.0).then_some(mem.total_ram_gb);
    }
    if let Some(drives) = s.drives.available() {
        r.drives = drives.clone();
    }
    if let Some(os) = s.os.available() {
        r.os_name = opt(&os.name);
        r.os_version = opt(&os.version);
        r.os_architecture = opt(&os.architecture);
        r.os_install_date = opt(&os.install_date);
    }
    if let Some(domain) = s.domain.available() {
        r.domain = opt(domain);
    }
    if let Some(net) = s.network.available() {
        if let Some(p) = &net.primary {
            r.adapter_name = opt(&p.name);
            r.ip_address = opt(&p.ip_address);
            r.mac_address = opt(&p.mac_address);
            r.subnet_mask = opt(&p.subnet_mask);
            r.default_gateway = opt(&p.default_gateway);
            r.dns_primary = opt(&p.dns_primary);
            r.dns_secondary = opt(&p.dns_secondary);
            r.wireless = Some(p.wireless);
        }
        r.secondary_adapters = net.secondary.clone();
    }
    r
}

/// Compare `snapshot` against `record`. With no record every populated
/// field is reported with an absent old value.
///
/// Values are compared in their rendered form, case-sensitively; RAM and
/// drive capacities are rendered at two decimals so float noise never
/// shows up as a change.
pub fn compare(snapshot: &Snapshot, record: Option<&DeviceRecord>) -> ComparisonResult {
    let candidate = candidate_record(snapshot);
    let diffs = Field::all()
        .into_iter()
        .filter(|f| group_available(snapshot, f.group()))
        .filter_map(|field| {
            let old = record.and_then(|r| field.value(r));
            let new = field.value(&candidate);
            (old != new).then_some(FieldDiff { field, old, new, apply: false })
        })
        .collect();
    ComparisonResult { target: snapshot.target.clone(), stored: record.cloned(), candidate, diffs }
}
