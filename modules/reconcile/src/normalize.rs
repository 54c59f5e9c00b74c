//! Raw facts to snapshot: primary adapter choice, RAM totals, DNS split.
//!
//! Normalization never fails. Missing or unparsable values degrade to
//! empty or zero; the differencer already tolerates both.

use inventory_core::{
    AdapterSlot, Drive, Gathered, MemorySummary, NetworkSummary, PrimaryAdapter, RawAdapter, RawDisk, RawFacts,
    Snapshot, Target, MAX_DRIVES, MAX_SECONDARY_ADAPTERS,
};

const KIB: f64 = 1024.0;

/// Parse a capacity such as `8 GB`, `8192 MB`, `16318480 kB` or a bare
/// byte count into GB (binary multiples).
pub fn parse_capacity_gb(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let split = s.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    let n: f64 = num.parse().ok()?;
    let bytes_per_unit = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1.0,
        "K" | "KB" | "KIB" => KIB,
        "M" | "MB" | "MIB" => KIB * KIB,
        "G" | "GB" | "GIB" => KIB * KIB * KIB,
        "T" | "TB" | "TIB" => KIB * KIB * KIB * KIB,
        _ => return None,
    };
    Some(n * bytes_per_unit / (KIB * KIB * KIB))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn opt(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn has_gateway(a: &RawAdapter) -> bool {
    let gw = a.default_gateway.trim();
    !gw.is_empty() && gw != "0.0.0.0" && gw != "::"
}

/// Index of the adapter that best represents the target.
///
/// Among connected adapters with an address: the one whose IP is the
/// target itself, else the first wired one with a gateway, else the first
/// wired one, else the first at all.
pub fn select_primary(adapters: &[RawAdapter], target: &Target) -> Option<usize> {
    let live: Vec<usize> = adapters
        .iter()
        .enumerate()
        .filter(|(_, a)| a.connected && !a.ip_address.trim().is_empty())
        .map(|(i, _)| i)
        .collect();

    if let Some(ip) = target.as_ip() {
        let hit = live.iter().copied().find(|&i| adapters[i].ip_address.trim().parse().ok() == Some(ip));
        if hit.is_some() {
            return hit;
        }
    }
    live.iter()
        .copied()
        .find(|&i| !adapters[i].wireless && has_gateway(&adapters[i]))
        .or_else(|| live.iter().copied().find(|&i| !adapters[i].wireless))
        .or_else(|| live.first().copied())
}

/// First and second DNS server; anything after the second is dropped.
pub fn split_dns(raw: &str) -> (String, String) {
    let mut it = raw
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let primary = it.next().unwrap_or_default().to_string();
    let secondary = it.next().unwrap_or_default().to_string();
    (primary, secondary)
}

fn summarize_network(adapters: &[RawAdapter], target: &Target) -> NetworkSummary {
    let primary_idx = select_primary(adapters, target);
    let primary = primary_idx.map(|i| {
        let a = &adapters[i];
        let (dns_primary, dns_secondary) = split_dns(&a.dns_servers);
        PrimaryAdapter {
            name: a.name.trim().to_string(),
            ip_address: a.ip_address.trim().to_string(),
            mac_address: a.mac_address.trim().to_string(),
            subnet_mask: a.subnet_mask.trim().to_string(),
            default_gateway: a.default_gateway.trim().to_string(),
            dns_primary,
            dns_secondary,
            wireless: a.wireless,
        }
    });
    let secondary = adapters
        .iter()
        .enumerate()
        .filter(|(i, a)| Some(*i) != primary_idx && a.connected && !a.ip_address.trim().is_empty())
        .take(MAX_SECONDARY_ADAPTERS)
        .map(|(_, a)| AdapterSlot { name: opt(&a.name), ip_address: opt(&a.ip_address), mac_address: opt(&a.mac_address) })
        .collect();
    NetworkSummary { primary, secondary }
}

fn summarize_drives(disks: &[RawDisk]) -> Vec<Drive> {
    disks
        .iter()
        .take(MAX_DRIVES)
        .map(|d| Drive {
            name: opt(&d.name),
            capacity_gb: parse_capacity_gb(&d.capacity).map(round2),
            kind: opt(&d.kind),
            model: opt(&d.model),
        })
        .collect()
}

pub fn normalize(raw: RawFacts) -> Snapshot {
    let memory = raw.memory.map(|modules| {
        let total: f64 = modules.iter().filter_map(|m| parse_capacity_gb(&m.capacity)).sum();
        MemorySummary { modules, total_ram_gb: round2(total) }
    });
    let network = match &raw.network {
        Gathered::Available(adapters) => Gathered::Available(summarize_network(adapters, &raw.target)),
        Gathered::Unavailable(r) => Gathered::Unavailable(r.clone()),
    };
    Snapshot {
        computer_name: raw.computer_name.trim().to_string(),
        hardware: raw.hardware,
        memory,
        drives: raw.storage.map(|d| summarize_drives(&d)),
        os: raw.os,
        network,
        domain: raw.domain,
        captured_at: raw.collected_at,
        target: raw.target,
    }
}
