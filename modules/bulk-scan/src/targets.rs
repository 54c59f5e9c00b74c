//! Parsing bulk target lists.

use anyhow::{Context, Result};
use inventory_core::{Target, ValidationError};
use ipnet::IpNet;
use std::collections::HashSet;
use std::path::Path;

/// Larger networks are almost certainly a typo.
pub const MAX_CIDR_HOSTS: usize = 4096;

/// Split a target list on newlines, commas and semicolons. `#` starts a
/// comment, blanks and repeats are dropped (first occurrence wins) and a
/// CIDR block expands to its host addresses.
pub fn parse_targets(text: &str) -> Result<Vec<Target>, ValidationError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or_default();
        for entry in line.split([',', ';']).map(str::trim).filter(|e| !e.is_empty()) {
            for t in expand(entry)? {
                if seen.insert(t.clone()) {
                    out.push(Target(t));
                }
            }
        }
    }
    if out.is_empty() {
        return Err(ValidationError::EmptyTargetList);
    }
    Ok(out)
}

fn expand(entry: &str) -> Result<Vec<String>, ValidationError> {
    if !entry.contains('/') {
        return Ok(vec![entry.to_string()]);
    }
    let bad = |detail: String| ValidationError::BadTargetEntry { entry: entry.to_string(), detail };
    let net = entry.parse::<IpNet>().map_err(|e| bad(e.to_string()))?;
    let hosts: Vec<String> = net.hosts().take(MAX_CIDR_HOSTS + 1).map(|ip| ip.to_string()).collect();
    if hosts.len() > MAX_CIDR_HOSTS {
        return Err(bad(format!("more than {MAX_CIDR_HOSTS} hosts")));
    }
    Ok(hosts)
}

/// Read and parse a UTF-8 target list file.
pub fn read_target_file(path: &Path) -> Result<Vec<Target>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading target list {}", path.display()))?;
    Ok(parse_targets(&text)?)
}
