//! Checks run on a record before it may be persisted.

use regex::Regex;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::OnceLock;

use crate::error::ValidationError;
use crate::model::DeviceRecord;

fn mac_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}$").expect("static regex"))
}

pub fn is_valid_mac(s: &str) -> bool {
    mac_re().is_match(s)
}

/// Plain addresses, plus scoped IPv6 such as `fe80::1%eth0` as found in
/// resolv.conf.
fn is_valid_ip(s: &str) -> bool {
    match s.split_once('%') {
        Some((addr, zone)) => !zone.is_empty() && addr.parse::<Ipv6Addr>().is_ok(),
        None => s.parse::<IpAddr>().is_ok(),
    }
}

fn check_ip(field: &str, v: Option<&String>) -> Result<(), ValidationError> {
    match v.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(s) if !is_valid_ip(s) => Err(ValidationError::InvalidIp { field: field.to_string(), value: s.to_string() }),
        _ => Ok(()),
    }
}

fn check_mac(field: &str, v: Option<&String>) -> Result<(), ValidationError> {
    match v.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(s) if !is_valid_mac(s) => Err(ValidationError::InvalidMac { field: field.to_string(), value: s.to_string() }),
        _ => Ok(()),
    }
}

/// Hostname must be present; address fields, when set, must be well formed.
pub fn validate_record(r: &DeviceRecord) -> Result<(), ValidationError> {
    if r.hostname.trim().is_empty() {
        return Err(ValidationError::MissingHostname);
    }
    check_ip("IpAddress", r.ip_address.as_ref())?;
    check_ip("SubnetMask", r.subnet_mask.as_ref())?;
    check_ip("DefaultGateway", r.default_gateway.as_ref())?;
    check_ip("DnsPrimary", r.dns_primary.as_ref())?;
    check_ip("DnsSecondary", r.dns_secondary.as_ref())?;
    check_mac("MacAddress", r.mac_address.as_ref())?;
    for (i, a) in r.secondary_adapters.iter().enumerate() {
        check_ip(&format!("SecondaryAdapter[{i}].IpAddress"), a.ip_address.as_ref())?;
        check_mac(&format!("SecondaryAdapter[{i}].MacAddress"), a.mac_address.as_ref())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AdapterSlot;

    fn record() -> DeviceRecord {
        DeviceRecord {
            hostname: "WKS-01".into(),
            ip_address: Some("10.0.0.5".into()),
            mac_address: Some("00:1A:2b:3c:4D:5e".into()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_a_well_formed_record() {
        assert_eq!(validate_record(&record()), Ok(()));
    }

    #[test]
    fn hostname_is_required() {
        let r = DeviceRecord { hostname: "  ".into(), ..record() };
        assert_eq!(validate_record(&r), Err(ValidationError::MissingHostname));
    }

    #[test]
    fn rejects_bad_addresses() {
        let r = DeviceRecord { ip_address: Some("10.0.0.500".into()), ..record() };
        assert!(matches!(validate_record(&r), Err(ValidationError::InvalidIp { .. })));

        let r = DeviceRecord { mac_address: Some("00:1A:2B:3C:4D".into()), ..record() };
        assert!(matches!(validate_record(&r), Err(ValidationError::InvalidMac { .. })));

        let r = DeviceRecord {
            secondary_adapters: vec![AdapterSlot { mac_address: Some("zz-zz-zz-zz-zz-zz".into()), ..Default::default() }],
            ..record()
        };
        assert!(matches!(validate_record(&r), Err(ValidationError::InvalidMac { field, .. }) if field == "SecondaryAdapter[0].MacAddress"));
    }

    #[test]
    fn scoped_ipv6_dns_is_accepted() {
        let r = DeviceRecord { dns_primary: Some("fe80::1%eth0".into()), dns_secondary: Some("10.0.0.3".into()), ..record() };
        assert_eq!(validate_record(&r), Ok(()));

        for bad in ["fe80::1%", "10.0.0.2%eth0", "nope%eth0"] {
            let r = DeviceRecord { dns_primary: Some(bad.into()), ..record() };
            assert!(matches!(validate_record(&r), Err(ValidationError::InvalidIp { .. })), "{bad}");
        }
    }

    #[test]
    fn dash_separated_macs_are_valid() {
        assert!(is_valid_mac("00-1A-2B-3C-4D-5E"));
        assert!(!is_valid_mac("001A2B3C4D5E"));
    }
}
