//! Deciding whether a target names this machine.

use inventory_core::Target;
use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct HostRouter {
    /// Full local names, lowercased.
    local_names: Vec<String>,
    /// First labels of dotted local names; only a bare target may match these.
    short_names: Vec<String>,
}

impl HostRouter {
    /// Loopback aliases, this machine's hostname, and any extra aliases.
    pub fn detect(extra_aliases: &[String]) -> Self {
        let mut names: Vec<String> = extra_aliases.to_vec();
        if let Some(h) = local_hostname() {
            names.push(h);
        }
        Self::with_names(names)
    }

    pub fn with_names(names: impl IntoIterator<Item = String>) -> Self {
        let mut local_names: Vec<String> = ["localhost", ".", "127.0.0.1", "::1"].iter().map(|s| s.to_string()).collect();
        let mut short_names = Vec::new();
        for n in names {
            let n = n.trim().to_ascii_lowercase();
            if n.is_empty() || local_names.contains(&n) {
                continue;
            }
            if n.parse::<IpAddr>().is_err() {
                if let Some((short, _)) = n.split_once('.') {
                    if !short.is_empty() && !short_names.iter().any(|s| s == short) {
                        short_names.push(short.to_string());
                    }
                }
            }
            local_names.push(n);
        }
        HostRouter { local_names, short_names }
    }

    /// A dotted target must match a local name exactly; a bare target may
    /// also match the first label of a local FQDN.
    pub fn is_local(&self, target: &Target) -> bool {
        if let Some(ip) = target.as_ip() {
            return ip.is_loopback() || self.local_names.contains(&ip.to_string());
        }
        let raw = target.as_str();
        let t = raw.strip_suffix('.').filter(|s| !s.is_empty()).unwrap_or(raw).to_ascii_lowercase();
        if self.local_names.contains(&t) {
            return true;
        }
        !t.contains('.') && self.short_names.contains(&t)
    }
}

fn local_hostname() -> Option<String> {
    let name = hostname::get().ok()?.to_string_lossy().trim().to_string();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Target {
        Target::parse(s).unwrap()
    }

    #[test]
    fn loopback_aliases_are_local() {
        let r = HostRouter::with_names(Vec::new());
        assert!(r.is_local(&t("localhost")));
        assert!(r.is_local(&t("LOCALHOST")));
        assert!(r.is_local(&t("127.0.0.1")));
        assert!(r.is_local(&t("127.0.1.1")));
        assert!(r.is_local(&t("::1")));
        assert!(r.is_local(&t(".")));
        assert!(!r.is_local(&t("10.0.0.5")));
    }

    #[test]
    fn own_name_matches_with_or_without_domain() {
        let r = HostRouter::with_names(vec!["WKS-01.corp.example".to_string(), "10.0.0.5".to_string()]);
        assert!(r.is_local(&t("wks-01")));
        assert!(r.is_local(&t("WKS-01.corp.example")));
        assert!(r.is_local(&t("10.0.0.5")));
        assert!(!r.is_local(&t("wks-02")));
        assert!(!r.is_local(&t("10.0.0.6")));
    }

    #[test]
    fn same_short_name_in_another_domain_is_remote() {
        let r = HostRouter::with_names(vec!["WKS-01.corp.example".to_string()]);
        assert!(!r.is_local(&t("wks-01.branch.example")));
        assert!(!r.is_local(&t("wks-01.corp")));
        assert!(r.is_local(&t("wks-01.corp.example.")));

        // a short local name says nothing about any domain
        let r = HostRouter::with_names(vec!["wks-01".to_string()]);
        assert!(r.is_local(&t("WKS-01")));
        assert!(!r.is_local(&t("wks-01.corp.example")));
    }

    #[test]
    fn detect_includes_this_machine() {
        let r = HostRouter::detect(&[]);
        if let Some(h) = local_hostname() {
            assert!(r.is_local(&t(&h)));
        }
    }
}
