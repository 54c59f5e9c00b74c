//! Per-group collection scripts and the parsers for their output.
//!
//! Each fact group is one self-contained shell snippet so that a failure in
//! one (missing tool, unreadable file) cannot take the others down.

use anyhow::{anyhow, bail, Result};
use inventory_core::{HardwareFacts, MemoryModule, OsFacts, RawAdapter, RawDisk};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const IDENTITY: &str = "hostname";

pub const HARDWARE: &str = r#"for f in sys_vendor product_name product_serial chassis_asset_tag bios_version; do printf '%s=' "$f"; cat "/sys/class/dmi/id/$f" 2>/dev/null || echo; done; printf 'cpu='; grep -m1 'model name' /proc/cpuinfo | cut -d: -f2-"#;

pub const MEMORY: &str = "dmidecode -t 17 2>/dev/null; echo '@@meminfo'; grep MemTotal /proc/meminfo";

pub const STORAGE: &str = "lsblk -J -b -d -o NAME,SIZE,TYPE,MODEL,ROTA,TRAN";

pub const OS: &str = r#"cat /etc/os-release; echo "ARCH=$(uname -m)"; echo "INSTALLED=$(stat -c %W / 2>/dev/null)""#;

pub const NETWORK: &str = r#"ip -j addr show; echo; echo '@@route'; ip -j route show default 2>/dev/null; echo; echo '@@dns'; grep '^nameserver' /etc/resolv.conf 2>/dev/null; echo '@@wireless'; for i in /sys/class/net/*; do [ -d "$i/wireless" ] && basename "$i"; done; true"#;

pub const DOMAIN: &str = "hostname -d 2>/dev/null; true";

const WORKGROUP: &str = "WORKGROUP";

fn key_values(out: &str) -> HashMap<String, String> {
    out.lines()
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().trim_matches('"').trim().to_string()))
        .collect()
}

/// Split `out` on `@@name` marker lines.
fn sections(out: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let mut current = String::new();
    let mut buf = String::new();
    for line in out.lines() {
        if let Some(name) = line.trim().strip_prefix("@@") {
            map.insert(std::mem::take(&mut current), std::mem::take(&mut buf));
            current = name.to_string();
        } else {
            buf.push_str(line);
            buf.push('\n');
        }
    }
    map.insert(current, buf);
    map
}

pub fn parse_identity(out: &str) -> Result<String> {
    let name = out.lines().next().unwrap_or("").trim();
    if name.is_empty() {
        bail!("hostname returned nothing");
    }
    Ok(name.to_string())
}

pub fn parse_hardware(out: &str) -> Result<HardwareFacts> {
    let kv = key_values(out);
    let get = |k: &str| kv.get(k).cloned().unwrap_or_default();
    let hw = HardwareFacts {
        manufacturer: get("sys_vendor"),
        model: get("product_name"),
        serial_number: get("product_serial"),
        asset_tag: get("chassis_asset_tag"),
        bios_version: get("bios_version"),
        processor: get("cpu"),
    };
    if hw == HardwareFacts::default() {
        bail!("no DMI or CPU data readable");
    }
    Ok(hw)
}

fn dmidecode_modules(text: &str) -> Vec<MemoryModule> {
    let mut modules = Vec::new();
    for block in text.split("\n\n") {
        if !block.lines().any(|l| l.trim() == "Memory Device") {
            continue;
        }
        let mut m = MemoryModule::default();
        for line in block.lines() {
            let Some((k, v)) = line.trim().split_once(':') else { continue };
            let v = v.trim().to_string();
            match k.trim() {
                "Size" => m.capacity = v,
                "Type" => m.kind = v,
                "Speed" => m.speed = v,
                "Manufacturer" => m.manufacturer = v,
                _ => {}
            }
        }
        let empty_slot = m.capacity.is_empty() || m.capacity.starts_with("No Module") || m.capacity == "Not Installed";
        if !empty_slot {
            modules.push(m);
        }
    }
    modules
}

/// DMI memory devices when readable (needs root), otherwise one pseudo
/// module carrying the kernel's `MemTotal`.
pub fn parse_memory(out: &str) -> Result<Vec<MemoryModule>> {
    let secs = sections(out);
    let modules = dmidecode_modules(secs.get("").map(String::as_str).unwrap_or(""));
    if !modules.is_empty() {
        return Ok(modules);
    }
    let meminfo = secs.get("meminfo").map(String::as_str).unwrap_or("");
    let total = meminfo
        .lines()
        .find_map(|l| l.strip_prefix("MemTotal:"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("no memory information available"))?;
    Ok(vec![MemoryModule { capacity: total.to_string(), kind: "Unknown".into(), ..Default::default() }])
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn as_flag(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_u64() == Some(1),
        Value::String(s) => s == "1" || s == "true",
        _ => false,
    }
}

pub fn parse_storage(out: &str) -> Result<Vec<RawDisk>> {
    let doc: Value = serde_json::from_str(out.trim())?;
    let devices = doc
        .get("blockdevices")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("lsblk output has no blockdevices"))?;
    let mut disks = Vec::new();
    for d in devices {
        if d.get("type").map(as_text).as_deref() != Some("disk") {
            continue;
        }
        let tran = d.get("tran").map(as_text).unwrap_or_default();
        let kind = if tran.eq_ignore_ascii_case("nvme") {
            "NVMe SSD"
        } else if d.get("rota").map(as_flag).unwrap_or(false) {
            "HDD"
        } else {
            "SSD"
        };
        disks.push(RawDisk {
            name: d.get("name").map(as_text).unwrap_or_default(),
            // lsblk -b reports bytes
            capacity: d.get("size").map(as_text).unwrap_or_default(),
            kind: kind.to_string(),
            model: d.get("model").map(as_text).unwrap_or_default(),
        });
    }
    Ok(disks)
}

pub fn parse_os(out: &str) -> Result<OsFacts> {
    let kv = key_values(out);
    let name = kv
        .get("NAME")
        .or_else(|| kv.get("PRETTY_NAME"))
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| anyhow!("os-release unreadable"))?;
    let version = kv.get("VERSION_ID").or_else(|| kv.get("VERSION")).cloned().unwrap_or_default();
    let install_date = kv
        .get("INSTALLED")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|secs| *secs > 0)
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_default();
    Ok(OsFacts {
        name,
        version,
        architecture: kv.get("ARCH").cloned().unwrap_or_default(),
        install_date,
    })
}

fn prefix_to_mask(prefix: u64) -> String {
    let bits = prefix.min(32) as u32;
    let mask = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };
    Ipv4Addr::from(mask).to_string()
}

pub fn parse_network(out: &str) -> Result<Vec<RawAdapter>> {
    let secs = sections(out);
    let addr_json = secs.get("").map(|s| s.trim()).unwrap_or("");
    let links: Vec<Value> = serde_json::from_str(addr_json).map_err(|e| anyhow!("ip addr output unreadable: {e}"))?;

    let routes: Vec<Value> = secs
        .get("route")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();
    let mut gateways: HashMap<String, String> = HashMap::new();
    for r in &routes {
        if let (Some(dev), Some(gw)) = (r.get("dev").map(as_text), r.get("gateway").map(as_text)) {
            gateways.entry(dev).or_insert(gw);
        }
    }

    let dns = secs
        .get("dns")
        .map(|s| {
            s.lines()
                .filter_map(|l| l.trim().strip_prefix("nameserver"))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default();

    let wireless: HashSet<String> = secs
        .get("wireless")
        .map(|s| s.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect())
        .unwrap_or_default();

    let mut adapters = Vec::new();
    for link in &links {
        if link.get("link_type").map(as_text).as_deref() == Some("loopback") {
            continue;
        }
        let name = link.get("ifname").map(as_text).unwrap_or_default();
        let inet = link
            .get("addr_info")
            .and_then(Value::as_array)
            .and_then(|a| a.iter().find(|i| i.get("family").map(as_text).as_deref() == Some("inet")));
        let ip = inet.and_then(|i| i.get("local")).map(as_text).unwrap_or_default();
        let subnet = inet
            .and_then(|i| i.get("prefixlen"))
            .and_then(Value::as_u64)
            .map(prefix_to_mask)
            .unwrap_or_default();
        let state = link.get("operstate").map(as_text).unwrap_or_default();
        let connected = state == "UP" || (state == "UNKNOWN" && !ip.is_empty());
        adapters.push(RawAdapter {
            ip_address: ip,
            mac_address: link.get("address").map(as_text).unwrap_or_default(),
            subnet_mask: subnet,
            dns_servers: dns.clone(),
            default_gateway: gateways.get(&name).cloned().unwrap_or_default(),
            connected,
            wireless: wireless.contains(&name),
            name,
        });
    }
    Ok(adapters)
}

pub fn parse_domain(out: &str) -> Result<String> {
    let d = out.lines().next().unwrap_or("").trim();
    if d.is_empty() || d == "(none)" {
        Ok(WORKGROUP.to_string())
    } else {
        Ok(d.to_string())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const HARDWARE_OUT: &str = "sys_vendor=Dell Inc.\nproduct_name=OptiPlex 7090\nproduct_serial=\nchassis_asset_tag=AT-4471\nbios_version=2.14.0\ncpu= Intel(R) Core(TM) i7-10700 CPU @ 2.90GHz\n";

    pub const MEMORY_OUT: &str = "# dmidecode 3.3\nGetting SMBIOS data from sysfs.\n\nHandle 0x0040, DMI type 17, 92 bytes\nMemory Device\n\tSize: 8 GB\n\tType: DDR4\n\tSpeed: 3200 MT/s\n\tManufacturer: Samsung\n\nHandle 0x0041, DMI type 17, 92 bytes\nMemory Device\n\tSize: No Module Installed\n\tType: Unknown\n\nHandle 0x0042, DMI type 17, 92 bytes\nMemory Device\n\tSize: 8192 MB\n\tType: DDR4\n\tSpeed: 3200 MT/s\n\tManufacturer: Hynix\n\n@@meminfo\nMemTotal:       16318480 kB\n";

    pub const STORAGE_OUT: &str = r#"{"blockdevices": [
        {"name":"nvme0n1","size":512110190592,"type":"disk","model":"Samsung SSD 980","rota":false,"tran":"nvme"},
        {"name":"sda","size":"2000398934016","type":"disk","model":"ST2000DM008","rota":"1","tran":"sata"},
        {"name":"sr0","size":1073741312,"type":"rom","model":"DVD","rota":true,"tran":"sata"}
    ]}"#;

    pub const OS_OUT: &str = "NAME=\"Ubuntu\"\nVERSION=\"22.04.3 LTS (Jammy Jellyfish)\"\nVERSION_ID=\"22.04\"\nPRETTY_NAME=\"Ubuntu 22.04.3 LTS\"\nARCH=x86_64\nINSTALLED=1700000000\n";

    pub const NETWORK_OUT: &str = r#"[{"ifindex":1,"ifname":"lo","link_type":"loopback","operstate":"UNKNOWN","address":"00:00:00:00:00:00","addr_info":[{"family":"inet","local":"127.0.0.1","prefixlen":8}]},
 {"ifindex":2,"ifname":"eno1","link_type":"ether","operstate":"UP","address":"3c:7c:3f:1e:22:10","addr_info":[{"family":"inet","local":"10.0.0.5","prefixlen":24},{"family":"inet6","local":"fe80::1","prefixlen":64}]},
 {"ifindex":3,"ifname":"wlp2s0","link_type":"ether","operstate":"UP","address":"a4:b1:c1:00:11:22","addr_info":[{"family":"inet","local":"192.168.1.40","prefixlen":24}]},
 {"ifindex":4,"ifname":"enp5s0","link_type":"ether","operstate":"DOWN","address":"3c:7c:3f:1e:22:11","addr_info":[]}]

@@route
[{"dst":"default","gateway":"10.0.0.1","dev":"eno1","protocol":"dhcp"}]

@@dns
nameserver 10.0.0.2
nameserver 10.0.0.3
nameserver 1.1.1.1
@@wireless
wlp2s0
"#;
}
