//! Comparable fields of a device record.
//!
//! Every field the differencer and planner touch is named here once, with
//! the fact group it comes from, how its value renders for comparison, and
//! how it is copied between records. Secondary adapters and drives are
//! addressed by slot instead of by numbered field names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::{DeviceRecord, MAX_DRIVES, MAX_SECONDARY_ADAPTERS};

/// Independent group of facts fetched by a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactGroup {
    Identity,
    Hardware,
    Memory,
    Storage,
    Os,
    Network,
    Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AdapterAttr {
    Name,
    IpAddress,
    MacAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DriveAttr {
    Name,
    CapacityGb,
    Kind,
    Model,
}

const ADAPTER_ATTRS: [AdapterAttr; 3] = [AdapterAttr::Name, AdapterAttr::IpAddress, AdapterAttr::MacAddress];
const DRIVE_ATTRS: [DriveAttr; 4] = [DriveAttr::Name, DriveAttr::CapacityGb, DriveAttr::Kind, DriveAttr::Model];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Field {
    Hostname,
    Manufacturer,
    Model,
    SerialNumber,
    AssetTag,
    BiosVersion,
    Processor,
    TotalRamGb,
    OsName,
    OsVersion,
    OsArchitecture,
    OsInstallDate,
    Domain,
    AdapterName,
    IpAddress,
    MacAddress,
    SubnetMask,
    DefaultGateway,
    DnsPrimary,
    DnsSecondary,
    Wireless,
    SecondaryAdapter(u8, AdapterAttr),
    Drive(u8, DriveAttr),
}

const SCALARS: [Field; 21] = [
    Field::Hostname,
    Field::Manufacturer,
    Field::Model,
    Field::SerialNumber,
    Field::AssetTag,
    Field::BiosVersion,
    Field::Processor,
    Field::TotalRamGb,
    Field::OsName,
    Field::OsVersion,
    Field::OsArchitecture,
    Field::OsInstallDate,
    Field::Domain,
    Field::AdapterName,
    Field::IpAddress,
    Field::MacAddress,
    Field::SubnetMask,
    Field::DefaultGateway,
    Field::DnsPrimary,
    Field::DnsSecondary,
    Field::Wireless,
];

impl Field {
    /// Every comparable field in report order.
    pub fn all() -> Vec<Field> {
        let mut out = SCALARS.to_vec();
        for slot in 0..MAX_SECONDARY_ADAPTERS as u8 {
            out.extend(ADAPTER_ATTRS.iter().map(|a| Field::SecondaryAdapter(slot, *a)));
        }
        for slot in 0..MAX_DRIVES as u8 {
            out.extend(DRIVE_ATTRS.iter().map(|a| Field::Drive(slot, *a)));
        }
        out
    }

    pub fn name(&self) -> String {
        match self {
            Field::SecondaryAdapter(slot, attr) => format!("SecondaryAdapter[{slot}].{attr:?}"),
            Field::Drive(slot, attr) => format!("Drive[{slot}].{attr:?}"),
            scalar => format!("{scalar:?}"),
        }
    }

    pub fn group(&self) -> FactGroup {
        match self {
            Field::Hostname => FactGroup::Identity,
            Field::Manufacturer
            | Field::Model
            | Field::SerialNumber
            | Field::AssetTag
            | Field::BiosVersion
            | Field::Processor => FactGroup::Hardware,
            Field::TotalRamGb => FactGroup::Memory,
            Field::OsName | Field::OsVersion | Field::OsArchitecture | Field::OsInstallDate => FactGroup::Os,
            Field::Domain => FactGroup::Domain,
            Field::Drive(..) => FactGroup::Storage,
            _ => FactGroup::Network,
        }
    }

    /// Comparison form of this field on `r`. Blank text and zero capacities
    /// read as absent.
    pub fn value(&self, r: &DeviceRecord) -> Option<String> {
        match *self {
            Field::Hostname => text(Some(&r.hostname)),
            Field::Manufacturer => text(r.manufacturer.as_ref()),
            Field::Model => text(r.model.as_ref()),
            Field::SerialNumber => text(r.serial_number.as_ref()),
            Field::AssetTag => text(r.asset_tag.as_ref()),
            Field::BiosVersion => text(r.bios_version.as_ref()),
            Field::Processor => text(r.processor.as_ref()),
            Field::TotalRamGb => gb(r.total_ram_gb),
            Field::OsName => text(r.os_name.as_ref()),
            Field::OsVersion => text(r.os_version.as_ref()),
            Field::OsArchitecture => text(r.os_architecture.as_ref()),
            Field::OsInstallDate => text(r.os_install_date.as_ref()),
            Field::Domain => text(r.domain.as_ref()),
            Field::AdapterName => text(r.adapter_name.as_ref()),
            Field::IpAddress => text(r.ip_address.as_ref()),
            Field::MacAddress => text(r.mac_address.as_ref()),
            Field::SubnetMask => text(r.subnet_mask.as_ref()),
            Field::DefaultGateway => text(r.default_gateway.as_ref()),
            Field::DnsPrimary => text(r.dns_primary.as_ref()),
            Field::DnsSecondary => text(r.dns_secondary.as_ref()),
            Field::Wireless => r.wireless.map(|w| w.to_string()),
            Field::SecondaryAdapter(slot, attr) => {
                let a = r.secondary_adapters.get(slot as usize)?;
                match attr {
                    AdapterAttr::Name => text(a.name.as_ref()),
                    AdapterAttr::IpAddress => text(a.ip_address.as_ref()),
                    AdapterAttr::MacAddress => text(a.mac_address.as_ref()),
                }
            }
            Field::Drive(slot, attr) => {
                let d = r.drives.get(slot as usize)?;
                match attr {
                    DriveAttr::Name => text(d.name.as_ref()),
                    DriveAttr::CapacityGb => gb(d.capacity_gb),
                    DriveAttr::Kind => text(d.kind.as_ref()),
                    DriveAttr::Model => text(d.model.as_ref()),
                }
            }
        }
    }

    /// Overwrite this field on `to` with its value on `from`.
    pub fn copy(&self, from: &DeviceRecord, to: &mut DeviceRecord) {
        match *self {
            Field::Hostname => to.hostname = from.hostname.clone(),
            Field::Manufacturer => to.manufacturer = from.manufacturer.clone(),
            Field::Model => to.model = from.model.clone(),
            Field::SerialNumber => to.serial_number = from.serial_number.clone(),
            Field::AssetTag => to.asset_tag = from.asset_tag.clone(),
            Field::BiosVersion => to.bios_version = from.bios_version.clone(),
            Field::Processor => to.processor = from.processor.clone(),
            Field::TotalRamGb => to.total_ram_gb = from.total_ram_gb,
            Field::OsName => to.os_name = from.os_name.clone(),
            Field::OsVersion => to.os_version = from.os_version.clone(),
            Field::OsArchitecture => to.os_architecture = from.os_architecture.clone(),
            Field::OsInstallDate => to.os_install_date = from.os_install_date.clone(),
            Field::Domain => to.domain = from.domain.clone(),
            Field::AdapterName => to.adapter_name = from.adapter_name.clone(),
            Field::IpAddress => to.ip_address = from.ip_address.clone(),
            Field::MacAddress => to.mac_address = from.mac_address.clone(),
            Field::SubnetMask => to.subnet_mask = from.subnet_mask.clone(),
            Field::DefaultGateway => to.default_gateway = from.default_gateway.clone(),
            Field::DnsPrimary => to.dns_primary = from.dns_primary.clone(),
            Field::DnsSecondary => to.dns_secondary = from.dns_secondary.clone(),
            Field::Wireless => to.wireless = from.wireless,
            Field::SecondaryAdapter(slot, attr) => {
                let src = from.secondary_adapters.get(slot as usize).cloned().unwrap_or_default();
                let dst = slot_mut(&mut to.secondary_adapters, slot as usize);
                match attr {
                    AdapterAttr::Name => dst.name = src.name,
                    AdapterAttr::IpAddress => dst.ip_address = src.ip_address,
                    AdapterAttr::MacAddress => dst.mac_address = src.mac_address,
                }
                while to.secondary_adapters.last().is_some_and(|a| a.is_empty()) {
                    to.secondary_adapters.pop();
                }
            }
            Field::Drive(slot, attr) => {
                let src = from.drives.get(slot as usize).cloned().unwrap_or_default();
                let dst = slot_mut(&mut to.drives, slot as usize);
                match attr {
                    DriveAttr::Name => dst.name = src.name,
                    DriveAttr::CapacityGb => dst.capacity_gb = src.capacity_gb,
                    DriveAttr::Kind => dst.kind = src.kind,
                    DriveAttr::Model => dst.model = src.model,
                }
                while to.drives.last().is_some_and(|d| d.is_empty()) {
                    to.drives.pop();
                }
            }
        }
    }
}

fn slot_mut<T: Default>(v: &mut Vec<T>, i: usize) -> &mut T {
    if v.len() <= i {
        v.resize_with(i + 1, T::default);
    }
    &mut v[i]
}

fn text(v: Option<&String>) -> Option<String> {
    v.map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

fn gb(v: Option<f64>) -> Option<String> {
    v.filter(|x| x.is_finite() && *x > 0.0).map(format_gb)
}

/// Render a capacity rounded to two decimals, without trailing zeros.
pub fn format_gb(v: f64) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    format!("{rounded}")
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Field {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Field::all()
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("unknown field: {s}"))
    }
}

impl From<Field> for String {
    fn from(f: Field) -> Self {
        f.name()
    }
}

impl TryFrom<String> for Field {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
