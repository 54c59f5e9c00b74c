//! Core types shared by the discovery engine: the inventory data model,
//! the error taxonomy, field identities, validation and the store seams.

pub mod error;
pub mod field;
pub mod model;
pub mod ratelimiter;
pub mod store;
pub mod validate;

pub use error::{CollectionError, EngineError, ValidationError};
pub use field::{AdapterAttr, DriveAttr, FactGroup, Field};
pub use model::*;
pub use store::{ActorProvider, AuditedStore, ChangeContext, DeviceStore, EnvActor, FactSource};

use std::net::IpAddr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Current UTC time as an RFC 3339 string. Every timestamp in the
/// inventory is stored in this form.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// A scan target: hostname or IP literal, never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Target(pub String);

impl Target {
    pub fn parse(raw: &str) -> Result<Self, CollectionError> {
        let t = raw.trim();
        if t.is_empty() {
            return Err(CollectionError::InvalidTarget);
        }
        Ok(Target(t.to_string()))
    }

    /// The target as an IP address, if it was given as one.
    pub fn as_ip(&self) -> Option<IpAddr> {
        self.0.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
