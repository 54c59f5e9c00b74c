//! Seams between the engine and its collaborators.

use async_trait::async_trait;

use crate::error::{CollectionError, EngineError};
use crate::model::{DeviceRecord, DiscoverySession, RawFacts};
use crate::Target;

/// Source of raw inventory facts for a target, local or remote.
#[async_trait]
pub trait FactSource: Send + Sync {
    async fn collect(&self, target: &Target) -> Result<RawFacts, CollectionError>;
}

/// Read side of the device inventory.
pub trait DeviceStore: Send + Sync {
    fn get_by_hostname(&self, hostname: &str) -> Result<Option<DeviceRecord>, EngineError>;
    fn search(&self, query: &str) -> Result<Vec<DeviceRecord>, EngineError>;
    fn list(&self) -> Result<Vec<DeviceRecord>, EngineError>;
}

/// Who is changing the inventory, under which session, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeContext {
    pub actor: String,
    pub session: Option<DiscoverySession>,
    pub reason: String,
}

impl ChangeContext {
    pub fn new(actor: impl Into<String>, session: Option<DiscoverySession>, reason: impl Into<String>) -> Self {
        ChangeContext { actor: actor.into(), session, reason: reason.into() }
    }

    pub fn has_reason(&self) -> bool {
        !self.reason.trim().is_empty()
    }
}

/// Write side of the inventory. Each call is one transaction and appends
/// its audit rows in that same transaction.
pub trait AuditedStore: DeviceStore {
    /// Insert a new device. Fails on a live hostname clash.
    fn add(&self, record: &DeviceRecord, ctx: &ChangeContext) -> Result<DeviceRecord, EngineError>;

    /// Overwrite a live device, one audit row per changed field. Returns
    /// the number of fields that changed.
    fn update(&self, record: &DeviceRecord, ctx: &ChangeContext) -> Result<usize, EngineError>;

    /// Archive then remove a live device. Returns the archived record.
    fn delete(&self, hostname: &str, ctx: &ChangeContext) -> Result<DeviceRecord, EngineError>;

    /// Note that a device was scanned and matched its stored record.
    fn record_discovery(&self, record: &DeviceRecord, ctx: &ChangeContext) -> Result<(), EngineError>;

    fn record_scan_error(&self, session: DiscoverySession, target: &str, code: &str, message: &str) -> Result<(), EngineError>;
}

/// Identity of the operator, written verbatim as the audit actor.
pub trait ActorProvider: Send + Sync {
    fn actor(&self) -> String;
}

/// Reads `INVENTORY_ACTOR`, then `USER`/`USERNAME`.
#[derive(Debug, Default, Clone)]
pub struct EnvActor;

impl ActorProvider for EnvActor {
    fn actor(&self) -> String {
        ["INVENTORY_ACTOR", "USER", "USERNAME"]
            .iter()
            .find_map(|k| std::env::var(k).ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_reason_is_not_a_reason() {
        assert!(!ChangeContext::new("ops", None, "  \t").has_reason());
        assert!(ChangeContext::new("ops", None, "RAM upgraded").has_reason());
    }

    #[test]
    fn env_actor_never_returns_blank() {
        assert!(!EnvActor.actor().trim().is_empty());
    }
}
