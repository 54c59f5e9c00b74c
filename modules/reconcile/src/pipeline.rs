//! Single-target discovery: collect, normalize, compare, then apply.

use inventory_core::validate::validate_record;
use inventory_core::{
    AuditedStore, ChangeContext, ComparisonResult, DeviceRecord, DeviceStore, DiscoveryMethod, EngineError,
    FactSource, Field, Target,
};
use tracing::{debug, info};

use crate::diff::compare;
use crate::normalize::normalize;
use crate::plan::{plan, Selection};

/// What [`apply`] did to the inventory.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Added(DeviceRecord),
    /// Number of fields written.
    Updated(usize),
    Unchanged,
}

/// Collect `target` and compare it against whatever the store holds for
/// the reported computer name (or, failing that, the target string).
pub async fn scan_one<F, S>(source: &F, store: &S, target: &Target) -> Result<ComparisonResult, EngineError>
where
    F: FactSource + ?Sized,
    S: DeviceStore + ?Sized,
{
    let raw = source.collect(target).await?;
    let snapshot = normalize(raw);
    let key = if snapshot.computer_name.is_empty() { target.as_str() } else { snapshot.computer_name.as_str() };
    let stored = store.get_by_hostname(key)?;
    let comparison = compare(&snapshot, stored.as_ref());
    debug!(%target, hostname = key, new = comparison.is_new_device(), diffs = comparison.diffs.len(), "compared");
    Ok(comparison)
}

/// Persist the selected part of `comparison`.
///
/// New devices always get their hostname written, whatever the selection,
/// and every record is validated before the store sees it. An existing
/// device with nothing selected to change only gets a discovery note.
pub fn apply(
    store: &dyn AuditedStore,
    comparison: &ComparisonResult,
    selection: &Selection,
    method: DiscoveryMethod,
    ctx: &ChangeContext,
) -> Result<Applied, EngineError> {
    let target = &comparison.target;
    if comparison.is_new_device() {
        let selection = selection.clone().with(Field::Hostname);
        let mut record = plan(comparison, &selection);
        record.discovery_method = Some(method);
        validate_record(&record)?;
        let added = store.add(&record, ctx)?;
        info!(%target, hostname = %added.hostname, "device added");
        return Ok(Applied::Added(added));
    }

    let mut record = plan(comparison, selection);
    record.discovery_method = Some(method);
    if !comparison.diffs.iter().any(|d| selection.includes(d.field)) {
        store.record_discovery(&record, ctx)?;
        debug!(%target, hostname = %record.hostname, "no changes");
        return Ok(Applied::Unchanged);
    }
    validate_record(&record)?;
    let changed = store.update(&record, ctx)?;
    info!(%target, hostname = %record.hostname, changed, "device updated");
    Ok(Applied::Updated(changed))
}
