//! Turning an operator's field selection into the record to persist.

use inventory_core::{ComparisonResult, DeviceRecord, Field};
use std::collections::BTreeSet;

/// Which diffs to write: everything, or a named subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Fields(BTreeSet<Field>),
}

impl Selection {
    pub fn fields(fields: impl IntoIterator<Item = Field>) -> Self {
        Selection::Fields(fields.into_iter().collect())
    }

    pub fn includes(&self, field: Field) -> bool {
        match self {
            Selection::All => true,
            Selection::Fields(set) => set.contains(&field),
        }
    }

    /// Add `field` to the selection.
    pub fn with(self, field: Field) -> Self {
        match self {
            Selection::All => Selection::All,
            Selection::Fields(mut set) => {
                set.insert(field);
                Selection::Fields(set)
            }
        }
    }

    /// `all`, or a comma-separated list of field names.
    pub fn parse_list(s: &str) -> Result<Self, String> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Selection::All);
        }
        let fields = s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::parse)
            .collect::<Result<BTreeSet<Field>, String>>()?;
        Ok(Selection::Fields(fields))
    }

    /// The fields whose diffs were flagged for apply.
    pub fn from_flags(comparison: &ComparisonResult) -> Self {
        Selection::fields(comparison.diffs.iter().filter(|d| d.apply).map(|d| d.field))
    }
}

/// Set each diff's `apply` flag from `selection`.
pub fn mark(comparison: &mut ComparisonResult, selection: &Selection) {
    for d in &mut comparison.diffs {
        d.apply = selection.includes(d.field);
    }
}

/// Start from the stored record (or an empty one) and overwrite every
/// selected diffed field with the snapshot's value. Unselected fields keep
/// their stored value. Discovery stamps always come from the snapshot.
pub fn plan(comparison: &ComparisonResult, selection: &Selection) -> DeviceRecord {
    let candidate = &comparison.candidate;
    let mut out = comparison.stored.clone().unwrap_or_default();
    for d in comparison.diffs.iter().filter(|d| selection.includes(d.field)) {
        d.field.copy(candidate, &mut out);
    }
    out.last_discovered = candidate.last_discovered.clone();
    out.discovery_method = candidate.discovery_method;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{candidate_record, compare};
    use crate::test_support::snapshot;
    use inventory_core::{DiscoverySession, DriveAttr};
    use pretty_assertions::assert_eq;

    fn stored_with_three_changes() -> DeviceRecord {
        let snap = snapshot();
        DeviceRecord {
            id: Some(DiscoverySession::new().id()),
            total_ram_gb: Some(8.0),
            os_version: Some("20.04".into()),
            serial_number: Some("OLDSERIAL".into()),
            ..candidate_record(&snap)
        }
    }

    #[test]
    fn selecting_one_field_changes_only_that_field() {
        let stored = stored_with_three_changes();
        let c = compare(&snapshot(), Some(&stored));
        assert_eq!(c.diffs.len(), 3);

        let out = plan(&c, &Selection::fields([Field::TotalRamGb]));
        assert_eq!(out.total_ram_gb, Some(16.0));
        assert_eq!(out.os_version.as_deref(), Some("20.04"));
        assert_eq!(out.serial_number.as_deref(), Some("OLDSERIAL"));
        assert_eq!(out.id, stored.id);
    }

    #[test]
    fn all_applies_every_diff() {
        let c = compare(&snapshot(), Some(&stored_with_three_changes()));
        let out = plan(&c, &Selection::All);
        assert_eq!(compare(&snapshot(), Some(&out)).diffs, Vec::new());
    }

    #[test]
    fn new_device_starts_from_empty_record() {
        let c = compare(&snapshot(), None);
        let out = plan(&c, &Selection::fields([Field::Model]));
        assert_eq!(out.hostname, "");
        assert_eq!(out.model.as_deref(), Some("OptiPlex 7090"));
        let out = plan(&c, &Selection::fields([Field::Model]).with(Field::Hostname));
        assert_eq!(out.hostname, "WKS-01");
    }

    #[test]
    fn flags_round_trip_through_mark() {
        let mut c = compare(&snapshot(), Some(&stored_with_three_changes()));
        mark(&mut c, &Selection::fields([Field::OsVersion]));
        assert_eq!(c.diffs.iter().filter(|d| d.apply).count(), 1);
        assert_eq!(Selection::from_flags(&c), Selection::fields([Field::OsVersion]));
    }

    #[test]
    fn parse_list_accepts_names_and_all() {
        assert_eq!(Selection::parse_list(" ALL "), Ok(Selection::All));
        assert_eq!(
            Selection::parse_list("TotalRamGb, Drive[0].Model"),
            Ok(Selection::fields([Field::TotalRamGb, Field::Drive(0, DriveAttr::Model)]))
        );
        assert!(Selection::parse_list("TotalRam").is_err());
    }
}
