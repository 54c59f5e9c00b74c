//! Turning raw facts into a decision about the inventory.
//!
//! [`normalize`] derives a [`Snapshot`](inventory_core::Snapshot),
//! [`compare`] diffs it against the stored record, [`plan`] applies an
//! operator's selection, and [`pipeline`] strings the steps together for
//! one target.

pub mod diff;
pub mod normalize;
pub mod pipeline;
pub mod plan;

#[cfg(test)]
pub(crate) mod test_support;

pub use diff::{candidate_record, compare};
pub use normalize::normalize;
pub use pipeline::{apply, scan_one, Applied};
pub use plan::{mark, plan, Selection};
