//! Output module for harvest reports
//!
//! This module handles:
//! - Reading the aggregate report (top posters, top posts, totals)
//! - Printing it for the operator
//! - The administrative reset of all aggregates

pub mod stats;

pub use crate::storage::TopResult;
pub use stats::{load_report, print_report, HarvestReport};

use crate::storage::Store;
use crate::HarvestError;

/// Clears every submission and author total
///
/// Both tables are emptied in one transaction.
pub fn reset_aggregates(store: &dyn Store) -> Result<(), HarvestError> {
    store.clear_all()?;
    tracing::info!("Cleared all submissions and author statistics");
    Ok(())
}
