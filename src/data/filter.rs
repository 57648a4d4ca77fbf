use std::collections::{BTreeMap, BTreeSet};

use super::model::{LongDataset, Scalar};

// ---------------------------------------------------------------------------
// Filter predicate: which unique values are selected per metadata column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of selected values.
/// If a column is absent its constraint is "no filter" (keep all).
pub type FilterState = BTreeMap<String, BTreeSet<Scalar>>;

/// Initialise a [`FilterState`] with all values selected (i.e., keep everything).
pub fn init_filter_state(dataset: &LongDataset) -> FilterState {
    dataset
        .unique_values
        .iter()
        .map(|(col, vals)| (col.clone(), vals.clone()))
        .collect()
}

/// Return indices of observations that pass all active filters.
///
/// An observation passes a column filter when:
/// * The column is not present in `filters` → passes (no constraint)
/// * The filter set for that column is empty → nothing selected → fails
/// * The observation's value for that column is in the selected set → passes
pub fn filtered_indices(dataset: &LongDataset, filters: &FilterState) -> Vec<usize> {
    dataset
        .observations
        .iter()
        .enumerate()
        .filter(|(_, obs)| {
            for (col, selected) in filters {
                if selected.is_empty() {
                    // Nothing selected for this column → drop everything
                    return false;
                }
                // Check every unique value is selected → no effective filter.
                // Size equality is not enough: config-supplied selections may
                // name values that never occur in the data.
                if let Some(all_vals) = dataset.unique_values.get(col) {
                    if all_vals.iter().all(|v| selected.contains(v)) {
                        continue; // everything selected, no filtering needed
                    }
                }
                match obs.metadata.get(col) {
                    Some(val) => {
                        if !selected.contains(val) {
                            return false;
                        }
                    }
                    None => {
                        // observation doesn't have this column → keep only if Null is selected
                        if !selected.contains(&Scalar::Null) {
                            return false;
                        }
                    }
                }
            }
            true
        })
        .map(|(i, _)| i)
        .collect()
}
