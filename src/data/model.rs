use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Scalar – a single cell value in a long-form table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common flat-file dtypes.
/// Used for metadata columns, time indices, and waveform readings alike.
/// Grouping and schedule sorting happen downstream, so `Scalar` must be
/// `Ord` and `Hash`.
///
/// Untagged serde representation: JSON strings, integers, floats, booleans
/// and null map straight onto the variants (integer tried before float so
/// whole numbers stay integers).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so Scalar can key BTreeSet and sort time schedules --

/// Equality defers to [`Ord`] so all three of `PartialEq`, `Ord` and `Hash`
/// agree on floats: `total_cmp` / `to_bits` semantics throughout. NaN equals
/// NaN, and a NaN time index groups like any other value.
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Scalar {}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Scalar::*;
        fn discriminant(v: &Scalar) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Scalar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Scalar::String(s) => s.hash(state),
            Scalar::Integer(i) => i.hash(state),
            Scalar::Float(f) => f.to_bits().hash(state),
            Scalar::Bool(b) => b.hash(state),
            Scalar::Null => {}
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{s}"),
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Null => Ok(()),
        }
    }
}

impl Scalar {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(v) => Some(*v),
            Scalar::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Observation – one long-form row
// ---------------------------------------------------------------------------

/// A single long-form row: one waveform reading at one time index, annotated
/// with the metadata identifying the run it belongs to.
#[derive(Debug, Clone)]
pub struct Observation {
    /// Run-identifying metadata columns: column_name → value. Constant
    /// across all observations of the same run.
    pub metadata: BTreeMap<String, Scalar>,
    /// Sample position within the run (e.g. milliseconds elapsed).
    pub time: Scalar,
    /// Waveform reading at that time index.
    pub value: Scalar,
}

// ---------------------------------------------------------------------------
// LongDataset – the complete loaded long-form table
// ---------------------------------------------------------------------------

/// The full parsed long-form table with pre-computed column indices.
#[derive(Debug, Clone)]
pub struct LongDataset {
    /// All observations (rows).
    pub observations: Vec<Observation>,
    /// Ordered list of metadata column names (excludes time, value).
    pub column_names: Vec<String>,
    /// For each metadata column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<Scalar>>,
}

impl LongDataset {
    /// Build column indices from the loaded observations.
    pub fn from_observations(observations: Vec<Observation>) -> Self {
        let mut column_names_set: BTreeSet<String> = BTreeSet::new();
        let mut unique_values: BTreeMap<String, BTreeSet<Scalar>> = BTreeMap::new();

        for obs in &observations {
            for (col, val) in &obs.metadata {
                column_names_set.insert(col.clone());
                unique_values
                    .entry(col.clone())
                    .or_default()
                    .insert(val.clone());
            }
        }
        let column_names: Vec<String> = column_names_set.into_iter().collect();
        LongDataset {
            observations,
            column_names,
            unique_values,
        }
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

// ---------------------------------------------------------------------------
// WideRow / WideTable – the pivoted output
// ---------------------------------------------------------------------------

/// One run rendered wide: metadata values (in declared field order) followed
/// by one sample per canonical time index. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub metadata: Vec<Scalar>,
    pub samples: Vec<Scalar>,
}

/// The pivoted table: a shared column layout plus one [`WideRow`] per run,
/// in first-appearance order of the run key. No two rows share a metadata
/// tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    /// Metadata column names, in the order declared to the pivot.
    pub metadata_fields: Vec<String>,
    /// Canonical time schedule: globally distinct time indices, ascending.
    pub schedule: Vec<Scalar>,
    pub rows: Vec<WideRow>,
}

impl WideTable {
    /// Column headers: metadata names followed by `t=<index>` per time index.
    pub fn headers(&self) -> Vec<String> {
        self.metadata_fields
            .iter()
            .cloned()
            .chain(self.schedule.iter().map(|t| format!("t={t}")))
            .collect()
    }

    /// Total column count of every row: metadata fields + schedule length.
    pub fn width(&self) -> usize {
        self.metadata_fields.len() + self.schedule.len()
    }
}
