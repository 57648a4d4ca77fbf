//! wideform – long-to-wide pivot for repeated-measures waveform data.
//!
//! A long-form table holds one row per (run, time index) reading plus the
//! metadata columns identifying the run. [`data::pivot::pivot`] reshapes it
//! into one row per run: metadata fields followed by one column per time
//! index on a shared, globally-derived schedule, ready for flat-file export
//! via [`data::writer::write_csv`].

pub mod data;

pub use data::model::{LongDataset, Observation, Scalar, WideRow, WideTable};
pub use data::pivot::{MissingPolicy, PivotError, PivotSpec, pivot};
