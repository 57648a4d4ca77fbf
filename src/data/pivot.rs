use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;
use thiserror::Error;

use super::model::{Observation, Scalar, WideRow, WideTable};

// ---------------------------------------------------------------------------
// Pivot configuration
// ---------------------------------------------------------------------------

/// What to do when a run has no observation for one of the canonical time
/// indices. The default fails the whole pivot; filling is an explicit opt-in
/// with a caller-chosen sentinel, never a silent zero.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    #[default]
    Fail,
    FillWith(Scalar),
}

/// Declares how a long-form table pivots wide: which columns identify a run,
/// which column is the time index, which carries the reading, and the
/// missing-sample policy.
#[derive(Debug, Clone, Deserialize)]
pub struct PivotSpec {
    /// Run-identifying metadata columns, in output order. Must be non-empty.
    pub metadata_fields: Vec<String>,
    /// Column holding the sample position within a run.
    pub time_field: String,
    /// Column holding the waveform reading.
    pub value_field: String,
    #[serde(default)]
    pub missing: MissingPolicy,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum PivotError {
    #[error("no metadata fields declared")]
    NoMetadataFields,
    #[error("observation {row} is missing metadata field '{field}'")]
    MissingMetadataField { field: String, row: usize },
    #[error("run {run} has no sample at t={time}")]
    MissingSample { run: String, time: Scalar },
    #[error("run {run} has more than one sample at t={time}")]
    DuplicateSample { run: String, time: Scalar },
}

fn describe_run(key: &[Scalar]) -> String {
    let parts: Vec<String> = key.iter().map(Scalar::to_string).collect();
    format!("({})", parts.join(", "))
}

// ---------------------------------------------------------------------------
// The pivot
// ---------------------------------------------------------------------------

/// Pivot long-form observations into one wide row per run.
///
/// Runs are the distinct tuples of values at `spec.metadata_fields`; output
/// rows appear in first-appearance order of their run, so the result is
/// deterministic for a given input order without any incidental sort. The
/// waveform columns follow the canonical time schedule: the globally distinct
/// time values across the whole input, ascending. Using the global set (not
/// each run's own) surfaces schema mismatches between runs instead of
/// producing a ragged table.
///
/// Values and metadata keep their native scalar types; any text-to-number
/// inference belongs to the loaders, any stringification to the writer.
///
/// Pure function: no partial table is ever returned on error. Zero
/// observations yield an empty table.
pub fn pivot(observations: &[Observation], spec: &PivotSpec) -> Result<WideTable, PivotError> {
    if spec.metadata_fields.is_empty() {
        return Err(PivotError::NoMetadataFields);
    }

    // One pass: group rows by metadata tuple (first-appearance order) and
    // collect the global time schedule.
    let mut group_index: HashMap<Vec<Scalar>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Scalar>, HashMap<Scalar, Scalar>)> = Vec::new();
    let mut schedule_set: BTreeSet<Scalar> = BTreeSet::new();

    for (row, obs) in observations.iter().enumerate() {
        let mut key = Vec::with_capacity(spec.metadata_fields.len());
        for field in &spec.metadata_fields {
            match obs.metadata.get(field) {
                Some(val) => key.push(val.clone()),
                None => {
                    return Err(PivotError::MissingMetadataField {
                        field: field.clone(),
                        row,
                    });
                }
            }
        }

        schedule_set.insert(obs.time.clone());

        let idx = match group_index.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = groups.len();
                group_index.insert(key.clone(), idx);
                groups.push((key, HashMap::new()));
                idx
            }
        };
        let (run_key, samples) = &mut groups[idx];
        if samples.insert(obs.time.clone(), obs.value.clone()).is_some() {
            return Err(PivotError::DuplicateSample {
                run: describe_run(run_key),
                time: obs.time.clone(),
            });
        }
    }

    let schedule: Vec<Scalar> = schedule_set.into_iter().collect();

    // Assemble one wide row per run against the shared schedule.
    let mut rows = Vec::with_capacity(groups.len());
    for (key, samples) in groups {
        let mut row_samples = Vec::with_capacity(schedule.len());
        for time in &schedule {
            match samples.get(time) {
                Some(value) => row_samples.push(value.clone()),
                None => match &spec.missing {
                    MissingPolicy::Fail => {
                        return Err(PivotError::MissingSample {
                            run: describe_run(&key),
                            time: time.clone(),
                        });
                    }
                    MissingPolicy::FillWith(sentinel) => row_samples.push(sentinel.clone()),
                },
            }
        }
        rows.push(WideRow {
            metadata: key,
            samples: row_samples,
        });
    }

    Ok(WideTable {
        metadata_fields: spec.metadata_fields.clone(),
        schedule,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn spec() -> PivotSpec {
        PivotSpec {
            metadata_fields: vec![
                "ExpDay".to_string(),
                "Batch".to_string(),
                "DecaySetting".to_string(),
            ],
            time_field: "Time".to_string(),
            value_field: "Signal".to_string(),
            missing: MissingPolicy::Fail,
        }
    }

    fn obs(day: &str, batch: i64, decay: i64, t: i64, value: f64) -> Observation {
        let mut metadata = BTreeMap::new();
        metadata.insert("ExpDay".to_string(), Scalar::String(day.to_string()));
        metadata.insert("Batch".to_string(), Scalar::Integer(batch));
        metadata.insert("DecaySetting".to_string(), Scalar::Integer(decay));
        Observation {
            metadata,
            time: Scalar::Integer(t),
            value: Scalar::Float(value),
        }
    }

    /// Four decay runs, 11 samples each: the full reference scenario.
    fn decay_runs() -> Vec<Observation> {
        let runs: [(&str, i64, i64); 4] = [
            ("Day 1", 1234, 20),
            ("Day 1", 1234, 40),
            ("Day 2", 5678, 20),
            ("Day 2", 5678, 40),
        ];
        let mut observations = Vec::new();
        for (day, batch, decay) in runs {
            for t in (0..=100).step_by(10) {
                let value = (-(t as f64) / decay as f64).exp();
                observations.push(obs(day, batch, decay, t, value));
            }
        }
        observations
    }

    #[test]
    fn reference_scenario_pivots_to_4_by_14() {
        let table = pivot(&decay_runs(), &spec()).unwrap();
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.width(), 14);
        assert_eq!(table.schedule.len(), 11);
        for row in &table.rows {
            assert_eq!(row.metadata.len() + row.samples.len(), 14);
        }

        // Run A: (Day 1, 1234, 20), values exp(-t/20) for t in 0..=100.
        let row = &table.rows[0];
        assert_eq!(
            row.metadata,
            vec![
                Scalar::String("Day 1".into()),
                Scalar::Integer(1234),
                Scalar::Integer(20),
            ]
        );
        assert_eq!(row.samples[0], Scalar::Float(1.0));
        for (i, t) in (0..=100).step_by(10).enumerate() {
            let expected = (-(t as f64) / 20.0).exp();
            assert_eq!(row.samples[i], Scalar::Float(expected));
        }
        let last = row.samples[10].as_f64().unwrap();
        assert!((last - 0.0067).abs() < 1e-4);
    }

    #[test]
    fn schedule_is_global_and_ascending() {
        // Feed observations in scrambled time order.
        let mut observations = decay_runs();
        observations.reverse();
        let table = pivot(&observations, &spec()).unwrap();
        let times: Vec<i64> = (0..=100).step_by(10).collect();
        let expected: Vec<Scalar> = times.into_iter().map(Scalar::Integer).collect();
        assert_eq!(table.schedule, expected);
    }

    #[test]
    fn row_order_tracks_first_appearance() {
        let mut observations = decay_runs();
        // Move the last run's observations to the front.
        let tail: Vec<Observation> = observations.split_off(33);
        let reordered: Vec<Observation> =
            tail.into_iter().chain(observations).collect();
        let table = pivot(&reordered, &spec()).unwrap();
        assert_eq!(
            table.rows[0].metadata,
            vec![
                Scalar::String("Day 2".into()),
                Scalar::Integer(5678),
                Scalar::Integer(40),
            ]
        );
        assert_eq!(table.rows.len(), 4);
    }

    #[test]
    fn permuting_within_a_run_leaves_its_row_unchanged() {
        let observations = decay_runs();
        let baseline = pivot(&observations, &spec()).unwrap();

        let mut shuffled = observations;
        // Reverse only run A's block; group discovery order is unchanged.
        shuffled[0..11].reverse();
        let permuted = pivot(&shuffled, &spec()).unwrap();
        assert_eq!(baseline, permuted);
    }

    #[test]
    fn repeated_pivot_is_deterministic() {
        let observations = decay_runs();
        let a = pivot(&observations, &spec()).unwrap();
        let b = pivot(&observations, &spec()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_sample_is_fatal_by_default() {
        let mut observations = decay_runs();
        // Drop run A's t=50 sample: 10 of 11 points left.
        observations.remove(5);
        let err = pivot(&observations, &spec()).unwrap_err();
        assert_eq!(
            err,
            PivotError::MissingSample {
                run: "(Day 1, 1234, 20)".to_string(),
                time: Scalar::Integer(50),
            }
        );
    }

    #[test]
    fn missing_sample_fill_is_explicit_opt_in() {
        let mut observations = decay_runs();
        observations.remove(5);
        let mut spec = spec();
        spec.missing = MissingPolicy::FillWith(Scalar::Float(f64::NAN));
        let table = pivot(&observations, &spec).unwrap();
        assert_eq!(table.rows.len(), 4);
        let filled = table.rows[0].samples[5].as_f64().unwrap();
        assert!(filled.is_nan());
        // Other runs are untouched.
        assert_eq!(table.rows[1].samples.len(), 11);
    }

    #[test]
    fn duplicate_sample_is_always_fatal() {
        let mut observations = decay_runs();
        observations.push(obs("Day 1", 1234, 20, 0, 0.5));
        let err = pivot(&observations, &spec()).unwrap_err();
        assert_eq!(
            err,
            PivotError::DuplicateSample {
                run: "(Day 1, 1234, 20)".to_string(),
                time: Scalar::Integer(0),
            }
        );
    }

    #[test]
    fn missing_metadata_field_is_fatal() {
        let mut observations = decay_runs();
        observations[3].metadata.remove("Batch");
        let err = pivot(&observations, &spec()).unwrap_err();
        assert_eq!(
            err,
            PivotError::MissingMetadataField {
                field: "Batch".to_string(),
                row: 3,
            }
        );
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let table = pivot(&[], &spec()).unwrap();
        assert!(table.rows.is_empty());
        assert!(table.schedule.is_empty());
        assert_eq!(table.metadata_fields.len(), 3);
    }

    #[test]
    fn empty_metadata_fields_is_rejected() {
        let mut spec = spec();
        spec.metadata_fields.clear();
        assert_eq!(
            pivot(&decay_runs(), &spec).unwrap_err(),
            PivotError::NoMetadataFields
        );
    }

    #[test]
    fn values_pass_through_type_preserved() {
        let mut metadata = BTreeMap::new();
        metadata.insert("Run".to_string(), Scalar::String("r1".into()));
        let observations = vec![
            Observation {
                metadata: metadata.clone(),
                time: Scalar::Integer(0),
                value: Scalar::Integer(7),
            },
            Observation {
                metadata,
                time: Scalar::Integer(1),
                value: Scalar::String("saturated".into()),
            },
        ];
        let spec = PivotSpec {
            metadata_fields: vec!["Run".to_string()],
            time_field: "Time".to_string(),
            value_field: "Signal".to_string(),
            missing: MissingPolicy::Fail,
        };
        let table = pivot(&observations, &spec).unwrap();
        assert_eq!(table.rows[0].samples[0], Scalar::Integer(7));
        assert_eq!(
            table.rows[0].samples[1],
            Scalar::String("saturated".into())
        );
    }

    #[test]
    fn nan_time_index_pivots_like_any_other() {
        let mut metadata = BTreeMap::new();
        metadata.insert("Run".to_string(), Scalar::String("r1".into()));
        let observations = vec![
            Observation {
                metadata: metadata.clone(),
                time: Scalar::Float(0.0),
                value: Scalar::Float(1.0),
            },
            Observation {
                metadata,
                time: Scalar::Float(f64::NAN),
                value: Scalar::Float(0.5),
            },
        ];
        let spec = PivotSpec {
            metadata_fields: vec!["Run".to_string()],
            time_field: "Time".to_string(),
            value_field: "Signal".to_string(),
            missing: MissingPolicy::Fail,
        };
        let table = pivot(&observations, &spec).unwrap();
        // total_cmp sorts NaN after every number; the sample must be found
        // there, not reported missing.
        assert_eq!(table.schedule.len(), 2);
        assert_eq!(table.rows[0].samples[1], Scalar::Float(0.5));
    }

    #[test]
    fn missing_policy_parses_from_json() {
        let spec: PivotSpec = serde_json::from_str(
            r#"{
                "metadata_fields": ["ExpDay"],
                "time_field": "Time",
                "value_field": "Signal",
                "missing": {"fill_with": null}
            }"#,
        )
        .unwrap();
        assert_eq!(spec.missing, MissingPolicy::FillWith(Scalar::Null));

        let spec: PivotSpec = serde_json::from_str(
            r#"{"metadata_fields": ["ExpDay"], "time_field": "t", "value_field": "v"}"#,
        )
        .unwrap();
        assert_eq!(spec.missing, MissingPolicy::Fail);
    }
}
