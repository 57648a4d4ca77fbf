use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use log::info;
use serde::Deserialize;

use wideform::data::filter::{FilterState, filtered_indices};
use wideform::data::loader::load_file;
use wideform::data::model::LongDataset;
use wideform::data::pivot::{PivotSpec, pivot};
use wideform::data::writer::write_csv;

/// Job description read from the optional JSON config: the pivot layout plus
/// an optional per-column subset selection applied before pivoting.
#[derive(Debug, Deserialize)]
struct JobConfig {
    #[serde(flatten)]
    pivot: PivotSpec,
    /// column → values to keep. Columns not listed are unconstrained.
    #[serde(default)]
    keep: FilterState,
}

/// Default layout matching the sample generator's column names.
fn default_config() -> JobConfig {
    JobConfig {
        pivot: PivotSpec {
            metadata_fields: vec![
                "ExpDay".to_string(),
                "Batch".to_string(),
                "DecaySetting".to_string(),
            ],
            time_field: "Time".to_string(),
            value_field: "Signal".to_string(),
            missing: Default::default(),
        },
        keep: FilterState::default(),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<JobConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading pivot config {}", path.display()))?;
            serde_json::from_str(&text).context("parsing pivot config")
        }
        None => Ok(default_config()),
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    let (input, output, config_path) = match args.as_slice() {
        [input, output] => (input, output, None),
        [input, output, config] => (input, output, Some(config)),
        _ => bail!("usage: wideform <long-input> <wide-output.csv> [pivot-config.json]"),
    };

    let config = load_config(config_path)?;

    let dataset: LongDataset = load_file(input, &config.pivot.time_field, &config.pivot.value_field)
        .with_context(|| format!("loading {}", input.display()))?;
    info!(
        "loaded {} observations across {} metadata columns",
        dataset.len(),
        dataset.column_names.len()
    );

    let observations: Vec<_> = if config.keep.is_empty() {
        dataset.observations
    } else {
        let kept = filtered_indices(&dataset, &config.keep);
        info!("filter kept {} of {} observations", kept.len(), dataset.len());
        kept.into_iter()
            .map(|i| dataset.observations[i].clone())
            .collect()
    };

    let table = pivot(&observations, &config.pivot).context("pivoting to wide form")?;
    info!(
        "pivoted into {} runs x {} columns ({} time indices)",
        table.rows.len(),
        table.width(),
        table.schedule.len()
    );

    write_csv(&table, output).with_context(|| format!("writing {}", output.display()))?;
    info!("wrote {}", output.display());

    Ok(())
}
