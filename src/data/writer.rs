use std::path::Path;

use anyhow::{Context, Result};

use super::model::WideTable;

// ---------------------------------------------------------------------------
// Wide CSV export
// ---------------------------------------------------------------------------

/// Write a pivoted table as CSV.
///
/// Header: metadata field names in declared order, then one `t=<index>`
/// column per canonical time index. One record per run, fields in header
/// order. Scalars render via `Display`: no thousands separators, floats in
/// full shortest-round-trip precision, nulls as empty cells. No index or
/// row-name column is emitted.
pub fn write_csv(table: &WideTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    writer
        .write_record(table.headers())
        .context("writing CSV header")?;

    for (i, row) in table.rows.iter().enumerate() {
        let record: Vec<String> = row
            .metadata
            .iter()
            .chain(row.samples.iter())
            .map(|v| v.to_string())
            .collect();
        writer
            .write_record(&record)
            .with_context(|| format!("writing run {i}"))?;
    }

    writer.flush().context("flushing CSV output")?;
    Ok(())
}
