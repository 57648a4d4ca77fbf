use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One long-form row of the synthetic dataset.
struct Row {
    exp_day: String,
    batch: i64,
    decay: i64,
    time: i64,
    signal: f64,
}

/// Four exponential-decay runs, 11 samples each at t = 0, 10, ..., 100 ms.
/// Signal = exp(-t / decay) plus optional gaussian noise.
fn generate_rows(noise_level: f64, rng: &mut SimpleRng) -> Vec<Row> {
    let runs: [(&str, i64, i64); 4] = [
        ("Day 1", 1234, 20),
        ("Day 1", 1234, 40),
        ("Day 2", 5678, 20),
        ("Day 2", 5678, 40),
    ];

    let mut rows = Vec::new();
    for (exp_day, batch, decay) in runs {
        for time in (0..=100).step_by(10) {
            let mut signal = (-(time as f64) / decay as f64).exp();
            if noise_level > 0.0 {
                signal += rng.gauss(0.0, noise_level);
            }
            rows.push(Row {
                exp_day: exp_day.to_string(),
                batch,
                decay,
                time: time as i64,
                signal,
            });
        }
    }
    rows
}

fn write_long_csv(rows: &[Row], path: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV output")?;
    writer
        .write_record(["ExpDay", "Batch", "DecaySetting", "Time", "Signal"])
        .context("writing CSV header")?;
    for row in rows {
        writer
            .write_record([
                row.exp_day.clone(),
                row.batch.to_string(),
                row.decay.to_string(),
                row.time.to_string(),
                row.signal.to_string(),
            ])
            .context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV output")?;
    Ok(())
}

fn write_long_parquet(rows: &[Row], path: &str) -> Result<()> {
    let exp_day_array =
        StringArray::from(rows.iter().map(|r| r.exp_day.as_str()).collect::<Vec<_>>());
    let batch_array = Int64Array::from(rows.iter().map(|r| r.batch).collect::<Vec<_>>());
    let decay_array = Int64Array::from(rows.iter().map(|r| r.decay).collect::<Vec<_>>());
    let time_array = Int64Array::from(rows.iter().map(|r| r.time).collect::<Vec<_>>());
    let signal_array = Float64Array::from(rows.iter().map(|r| r.signal).collect::<Vec<_>>());

    let schema = Arc::new(Schema::new(vec![
        Field::new("ExpDay", DataType::Utf8, false),
        Field::new("Batch", DataType::Int64, false),
        Field::new("DecaySetting", DataType::Int64, false),
        Field::new("Time", DataType::Int64, false),
        Field::new("Signal", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(exp_day_array),
            Arc::new(batch_array),
            Arc::new(decay_array),
            Arc::new(time_array),
            Arc::new(signal_array),
        ],
    )
    .context("creating record batch")?;

    let file = std::fs::File::create(path).context("creating parquet output")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    // Optional first argument: gaussian noise level (default 0 = exact decay).
    let noise_level: f64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse().context("noise level must be a number")?,
        None => 0.0,
    };

    let mut rng = SimpleRng::new(42);
    let rows = generate_rows(noise_level, &mut rng);

    write_long_csv(&rows, "sample_long.csv")?;
    write_long_parquet(&rows, "sample_long.parquet")?;

    println!(
        "Wrote {} observations ({} runs) to sample_long.csv and sample_long.parquet",
        rows.len(),
        rows.len() / 11
    );
    Ok(())
}
