//! Writes `sample_signal.csv` and `sample_signal.parquet`: 10 s of synthetic
//! recordings at 1 sample/ms, one channel per column.

use std::f64::consts::PI;
use std::sync::Arc;

use anyhow::Context;
use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const SAMPLE_RATE_HZ: f64 = 1000.0;
const DURATION_S: f64 = 10.0;

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
    fn gauss(&mut self, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }
}

/// One named channel as a function of time, plus white noise.
fn channel(
    times: &[f64],
    noise: f64,
    rng: &mut SimpleRng,
    shape: impl Fn(f64) -> f64,
) -> Vec<f64> {
    times.iter().map(|&t| shape(t) + rng.gauss(noise)).collect()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    let n = (SAMPLE_RATE_HZ * DURATION_S) as usize;
    let times: Vec<f64> = (0..n).map(|i| i as f64 / SAMPLE_RATE_HZ).collect();

    let columns: Vec<(&str, Vec<f64>)> = vec![
        // Steady 10 Hz rhythm with slow drift.
        (
            "alpha",
            channel(&times, 0.2, &mut rng, |t| {
                (2.0 * PI * 10.0 * t).sin() + 0.5 * (2.0 * PI * 0.2 * t).sin()
            }),
        ),
        // 20 Hz burst between 4 and 6 s.
        (
            "beta_burst",
            channel(&times, 0.2, &mut rng, |t| {
                let envelope = (-((t - 5.0) / 0.6).powi(2)).exp();
                envelope * (2.0 * PI * 20.0 * t).sin()
            }),
        ),
        // Linear chirp from 2 to 40 Hz.
        (
            "chirp",
            channel(&times, 0.1, &mut rng, |t| {
                let rate = (40.0 - 2.0) / DURATION_S;
                (2.0 * PI * (2.0 * t + 0.5 * rate * t * t)).sin()
            }),
        ),
        // 50 Hz mains hum on top of noise.
        (
            "mains",
            channel(&times, 0.5, &mut rng, |t| 0.8 * (2.0 * PI * 50.0 * t).sin()),
        ),
    ];

    // Write CSV
    let csv_path = "sample_signal.csv";
    let mut writer = csv::Writer::from_path(csv_path)
        .with_context(|| format!("Cannot create {csv_path}"))?;
    writer.write_record(columns.iter().map(|(name, _)| *name))?;
    for i in 0..n {
        writer.write_record(columns.iter().map(|(_, values)| format!("{:.6}", values[i])))?;
    }
    writer.flush()?;

    // Write Parquet
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, _)| Field::new(*name, DataType::Float64, false))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(_, values)| Arc::new(Float64Array::from(values.clone())) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("Failed to create RecordBatch")?;

    let parquet_path = "sample_signal.parquet";
    let file = std::fs::File::create(parquet_path)
        .with_context(|| format!("Cannot create {parquet_path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("Failed to create writer")?;
    writer.write(&batch).context("Failed to write batch")?;
    writer.close().context("Failed to close writer")?;

    println!(
        "Wrote {} channels x {n} samples ({SAMPLE_RATE_HZ} Hz) to {csv_path} and {parquet_path}",
        columns.len()
    );
    Ok(())
}
