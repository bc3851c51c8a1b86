//! The three analysis paths, each a single call from dataset to plottable
//! arrays. Paths are independent; none reuses another's output.

use log::info;

use crate::config::AnalysisConfig;
use crate::data::model::{TabularDataset, build};
use crate::dsp::crop::crop;
use crate::dsp::filter::bandpass;
use crate::dsp::psd::{PsdResult, PsdResultDb, compute_psd, to_decibels};
use crate::dsp::tfr::{TfrResult, compute_tfr};
use crate::error::Result;

/// Filtered, cropped samples plus the labels to plot them with.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeDomainTrace {
    /// Absolute times: a window starting at 2 s gives a first time of 2 s.
    pub times: Vec<f64>,
    pub values: Vec<f64>,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

/// Linear and decibel PSD over the same frequencies.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralDensity {
    pub linear: PsdResult,
    pub db: PsdResultDb,
}

/// Band-pass the column, then keep the configured time window.
pub fn time_domain(
    dataset: &TabularDataset,
    column: &str,
    config: &AnalysisConfig,
) -> Result<TimeDomainTrace> {
    let signal = build(dataset, column, config.sample_rate_hz(), &config.unit)?;
    let filtered = bandpass(&signal, &config.filter_band)?;
    let cropped = crop(&filtered, &config.window)?;

    info!(
        "time-domain trace of '{column}': {} of {} samples",
        cropped.len(),
        signal.len()
    );
    Ok(TimeDomainTrace {
        times: cropped.times(),
        values: cropped.values().to_vec(),
        title: format!(
            "Signal {column} between {} and {} seconds",
            config.window.start_s, config.window.end_s
        ),
        x_label: "Time (s)".to_string(),
        y_label: cropped.unit().to_string(),
    })
}

/// Band-pass the whole column, then decompose it over the analysis band.
pub fn scalogram(
    dataset: &TabularDataset,
    column: &str,
    config: &AnalysisConfig,
) -> Result<TfrResult> {
    let signal = build(dataset, column, config.sample_rate_hz(), &config.unit)?;
    let filtered = bandpass(&signal, &config.filter_band)?;
    let tfr = compute_tfr(&filtered, &config.analysis_band, config.n_cycles)?;

    info!(
        "scalogram of '{column}': {} freqs x {} times",
        tfr.n_freqs(),
        tfr.n_times()
    );
    Ok(tfr)
}

/// Multitaper PSD of the unfiltered column, in linear units and decibels.
pub fn spectral_density(
    dataset: &TabularDataset,
    column: &str,
    config: &AnalysisConfig,
) -> Result<SpectralDensity> {
    let signal = build(dataset, column, config.sample_rate_hz(), &config.unit)?;
    let linear = compute_psd(
        &signal,
        &config.analysis_band,
        config.psd_window_s,
        config.smoothing_hz,
    )?;
    let db = to_decibels(&linear)?;

    info!(
        "PSD of '{column}': {} freqs, {} tapers",
        linear.freqs.len(),
        linear.n_tapers
    );
    Ok(SpectralDensity { linear, db })
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;
    use crate::config::RateUnit;
    use crate::data::model::{Cell, Column, FrequencyBand, TimeWindow};
    use crate::error::PipelineError;

    fn dataset(fs: f64, n: usize) -> TabularDataset {
        let tone = |f: f64| -> Vec<Cell> {
            (0..n)
                .map(|i| Cell::Number((2.0 * PI * f * i as f64 / fs).sin()))
                .collect()
        };
        TabularDataset::from_columns(vec![
            Column {
                name: "alpha".into(),
                cells: tone(10.0),
            },
            Column {
                name: "label".into(),
                cells: (0..n).map(|_| Cell::Text("x".into())).collect(),
            },
        ])
        .unwrap()
    }

    fn config(fs: f64) -> AnalysisConfig {
        AnalysisConfig {
            sample_rate: fs,
            rate_unit: RateUnit::Hertz,
            window: TimeWindow::new(2.0, 4.0),
            filter_band: FrequencyBand::between(1.0, 40.0),
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn time_domain_keeps_absolute_times_and_labels() {
        let trace = time_domain(&dataset(100.0, 1000), "alpha", &config(100.0)).unwrap();
        assert_eq!(trace.values.len(), 200);
        assert_eq!(trace.times.len(), 200);
        assert!((trace.times[0] - 2.0).abs() < 1e-12);
        assert_eq!(trace.title, "Signal alpha between 2 and 4 seconds");
        assert_eq!(trace.x_label, "Time (s)");
        assert_eq!(trace.y_label, "mV");
    }

    #[test]
    fn scalogram_uses_analysis_band() {
        let tfr = scalogram(&dataset(100.0, 1000), "alpha", &config(100.0)).unwrap();
        assert_eq!(tfr.n_freqs(), 49);
        assert_eq!(tfr.n_times(), 1000);
        assert_eq!(tfr.times[0], 0.0);
    }

    #[test]
    fn spectral_density_peaks_at_tone() {
        let psd = spectral_density(&dataset(100.0, 1000), "alpha", &config(100.0)).unwrap();
        assert_eq!(psd.linear.peak_frequency(), Some(10.0));
        assert_eq!(psd.db.freqs, psd.linear.freqs);
        assert_eq!(psd.db.power_db.len(), psd.linear.power.len());
    }

    #[test]
    fn paths_report_their_own_errors() {
        let ds = dataset(100.0, 1000);
        let cfg = config(100.0);
        assert!(matches!(
            time_domain(&ds, "missing", &cfg),
            Err(PipelineError::UnknownColumn { .. })
        ));
        assert!(matches!(
            scalogram(&ds, "label", &cfg),
            Err(PipelineError::MalformedUpload(_))
        ));
        let bad = AnalysisConfig {
            smoothing_hz: -1.0,
            ..cfg.clone()
        };
        assert_eq!(
            spectral_density(&ds, "alpha", &bad).unwrap_err(),
            PipelineError::InvalidBandwidth(-1.0)
        );
        // The other paths do not look at the PSD smoothing.
        assert!(time_domain(&ds, "alpha", &bad).is_ok());
    }
}
