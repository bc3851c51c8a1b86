use std::fs;
use std::path::Path;

use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};

use crate::data::model::{FrequencyBand, TimeWindow};
use crate::dsp::tfr::DEFAULT_N_CYCLES;

// ---------------------------------------------------------------------------
// Acquisition rate
// ---------------------------------------------------------------------------

/// Unit the acquisition rate is entered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateUnit {
    Hertz,
    /// Samples per millisecond, as most acquisition front-ends report it.
    #[default]
    SamplesPerMillisecond,
}

impl RateUnit {
    pub fn label(self) -> &'static str {
        match self {
            RateUnit::Hertz => "Hz",
            RateUnit::SamplesPerMillisecond => "samples/ms",
        }
    }

    pub fn to_hz(self, rate: f64) -> f64 {
        match self {
            RateUnit::Hertz => rate,
            RateUnit::SamplesPerMillisecond => rate * 1000.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-invocation parameters
// ---------------------------------------------------------------------------

/// Every parameter the three analysis paths take, besides the dataset and
/// column. Missing fields fall back to their defaults when deserialised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_rate")]
    pub sample_rate: f64,
    #[serde(default)]
    pub rate_unit: RateUnit,
    /// Display only.
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub window: TimeWindow,
    #[serde(default = "default_filter_band")]
    pub filter_band: FrequencyBand,
    /// Shared by the scalogram and the PSD.
    #[serde(default = "default_analysis_band")]
    pub analysis_band: FrequencyBand,
    #[serde(default = "default_n_cycles")]
    pub n_cycles: f64,
    #[serde(default = "default_psd_window")]
    pub psd_window_s: f64,
    #[serde(default = "default_smoothing")]
    pub smoothing_hz: f64,
}

fn default_rate() -> f64 {
    1.0
}

fn default_unit() -> String {
    "mV".to_string()
}

fn default_filter_band() -> FrequencyBand {
    FrequencyBand::between(0.0, 100.0)
}

fn default_analysis_band() -> FrequencyBand {
    FrequencyBand::between(1.0, 50.0)
}

fn default_n_cycles() -> f64 {
    DEFAULT_N_CYCLES
}

fn default_psd_window() -> f64 {
    4.0
}

fn default_smoothing() -> f64 {
    2.0
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_rate(),
            rate_unit: RateUnit::default(),
            unit: default_unit(),
            window: TimeWindow::default(),
            filter_band: default_filter_band(),
            analysis_band: default_analysis_band(),
            n_cycles: default_n_cycles(),
            psd_window_s: default_psd_window(),
            smoothing_hz: default_smoothing(),
        }
    }
}

impl AnalysisConfig {
    /// Acquisition rate converted to hertz.
    pub fn sample_rate_hz(&self) -> f64 {
        self.rate_unit.to_hz(self.sample_rate)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read settings file: {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        info!("Loaded settings from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self).context("Cannot serialise settings")?;
        fs::write(path, text)
            .with_context(|| format!("Cannot write settings file: {}", path.display()))?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }
}
