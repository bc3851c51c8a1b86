//! Single-channel signal analysis: band-pass trace, multitaper scalogram and
//! multitaper power spectral density, computed from an uploaded table.

pub mod config;
pub mod data;
pub mod dsp;
pub mod error;
pub mod pipeline;

pub use config::{AnalysisConfig, RateUnit};
pub use data::loader::{load_file, parse, parse_csv};
pub use data::model::{FrequencyBand, Signal, TabularDataset, TimeWindow, build};
pub use dsp::crop::crop;
pub use dsp::filter::bandpass;
pub use dsp::psd::{PsdResult, PsdResultDb, compute_psd, to_decibels};
pub use dsp::tfr::{TfrResult, compute_tfr};
pub use error::{PipelineError, Result};
pub use pipeline::{SpectralDensity, TimeDomainTrace, scalogram, spectral_density, time_domain};
