use thiserror::Error;

/// Every way a pipeline stage can refuse its input.
///
/// Stages validate eagerly and return one of these instead of letting a
/// numeric routine produce NaNs or panic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("Unknown column '{column}' (available: {})", available.join(", "))]
    UnknownColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Invalid sample rate {0} Hz: must be a positive number")]
    InvalidRate(f64),

    #[error("Invalid frequency band: {0}")]
    InvalidBand(String),

    #[error("Invalid multitaper bandwidth {0} Hz: must be positive and at most the Nyquist frequency")]
    InvalidBandwidth(f64),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("Invalid wavelet width {0} cycles: must be a positive number")]
    InvalidCycles(f64),

    #[error("Signal is empty")]
    EmptySignal,

    #[error(
        "Wavelet at {freq_hz} Hz spans {wavelet_len} samples but the signal only has {signal_len}"
    )]
    WaveletTooLong {
        freq_hz: f64,
        wavelet_len: usize,
        signal_len: usize,
    },

    #[error("Power at index {index} is {value}: decibels need strictly positive power")]
    NonPositivePower { index: usize, value: f64 },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
