//! Signal-processing stages.
//!
//! ```text
//!   Signal ──► filter::bandpass ──► crop::crop          (time-domain trace)
//!         │                   └──► tfr::compute_tfr     (scalogram)
//!         └──► psd::compute_psd ──► psd::to_decibels    (spectral density)
//! ```
//!
//! Every stage borrows its input and returns a new value.

pub mod crop;
pub mod filter;
pub mod psd;
pub mod tapers;
pub mod tfr;

use crate::data::model::FrequencyBand;
use crate::error::{PipelineError, Result};

/// Whole-hertz analysis grid: every integer `f` with
/// `ceil(low_hz) <= f < floor(high_hz)`.
///
/// Both edges are required and the band must sit inside `[0, nyquist]`.
pub(crate) fn analysis_frequencies(band: &FrequencyBand, nyquist_hz: f64) -> Result<Vec<f64>> {
    let invalid = |msg: String| Err(PipelineError::InvalidBand(msg));

    let (low, high) = match (band.low_hz, band.high_hz) {
        (Some(low), Some(high)) => (low, high),
        _ => return invalid(format!("analysis band {band} needs both edges")),
    };
    if !(low.is_finite() && low >= 0.0) {
        return invalid(format!("lower edge {low} Hz must be a non-negative number"));
    }
    if !(high.is_finite() && high > low) {
        return invalid(format!("upper edge {high} Hz must be above lower edge {low} Hz"));
    }
    if high > nyquist_hz {
        return invalid(format!(
            "upper edge {high} Hz exceeds Nyquist ({nyquist_hz} Hz)"
        ));
    }

    let first = low.ceil() as u64;
    let stop = high.floor() as u64;
    if stop <= first {
        return invalid(format!("{band} contains no whole-hertz frequency"));
    }
    Ok((first..stop).map(|f| f as f64).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_grid_excludes_upper_edge() {
        let freqs = analysis_frequencies(&FrequencyBand::between(1.0, 50.0), 50.0).unwrap();
        assert_eq!(freqs.len(), 49);
        assert_eq!(freqs[0], 1.0);
        assert_eq!(freqs[48], 49.0);
    }

    #[test]
    fn fractional_edges_round_inward() {
        let freqs = analysis_frequencies(&FrequencyBand::between(2.5, 20.5), 100.0).unwrap();
        assert_eq!(freqs.len(), 20 - 3);
        assert_eq!(freqs.first(), Some(&3.0));
        assert_eq!(freqs.last(), Some(&19.0));
    }

    #[test]
    fn rejects_bad_bands() {
        let nyq = 50.0;
        for band in [
            FrequencyBand::new(Some(1.0), None),
            FrequencyBand::new(None, Some(10.0)),
            FrequencyBand::between(10.0, 5.0),
            FrequencyBand::between(-1.0, 5.0),
            FrequencyBand::between(1.0, 60.0),
            FrequencyBand::between(1.2, 1.8),
        ] {
            assert!(
                matches!(analysis_frequencies(&band, nyq), Err(PipelineError::InvalidBand(_))),
                "{band}"
            );
        }
    }
}
