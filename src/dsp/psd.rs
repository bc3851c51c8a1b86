//! Whole-signal multitaper power spectral density.

use std::f64::consts::PI;

use log::{debug, warn};
use rustfft::num_complex::Complex64;

use super::analysis_frequencies;
use super::tapers::dpss;
use crate::data::model::{FrequencyBand, Signal};
use crate::error::{PipelineError, Result};

/// Tapers whose in-band energy fraction is at or below this are discarded.
pub const MIN_CONCENTRATION: f64 = 0.9;

/// Upper bound on the tapers computed for one PSD. `2NW` grows with the
/// signal length, so long recordings would otherwise ask for thousands.
pub const MAX_TAPERS: usize = 32;

/// One-sided power spectral density in `unit² / Hz`.
#[derive(Debug, Clone, PartialEq)]
pub struct PsdResult {
    pub power: Vec<f64>,
    pub freqs: Vec<f64>,
    /// Tapers that survived the concentration check.
    pub n_tapers: usize,
    pub smoothing_hz: f64,
    /// Recorded for display; the whole signal is always one segment.
    pub window_s: f64,
}

/// `10 * log10` of a [`PsdResult`], on the same frequencies.
#[derive(Debug, Clone, PartialEq)]
pub struct PsdResultDb {
    pub power_db: Vec<f64>,
    pub freqs: Vec<f64>,
}

impl PsdResult {
    /// Frequency of the largest power value.
    pub fn peak_frequency(&self) -> Option<f64> {
        self.power
            .iter()
            .zip(&self.freqs)
            .fold(None, |best: Option<(f64, f64)>, (&p, &f)| match best {
                Some((bp, _)) if bp >= p => best,
                _ => Some((p, f)),
            })
            .map(|(_, f)| f)
    }
}

/// Discrete-time Fourier transform of `x` at `freq_hz`, by phasor rotation.
fn dtft(x: &[f64], freq_hz: f64, sample_rate_hz: f64) -> Complex64 {
    let step = Complex64::from_polar(1.0, -2.0 * PI * freq_hz / sample_rate_hz);
    let mut phasor = Complex64::new(1.0, 0.0);
    let mut acc = Complex64::new(0.0, 0.0);
    for (i, &v) in x.iter().enumerate() {
        acc += phasor * v;
        phasor *= step;
        // Keep rounding from drifting the phasor off the unit circle.
        if i % 1024 == 1023 {
            phasor /= phasor.norm();
        }
    }
    acc
}

/// Multitaper PSD of the whole signal at every whole-hertz frequency in
/// `[ceil(low), floor(high))`.
///
/// `smoothing_hz` is the full spectral bandwidth of the tapers, giving a
/// time-half-bandwidth product of `smoothing_hz * N / (2 * fs)`. It must lie
/// in `(0, fs / 2]`. At most [`MAX_TAPERS`] tapers are used. `window_s`
/// must be positive but does not segment the signal.
pub fn compute_psd(
    signal: &Signal,
    band: &FrequencyBand,
    window_s: f64,
    smoothing_hz: f64,
) -> Result<PsdResult> {
    let fs = signal.sample_rate_hz();
    let nyquist = signal.nyquist_hz();
    let freqs = analysis_frequencies(band, nyquist)?;
    if !(smoothing_hz.is_finite() && smoothing_hz > 0.0 && smoothing_hz <= nyquist) {
        return Err(PipelineError::InvalidBandwidth(smoothing_hz));
    }
    if !(window_s.is_finite() && window_s > 0.0) {
        return Err(PipelineError::InvalidWindow(format!(
            "PSD window length {window_s} s must be positive"
        )));
    }
    if signal.is_empty() {
        return Err(PipelineError::EmptySignal);
    }

    let n = signal.len();
    let half_bandwidth = smoothing_hz * n as f64 / (2.0 * fs);
    let mut k_max = ((2.0 * half_bandwidth).floor() as usize).max(1);
    if k_max > MAX_TAPERS {
        warn!("psd: 2NW allows {k_max} tapers, using the first {MAX_TAPERS}");
        k_max = MAX_TAPERS;
    }
    let tapers = dpss(n, half_bandwidth, k_max);
    let offered = tapers.len();
    let tapers = tapers.retain_concentrated(MIN_CONCENTRATION);
    if tapers.len() < offered {
        warn!(
            "dropped {} of {offered} tapers with concentration <= {MIN_CONCENTRATION}",
            offered - tapers.len()
        );
    }
    debug!(
        "psd: {n} samples, NW {half_bandwidth:.2}, {} tapers, {} freqs",
        tapers.len(),
        freqs.len()
    );

    let weight_sum: f64 = tapers.concentrations.iter().sum();
    let weights: Vec<f64> = if weight_sum > 0.0 {
        tapers.concentrations.iter().map(|&c| c / weight_sum).collect()
    } else {
        vec![1.0 / tapers.len() as f64; tapers.len()]
    };

    // One tapered copy of the signal at a time.
    let mut power = vec![0.0; freqs.len()];
    let mut tapered = vec![0.0; n];
    for (window, weight) in tapers.windows.iter().zip(&weights) {
        for ((x, a), b) in tapered.iter_mut().zip(window).zip(signal.values()) {
            *x = a * b;
        }
        for (p, &f) in power.iter_mut().zip(&freqs) {
            *p += weight * dtft(&tapered, f, fs).norm_sqr();
        }
    }

    for (p, &f) in power.iter_mut().zip(&freqs) {
        let one_sided = if f == 0.0 || f == nyquist { 1.0 } else { 2.0 };
        *p *= one_sided / fs;
    }

    Ok(PsdResult {
        power,
        freqs,
        n_tapers: tapers.len(),
        smoothing_hz,
        window_s,
    })
}

/// Pointwise `10 * log10(power)`.
pub fn to_decibels(result: &PsdResult) -> Result<PsdResultDb> {
    let power_db = result
        .power
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            if value > 0.0 {
                Ok(10.0 * value.log10())
            } else {
                Err(PipelineError::NonPositivePower { index, value })
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PsdResultDb {
        power_db,
        freqs: result.freqs.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, fs: f64, n: usize) -> Signal {
        let values = (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect();
        Signal::new("sine", values, fs, "mV").unwrap()
    }

    fn linear(power: Vec<f64>) -> PsdResult {
        let freqs = (1..=power.len()).map(|f| f as f64).collect();
        PsdResult {
            power,
            freqs,
            n_tapers: 1,
            smoothing_hz: 2.0,
            window_s: 4.0,
        }
    }

    #[test]
    fn peak_at_sine_frequency() {
        let signal = sine(10.0, 100.0, 1000);
        let psd = compute_psd(&signal, &FrequencyBand::between(1.0, 50.0), 4.0, 2.0).unwrap();
        assert_eq!(psd.freqs.len(), 49);
        assert_eq!(psd.power.len(), 49);
        assert_eq!(psd.peak_frequency(), Some(10.0));
        assert!(psd.power.iter().all(|&p| p >= 0.0));
        assert!(psd.n_tapers >= 1);
        assert_eq!(psd.window_s, 4.0);
    }

    #[test]
    fn power_integrates_to_mean_square() {
        // A unit sine has mean square 0.5.
        let signal = sine(10.0, 100.0, 1000);
        let psd = compute_psd(&signal, &FrequencyBand::between(1.0, 50.0), 4.0, 2.0).unwrap();
        let total: f64 = psd.power.iter().sum();
        assert!((0.35..0.65).contains(&total), "{total}");
    }

    #[test]
    fn dtft_matches_direct_sum() {
        let x: Vec<f64> = (0..3000).map(|i| ((i * 7) % 13) as f64 - 6.0).collect();
        let fast = dtft(&x, 17.0, 250.0);
        let direct: Complex64 = x
            .iter()
            .enumerate()
            .map(|(i, &v)| Complex64::from_polar(v, -2.0 * PI * 17.0 * i as f64 / 250.0))
            .sum();
        assert!((fast - direct).norm() < 1e-6);
    }

    #[test]
    fn validation_errors() {
        let signal = sine(10.0, 100.0, 500);
        let band = FrequencyBand::between(1.0, 40.0);

        assert!(matches!(
            compute_psd(&signal, &FrequencyBand::between(1.0, 51.0), 4.0, 2.0),
            Err(PipelineError::InvalidBand(_))
        ));
        assert_eq!(
            compute_psd(&signal, &band, 4.0, 0.0).unwrap_err(),
            PipelineError::InvalidBandwidth(0.0)
        );
        assert!(matches!(
            compute_psd(&signal, &band, 0.0, 2.0),
            Err(PipelineError::InvalidWindow(_))
        ));
        let empty = Signal::new("e", vec![], 100.0, "mV").unwrap();
        assert_eq!(
            compute_psd(&empty, &band, 4.0, 2.0).unwrap_err(),
            PipelineError::EmptySignal
        );
    }

    #[test]
    fn smoothing_above_nyquist_is_rejected() {
        let signal = sine(10.0, 100.0, 1000);
        let band = FrequencyBand::between(1.0, 40.0);
        assert_eq!(
            compute_psd(&signal, &band, 4.0, 60.0).unwrap_err(),
            PipelineError::InvalidBandwidth(60.0)
        );
        assert_eq!(
            compute_psd(&signal, &band, 4.0, f64::INFINITY).unwrap_err(),
            PipelineError::InvalidBandwidth(f64::INFINITY)
        );
        assert!(compute_psd(&signal, &band, 4.0, 50.0).is_ok());
    }

    #[test]
    fn taper_count_is_capped() {
        // NW = 5 * 2000 / 200 = 50 would allow 100 tapers.
        let signal = sine(10.0, 100.0, 2000);
        let psd = compute_psd(&signal, &FrequencyBand::between(1.0, 40.0), 4.0, 5.0).unwrap();
        assert!(psd.n_tapers >= 1 && psd.n_tapers <= MAX_TAPERS, "{}", psd.n_tapers);
        assert_eq!(psd.peak_frequency(), Some(10.0));
    }

    #[test]
    fn zero_hz_is_allowed() {
        let signal = sine(5.0, 100.0, 400);
        let psd = compute_psd(&signal, &FrequencyBand::between(0.0, 10.0), 4.0, 2.0).unwrap();
        assert_eq!(psd.freqs[0], 0.0);
        assert_eq!(psd.freqs.len(), 10);
    }

    #[test]
    fn decibels() {
        let db = to_decibels(&linear(vec![1.0, 0.1, 10.0])).unwrap();
        let expected = [0.0, -10.0, 10.0];
        for (got, want) in db.power_db.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{got} vs {want}");
        }
        assert_eq!(db.freqs, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn decibels_reject_non_positive_power() {
        assert_eq!(
            to_decibels(&linear(vec![1.0, 0.0, 2.0])).unwrap_err(),
            PipelineError::NonPositivePower { index: 1, value: 0.0 }
        );
        assert!(matches!(
            to_decibels(&linear(vec![-1.0])),
            Err(PipelineError::NonPositivePower { index: 0, .. })
        ));
        assert!(matches!(
            to_decibels(&linear(vec![2.0, f64::NAN])),
            Err(PipelineError::NonPositivePower { index: 1, .. })
        ));
    }

    #[test]
    fn decibels_of_empty_result_are_empty() {
        let db = to_decibels(&linear(vec![])).unwrap();
        assert!(db.power_db.is_empty());
    }
}
