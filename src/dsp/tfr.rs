//! Multitaper time-frequency power (scalogram).

use std::f64::consts::PI;

use log::debug;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;

use super::analysis_frequencies;
use super::tapers::dpss;
use crate::data::model::{FrequencyBand, Signal};
use crate::error::{PipelineError, Result};

/// Wavelet width used when the caller has no preference.
pub const DEFAULT_N_CYCLES: f64 = 6.0;

/// Time-bandwidth product of the wavelet tapers; gives `floor(4 - 1) = 3`
/// tapers at half-bandwidth 2.
pub const TIME_BANDWIDTH: f64 = 4.0;

/// Power indexed by `[frequency][time]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TfrResult {
    pub power: Vec<Vec<f64>>,
    /// Ascending, whole hertz.
    pub freqs: Vec<f64>,
    /// Ascending, starting at 0 whatever the input's absolute start time.
    pub times: Vec<f64>,
}

impl TfrResult {
    pub fn n_freqs(&self) -> usize {
        self.freqs.len()
    }

    pub fn n_times(&self) -> usize {
        self.times.len()
    }

    /// Largest power value, 0 for an all-zero surface.
    pub fn max_power(&self) -> f64 {
        self.power
            .iter()
            .flatten()
            .copied()
            .fold(0.0, f64::max)
    }
}

/// Number of wavelet samples spanning `n_cycles` periods of `freq_hz`.
fn wavelet_len(n_cycles: f64, freq_hz: f64, sample_rate_hz: f64) -> usize {
    ((n_cycles / freq_hz * sample_rate_hz).ceil() as usize).max(1)
}

/// Tapered complex wavelets for one frequency, zero-mean, each divided by
/// `sqrt(0.5)` times its norm, leaving a norm of `sqrt(2)`.
fn wavelets(freq_hz: f64, len: usize, sample_rate_hz: f64) -> Vec<Vec<Complex64>> {
    let n_tapers = (TIME_BANDWIDTH - 1.0).floor() as usize;
    let t_win = len as f64 / sample_rate_hz;
    let tapers = dpss(len, TIME_BANDWIDTH / 2.0, n_tapers);

    tapers
        .windows
        .iter()
        .map(|taper| {
            let mut w: Vec<Complex64> = taper
                .iter()
                .enumerate()
                .map(|(j, &h)| {
                    let t = j as f64 / sample_rate_hz - t_win / 2.0;
                    Complex64::from_polar(h, 2.0 * PI * freq_hz * t)
                })
                .collect();

            let mean = w.iter().sum::<Complex64>() / len as f64;
            w.iter_mut().for_each(|c| *c -= mean);

            let norm = w.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
            if norm > 0.0 {
                let scale = 1.0 / (0.5_f64.sqrt() * norm);
                w.iter_mut().for_each(|c| *c *= scale);
            }
            w
        })
        .collect()
}

/// Multitaper time-frequency decomposition of the whole signal, treated as
/// one epoch starting at time 0.
///
/// Frequencies run over whole hertz in `[ceil(low), floor(high))`; the
/// wavelet at `f` spans `n_cycles / f` seconds, so the lowest frequency must
/// fit inside the signal.
pub fn compute_tfr(signal: &Signal, band: &FrequencyBand, n_cycles: f64) -> Result<TfrResult> {
    if !(n_cycles.is_finite() && n_cycles > 0.0) {
        return Err(PipelineError::InvalidCycles(n_cycles));
    }
    let fs = signal.sample_rate_hz();
    let freqs = analysis_frequencies(band, signal.nyquist_hz())?;
    if freqs[0] < 1.0 {
        return Err(PipelineError::InvalidBand(format!(
            "scalogram band {band} must start at 1 Hz or above"
        )));
    }
    if signal.is_empty() {
        return Err(PipelineError::EmptySignal);
    }

    let n = signal.len();
    let lengths: Vec<usize> = freqs.iter().map(|&f| wavelet_len(n_cycles, f, fs)).collect();
    // The lowest frequency has the longest wavelet.
    if lengths[0] > n {
        return Err(PipelineError::WaveletTooLong {
            freq_hz: freqs[0],
            wavelet_len: lengths[0],
            signal_len: n,
        });
    }

    let nfft = (n + lengths[0] - 1).next_power_of_two();
    debug!(
        "tfr: {} freqs x {n} samples, n_cycles {n_cycles}, fft size {nfft}",
        freqs.len()
    );

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nfft);
    let ifft = planner.plan_fft_inverse(nfft);

    let mut spectrum: Vec<Complex64> = signal
        .values()
        .iter()
        .map(|&x| Complex64::new(x, 0.0))
        .collect();
    spectrum.resize(nfft, Complex64::new(0.0, 0.0));
    fft.process(&mut spectrum);

    let inv_nfft = 1.0 / nfft as f64;
    let mut power = Vec::with_capacity(freqs.len());
    let mut buf = vec![Complex64::new(0.0, 0.0); nfft];

    for (&freq, &len) in freqs.iter().zip(&lengths) {
        let kernels = wavelets(freq, len, fs);
        let mut row = vec![0.0; n];
        // "same" alignment of the full convolution.
        let start = (len - 1) / 2;

        for kernel in &kernels {
            buf.iter_mut().for_each(|c| *c = Complex64::new(0.0, 0.0));
            buf[..len].copy_from_slice(kernel);
            fft.process(&mut buf);
            buf.iter_mut()
                .zip(&spectrum)
                .for_each(|(w, x)| *w *= *x);
            ifft.process(&mut buf);

            for (p, c) in row.iter_mut().zip(&buf[start..start + n]) {
                *p += (*c * inv_nfft).norm_sqr();
            }
        }

        let n_kernels = kernels.len().max(1) as f64;
        row.iter_mut().for_each(|p| *p /= n_kernels);
        power.push(row);
    }

    let times = (0..n).map(|i| i as f64 / fs).collect();
    Ok(TfrResult {
        power,
        freqs,
        times,
    })
}
