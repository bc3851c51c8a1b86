//! Zero-phase Butterworth band-pass filtering.
//!
//! Filters are cascades of second-order sections (biquads) run forward and
//! then backward over an odd-extended copy of the signal, so the output has
//! no phase shift relative to the input time axis.

use std::f64::consts::PI;

use log::{debug, warn};

use crate::data::model::{FrequencyBand, Signal};
use crate::error::{PipelineError, Result};

/// Order of each Butterworth edge before the forward-backward pass doubles it.
pub const FILTER_ORDER: usize = 4;

/// Second-order section coefficients, `a0` normalised to 1.
/// H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Direct Form II Transposed state after a unit step has settled.
    fn step_state(&self) -> [f64; 2] {
        let y = self.dc_gain();
        [y - self.b0, self.b2 - self.a2 * y]
    }
}

/// Cascaded second-order sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SosFilter {
    sections: Vec<BiquadCoeffs>,
}

impl SosFilter {
    pub fn new(sections: Vec<BiquadCoeffs>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[BiquadCoeffs] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Append another cascade after this one.
    pub fn then(mut self, other: SosFilter) -> Self {
        self.sections.extend(other.sections);
        self
    }

    /// Gain at 0 Hz of the whole cascade.
    pub fn dc_gain(&self) -> f64 {
        self.sections.iter().map(BiquadCoeffs::dc_gain).product()
    }

    /// Per-section states for a constant unit input, each section seeing
    /// the settled output of the sections before it.
    fn steady_state(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|s| {
                let [z1, z2] = s.step_state();
                let zi = [z1 * scale, z2 * scale];
                scale *= s.dc_gain();
                zi
            })
            .collect()
    }

    /// One causal pass, states initialised to `zi * x0`.
    fn run(&self, x: &[f64], zi: &[[f64; 2]], x0: f64) -> Vec<f64> {
        let mut state: Vec<[f64; 2]> = zi.iter().map(|z| [z[0] * x0, z[1] * x0]).collect();
        x.iter()
            .map(|&input| {
                let mut v = input;
                for (c, z) in self.sections.iter().zip(state.iter_mut()) {
                    let out = c.b0 * v + z[0];
                    z[0] = c.b1 * v - c.a1 * out + z[1];
                    z[1] = c.b2 * v - c.a2 * out;
                    v = out;
                }
                v
            })
            .collect()
    }

    /// Forward-backward filtering; output has the input's length and no
    /// phase shift.
    pub fn filtfilt(&self, x: &[f64]) -> Vec<f64> {
        let n = x.len();
        if n == 0 || self.sections.is_empty() {
            return x.to_vec();
        }
        let padlen = (3 * (2 * self.sections.len() + 1)).min(n - 1);
        let ext = odd_extend(x, padlen);
        let zi = self.steady_state();

        let forward = self.run(&ext, &zi, ext[0]);
        let reversed: Vec<f64> = forward.into_iter().rev().collect();
        let mut backward = self.run(&reversed, &zi, reversed[0]);
        backward.reverse();
        backward[padlen..padlen + n].to_vec()
    }
}

/// Point-symmetric extension around both end samples.
fn odd_extend(x: &[f64], pad: usize) -> Vec<f64> {
    let n = x.len();
    let (first, last) = (x[0], x[n - 1]);
    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=pad).map(|i| 2.0 * last - x[n - 1 - i]));
    out
}

/// Butterworth filter designer (bilinear transform with prewarping).
pub struct Butterworth;

impl Butterworth {
    pub fn lowpass(cutoff_hz: f64, sample_rate_hz: f64, order: usize) -> SosFilter {
        let wn = Self::prewarp(cutoff_hz, sample_rate_hz);
        SosFilter::new(Self::design(wn, order, false))
    }

    pub fn highpass(cutoff_hz: f64, sample_rate_hz: f64, order: usize) -> SosFilter {
        let wn = Self::prewarp(cutoff_hz, sample_rate_hz);
        SosFilter::new(Self::design(wn, order, true))
    }

    fn prewarp(freq: f64, sample_rate: f64) -> f64 {
        (PI * freq / sample_rate).tan()
    }

    fn design(wn: f64, order: usize, highpass: bool) -> Vec<BiquadCoeffs> {
        let mut sections = Vec::with_capacity(order.div_ceil(2));
        let wn2 = wn * wn;

        // Conjugate pole pairs: s^2 + 2 sin(theta) s + 1 on the unit circle.
        for k in 0..order / 2 {
            let theta = PI * (2 * k + 1) as f64 / (2 * order) as f64;
            let damping = 2.0 * theta.sin();
            let denom = 1.0 + damping * wn + wn2;
            let a1 = 2.0 * (wn2 - 1.0) / denom;
            let a2 = (1.0 - damping * wn + wn2) / denom;
            let (b0, b1, b2) = if highpass {
                (1.0 / denom, -2.0 / denom, 1.0 / denom)
            } else {
                (wn2 / denom, 2.0 * wn2 / denom, wn2 / denom)
            };
            sections.push(BiquadCoeffs { b0, b1, b2, a1, a2 });
        }

        // Odd order: one real pole at s = -1.
        if order % 2 == 1 {
            let a1 = (wn - 1.0) / (wn + 1.0);
            let (b0, b1) = if highpass {
                (1.0 / (1.0 + wn), -1.0 / (1.0 + wn))
            } else {
                (wn / (1.0 + wn), wn / (1.0 + wn))
            };
            sections.push(BiquadCoeffs {
                b0,
                b1,
                b2: 0.0,
                a1,
                a2: 0.0,
            });
        }

        sections
    }
}

/// Check a filter band against the sample rate and design its cascade.
///
/// A high-pass edge of 0 Hz and a low-pass edge at Nyquist pass everything
/// and contribute no sections, so the result may be empty.
pub fn design_bandpass(band: &FrequencyBand, sample_rate_hz: f64) -> Result<SosFilter> {
    let nyquist = sample_rate_hz / 2.0;
    let invalid = |msg: String| Err(PipelineError::InvalidBand(msg));

    if band.low_hz.is_none() && band.high_hz.is_none() {
        return invalid("at least one of the high-pass or low-pass edges is required".into());
    }
    if let Some(low) = band.low_hz {
        if !(low.is_finite() && low >= 0.0) {
            return invalid(format!("high-pass edge {low} Hz must be a non-negative number"));
        }
        if low >= nyquist {
            return invalid(format!(
                "high-pass edge {low} Hz must be below Nyquist ({nyquist} Hz)"
            ));
        }
    }
    if let Some(high) = band.high_hz {
        if !(high.is_finite() && high > 0.0) {
            return invalid(format!("low-pass edge {high} Hz must be a positive number"));
        }
        if high > nyquist {
            return invalid(format!(
                "low-pass edge {high} Hz exceeds Nyquist ({nyquist} Hz)"
            ));
        }
    }
    if let (Some(low), Some(high)) = (band.low_hz, band.high_hz) {
        if low >= high {
            return invalid(format!(
                "high-pass edge {low} Hz must be below low-pass edge {high} Hz"
            ));
        }
    }

    let mut filter = SosFilter::default();
    if let Some(low) = band.low_hz.filter(|&low| low > 0.0) {
        filter = filter.then(Butterworth::highpass(low, sample_rate_hz, FILTER_ORDER));
    }
    if let Some(high) = band.high_hz.filter(|&high| high < nyquist) {
        filter = filter.then(Butterworth::lowpass(high, sample_rate_hz, FILTER_ORDER));
    }
    Ok(filter)
}

/// Zero-phase band-pass filter. The output has the input's length, rate and
/// time axis.
pub fn bandpass(signal: &Signal, band: &FrequencyBand) -> Result<Signal> {
    let filter = design_bandpass(band, signal.sample_rate_hz())?;

    if filter.is_empty() {
        warn!("filter band {band} passes everything; signal left unchanged");
        return Ok(signal.clone());
    }

    debug!(
        "bandpass {band}: {} sections over {} samples at {} Hz",
        filter.sections().len(),
        signal.len(),
        signal.sample_rate_hz()
    );
    let values = filter.filtfilt(signal.values());
    Ok(signal.derive(values, signal.start_time_s()))
}
