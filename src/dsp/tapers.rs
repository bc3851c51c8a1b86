//! Discrete prolate spheroidal sequences (Slepian tapers).
//!
//! The tapers are the eigenvectors of the symmetric tridiagonal matrix that
//! commutes with the time-and-band limiting operator. The largest eigenvalues
//! are found by Sturm-sequence bisection and their vectors by inverse
//! iteration, which stays O(n) per taper even for whole-signal PSDs. Each
//! vector is re-orthogonalised against a fixed number of its predecessors, so
//! `k` tapers cost O(k·n) rather than O(k²·n).

use std::f64::consts::PI;

use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;

/// Orthonormal tapers, most concentrated first.
#[derive(Debug, Clone, Default)]
pub struct Tapers {
    /// Each window has unit energy (sum of squares = 1).
    pub windows: Vec<Vec<f64>>,
    /// Fraction of each window's energy inside the band, in `[0, 1]`.
    pub concentrations: Vec<f64>,
}

impl Tapers {
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drop tapers whose concentration is at or below `threshold`, keeping
    /// the best one if none pass.
    pub fn retain_concentrated(mut self, threshold: f64) -> Self {
        let keep: Vec<bool> = self.concentrations.iter().map(|&c| c > threshold).collect();
        if !keep.iter().any(|&k| k) {
            self.windows.truncate(1);
            self.concentrations.truncate(1);
            return self;
        }
        let mut flags = keep.iter();
        self.windows.retain(|_| *flags.next().unwrap_or(&false));
        let mut flags = keep.iter();
        self.concentrations.retain(|_| *flags.next().unwrap_or(&false));
        self
    }
}

/// Compute up to `k_max` DPSS windows of length `n` with time-half-bandwidth
/// product `half_bandwidth` (NW).
pub fn dpss(n: usize, half_bandwidth: f64, k_max: usize) -> Tapers {
    let k = k_max.min(n);
    if k == 0 {
        return Tapers::default();
    }
    let w = (half_bandwidth / n as f64).min(0.5);

    let cos_w = (2.0 * PI * w).cos();
    let diag: Vec<f64> = (0..n)
        .map(|i| {
            let c = (n as f64 - 1.0 - 2.0 * i as f64) / 2.0;
            c * c * cos_w
        })
        .collect();
    let off: Vec<f64> = (1..n)
        .map(|i| i as f64 * (n - i) as f64 / 2.0)
        .collect();

    let mut windows: Vec<Vec<f64>> = Vec::with_capacity(k);
    for order in 0..k {
        // Largest eigenvalue first.
        let lambda = nth_eigenvalue(&diag, &off, n - 1 - order);
        let mut v = inverse_iteration(&diag, &off, lambda, &windows);
        fix_sign(&mut v, order);
        windows.push(v);
    }

    let concentrations = windows.iter().map(|v| concentration(v, w)).collect();
    Tapers {
        windows,
        concentrations,
    }
}

/// Number of eigenvalues of the tridiagonal matrix strictly below `x`.
fn count_below(diag: &[f64], off: &[f64], x: f64, pivmin: f64) -> usize {
    let mut count = 0;
    let mut q = diag[0] - x;
    for i in 0..diag.len() {
        if i > 0 {
            q = diag[i] - x - off[i - 1] * off[i - 1] / q;
        }
        if q.abs() < pivmin {
            q = -pivmin;
        }
        if q < 0.0 {
            count += 1;
        }
    }
    count
}

/// `index`-th smallest eigenvalue by bisection inside the Gershgorin bounds.
fn nth_eigenvalue(diag: &[f64], off: &[f64], index: usize) -> f64 {
    let n = diag.len();
    let radius = |i: usize| {
        let left = if i > 0 { off[i - 1].abs() } else { 0.0 };
        let right = if i + 1 < n { off[i].abs() } else { 0.0 };
        left + right
    };
    let mut lo = (0..n).map(|i| diag[i] - radius(i)).fold(f64::INFINITY, f64::min);
    let mut hi = (0..n).map(|i| diag[i] + radius(i)).fold(f64::NEG_INFINITY, f64::max);
    let scale = lo.abs().max(hi.abs()).max(1.0);
    let pivmin = f64::MIN_POSITIVE.max(f64::EPSILON * scale * 1e-3);
    lo -= f64::EPSILON * scale;
    hi += f64::EPSILON * scale;

    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if hi - lo <= 2.0 * f64::EPSILON * scale || mid <= lo || mid >= hi {
            break;
        }
        if count_below(diag, off, mid, pivmin) > index {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Previously found tapers projected out of each new one. The eigenvalues are
/// simple, so rounding only pulls a vector toward its nearest neighbours.
const ORTHOGONALISE_NEIGHBOURS: usize = 8;

/// Eigenvector for `lambda`, orthogonal to the last few vectors found.
fn inverse_iteration(diag: &[f64], off: &[f64], lambda: f64, previous: &[Vec<f64>]) -> Vec<f64> {
    let n = diag.len();
    let mut v: Vec<f64> = (0..n).map(|i| 1.0 + i as f64 / n as f64).collect();
    normalize(&mut v);

    let lu = ShiftedTridiagonalLu::factor(diag, off, lambda);
    for _ in 0..5 {
        lu.solve(&mut v);
        for p in previous.iter().rev().take(ORTHOGONALISE_NEIGHBOURS) {
            let proj: f64 = v.iter().zip(p).map(|(a, b)| a * b).sum();
            v.iter_mut().zip(p).for_each(|(a, b)| *a -= proj * b);
        }
        normalize(&mut v);
    }
    v
}

fn normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Even tapers sum to a positive value; odd tapers start with a positive lobe.
fn fix_sign(v: &mut [f64], order: usize) {
    let flip = if order % 2 == 0 {
        v.iter().sum::<f64>() < 0.0
    } else {
        let thresh = (1.0 / v.len() as f64).max(1e-7);
        v.iter()
            .find(|x| *x * *x > thresh)
            .is_some_and(|&x| x < 0.0)
    };
    if flip {
        v.iter_mut().for_each(|x| *x = -*x);
    }
}

/// Energy fraction of `v` inside `[-w, w]` (cycles/sample), via the
/// autocorrelation of `v` against the sinc kernel of the band.
fn concentration(v: &[f64], w: f64) -> f64 {
    let n = v.len();
    let nfft = (2 * n - 1).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nfft);
    let ifft = planner.plan_fft_inverse(nfft);

    let mut buf: Vec<Complex64> = v.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    buf.resize(nfft, Complex64::new(0.0, 0.0));
    fft.process(&mut buf);
    buf.iter_mut().for_each(|c| *c = Complex64::new(c.norm_sqr(), 0.0));
    ifft.process(&mut buf);

    let scale = 1.0 / nfft as f64;
    let mut total = 2.0 * w * buf[0].re * scale;
    for (m, r) in buf.iter().enumerate().take(n).skip(1) {
        let m = m as f64;
        total += 2.0 * r.re * scale * (2.0 * PI * w * m).sin() / (PI * m);
    }
    total.clamp(0.0, 1.0)
}

/// LU factors of `T - shift·I` with partial pivoting, T symmetric
/// tridiagonal.
struct ShiftedTridiagonalLu {
    d: Vec<f64>,
    dl: Vec<f64>,
    du: Vec<f64>,
    du2: Vec<f64>,
    swapped: Vec<bool>,
}

impl ShiftedTridiagonalLu {
    fn factor(diag: &[f64], off: &[f64], shift: f64) -> Self {
        let n = diag.len();
        let mut d: Vec<f64> = diag.iter().map(|x| x - shift).collect();
        let mut dl = off.to_vec();
        let mut du = off.to_vec();
        let mut du2 = vec![0.0; n.saturating_sub(2)];
        let mut swapped = vec![false; n.saturating_sub(1)];

        for i in 0..n.saturating_sub(1) {
            if d[i].abs() >= dl[i].abs() {
                if d[i] != 0.0 {
                    let fact = dl[i] / d[i];
                    dl[i] = fact;
                    d[i + 1] -= fact * du[i];
                }
            } else {
                let fact = d[i] / dl[i];
                d[i] = dl[i];
                dl[i] = fact;
                let temp = du[i];
                du[i] = d[i + 1];
                d[i + 1] = temp - fact * d[i + 1];
                if i + 2 < n {
                    du2[i] = du[i + 1];
                    du[i + 1] = -fact * du[i + 1];
                }
                swapped[i] = true;
            }
        }

        // An exact eigenvalue shift leaves a zero pivot; nudge it so the
        // solve amplifies the eigenvector instead of dividing by zero.
        let scale = d.iter().fold(0.0_f64, |m, x| m.max(x.abs())).max(1.0);
        for x in d.iter_mut() {
            if x.abs() < f64::EPSILON * scale {
                *x = f64::EPSILON * scale;
            }
        }

        Self {
            d,
            dl,
            du,
            du2,
            swapped,
        }
    }

    fn solve(&self, b: &mut [f64]) {
        let n = self.d.len();
        for i in 0..n.saturating_sub(1) {
            if self.swapped[i] {
                let temp = b[i] - self.dl[i] * b[i + 1];
                b[i] = b[i + 1];
                b[i + 1] = temp;
            } else {
                b[i + 1] -= self.dl[i] * b[i];
            }
        }

        b[n - 1] /= self.d[n - 1];
        if n > 1 {
            b[n - 2] = (b[n - 2] - self.du[n - 2] * b[n - 1]) / self.d[n - 2];
        }
        for i in (0..n.saturating_sub(2)).rev() {
            b[i] = (b[i] - self.du[i] * b[i + 1] - self.du2[i] * b[i + 2]) / self.d[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn tapers_are_orthonormal() {
        let tapers = dpss(128, 4.0, 7);
        assert_eq!(tapers.len(), 7);
        for (i, a) in tapers.windows.iter().enumerate() {
            assert_eq!(a.len(), 128);
            for (j, b) in tapers.windows.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot(a, b) - expected).abs() < 1e-8, "({i}, {j})");
            }
        }
    }

    #[test]
    fn many_tapers_stay_orthonormal() {
        let k = 3 * ORTHOGONALISE_NEIGHBOURS;
        let tapers = dpss(600, 16.0, k);
        assert_eq!(tapers.len(), k);
        for (i, a) in tapers.windows.iter().enumerate() {
            for (j, b) in tapers.windows.iter().enumerate().skip(i) {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot(a, b) - expected).abs() < 1e-8, "({i}, {j})");
            }
        }
    }

    #[test]
    fn even_tapers_symmetric_odd_antisymmetric() {
        let tapers = dpss(64, 2.5, 4);
        for (k, w) in tapers.windows.iter().enumerate() {
            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
            for i in 0..32 {
                assert!((w[i] - sign * w[63 - i]).abs() < 1e-8, "taper {k}, index {i}");
            }
        }
        assert!(tapers.windows[0].iter().sum::<f64>() > 0.0);
        assert!(tapers.windows[0][32] > 0.0);
    }

    #[test]
    fn concentrations_decrease_from_near_one() {
        let tapers = dpss(256, 4.0, 8);
        assert!(tapers.concentrations[0] > 0.9999);
        assert!(tapers.concentrations[5] > 0.9);
        for pair in tapers.concentrations.windows(2) {
            assert!(pair[0] >= pair[1] - 1e-9, "{pair:?}");
        }
        // Beyond 2NW tapers leak heavily.
        let many = dpss(256, 4.0, 12);
        assert!(many.concentrations[11] < 0.5);
    }

    #[test]
    fn first_taper_matches_eigenvector_equation() {
        // Check T v = lambda v directly on a small case.
        let n = 16;
        let nw = 2.0;
        let tapers = dpss(n, nw, 1);
        let v = &tapers.windows[0];
        let w = nw / n as f64;
        let cos_w = (2.0 * PI * w).cos();
        let diag = |i: usize| {
            let c = (n as f64 - 1.0 - 2.0 * i as f64) / 2.0;
            c * c * cos_w
        };
        let off = |i: usize| (i + 1) as f64 * (n - 1 - i) as f64 / 2.0;
        let tv: Vec<f64> = (0..n)
            .map(|i| {
                let mut s = diag(i) * v[i];
                if i > 0 {
                    s += off(i - 1) * v[i - 1];
                }
                if i + 1 < n {
                    s += off(i) * v[i + 1];
                }
                s
            })
            .collect();
        let lambda = dot(&tv, v);
        for i in 0..n {
            assert!((tv[i] - lambda * v[i]).abs() < 1e-6 * lambda.abs().max(1.0));
        }
    }

    #[test]
    fn degenerate_sizes() {
        assert!(dpss(0, 2.0, 3).is_empty());
        assert!(dpss(10, 2.0, 0).is_empty());
        let one = dpss(1, 2.0, 3);
        assert_eq!(one.len(), 1);
        assert!((one.windows[0][0] - 1.0).abs() < 1e-12);
        let two = dpss(2, 0.5, 2);
        assert_eq!(two.len(), 2);
    }

    #[test]
    fn retain_keeps_best_when_none_pass() {
        let tapers = Tapers {
            windows: vec![vec![1.0], vec![1.0]],
            concentrations: vec![0.5, 0.4],
        };
        let kept = tapers.retain_concentrated(0.9);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.concentrations, vec![0.5]);

        let tapers = Tapers {
            windows: vec![vec![1.0], vec![2.0], vec![3.0]],
            concentrations: vec![0.99, 0.95, 0.6],
        };
        let kept = tapers.retain_concentrated(0.9);
        assert_eq!(kept.windows, vec![vec![1.0], vec![2.0]]);
    }
}
