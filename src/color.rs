use eframe::egui::{Color32, ColorImage};
use palette::{LinSrgb, Mix, Srgb};

use rusty_signal::TfrResult;

// ---------------------------------------------------------------------------
// Sequential colour scale
// ---------------------------------------------------------------------------

/// Viridis control points, dark to bright.
const VIRIDIS: [(u8, u8, u8); 5] = [
    (0x44, 0x01, 0x54),
    (0x3b, 0x52, 0x8b),
    (0x21, 0x91, 0x8c),
    (0x5e, 0xc9, 0x62),
    (0xfd, 0xe7, 0x25),
];

/// Piecewise-linear colour scale, interpolated in linear RGB.
#[derive(Debug, Clone)]
pub struct ColorScale {
    stops: Vec<LinSrgb>,
}

impl ColorScale {
    pub fn viridis() -> Self {
        let stops = VIRIDIS
            .iter()
            .map(|&(r, g, b)| Srgb::new(r, g, b).into_format::<f32>().into_linear())
            .collect();
        Self { stops }
    }

    /// Colour at `t` in `[0, 1]`; values outside are clamped.
    pub fn color_at(&self, t: f32) -> Color32 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let span = (self.stops.len() - 1) as f32;
        let pos = t * span;
        let i = (pos.floor() as usize).min(self.stops.len() - 2);
        let lin = self.stops[i].mix(self.stops[i + 1], pos - i as f32);
        let rgb: Srgb = Srgb::from_linear(lin);
        let rgb = rgb.into_format::<u8>();
        Color32::from_rgb(rgb.red, rgb.green, rgb.blue)
    }

    /// Render a scalogram as an image, lowest frequency on the bottom row,
    /// power normalised to the maximum. One column per time sample, unless
    /// that is wider than `max_width`; then runs of adjacent samples are
    /// averaged into one column.
    pub fn scalogram_image(&self, tfr: &TfrResult, max_width: usize) -> ColorImage {
        let per_column = tfr.n_times().div_ceil(max_width.max(1)).max(1);
        let width = tfr.n_times().div_ceil(per_column);
        let height = tfr.n_freqs();
        let max = tfr.max_power();
        let scale = if max > 0.0 { 1.0 / max } else { 0.0 };

        let pixels = tfr
            .power
            .iter()
            .rev()
            .flat_map(|row| {
                row.chunks(per_column).map(move |run| {
                    let mean = run.iter().sum::<f64>() / run.len() as f64;
                    self.color_at((mean * scale) as f32)
                })
            })
            .collect();

        ColorImage {
            size: [width, height],
            pixels,
        }
    }
}
