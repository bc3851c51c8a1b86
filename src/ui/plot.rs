use eframe::egui::{self, Color32, RichText, TextureOptions, Ui};
use egui_plot::{Line, Plot, PlotImage, PlotPoint, PlotPoints};

use rusty_signal::PipelineError;

use crate::color::ColorScale;
use crate::state::{AppState, PathOutput, View};

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Render the selected result in the central panel.
pub fn central_panel(ui: &mut Ui, state: &mut AppState) {
    if state.dataset.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to analyse a signal  (File → Open…)");
        });
        return;
    }

    ui.horizontal(|ui: &mut Ui| {
        ui.selectable_value(&mut state.view, View::Trace, "Time domain");
        ui.selectable_value(&mut state.view, View::Scalogram, "Scalogram");
        ui.selectable_value(&mut state.view, View::Spectrum, "PSD");
    });
    ui.separator();

    match state.view {
        View::Trace => trace_plot(ui, state),
        View::Scalogram => scalogram_plot(ui, state),
        View::Spectrum => spectrum_plot(ui, state),
    }
}

/// Placeholder text for a path that has not run or has failed. Returns the
/// result when there is one to draw.
fn ready<'a, T>(ui: &mut Ui, output: &'a PathOutput<T>, action: &str) -> Option<&'a T> {
    match output {
        None => {
            ui.label(format!("Press \"{action}\" to compute."));
            None
        }
        Some(Err(e)) => {
            error_label(ui, e);
            None
        }
        Some(Ok(value)) => Some(value),
    }
}

fn error_label(ui: &mut Ui, e: &PipelineError) {
    ui.label(RichText::new(e.to_string()).color(Color32::RED));
}

// ---------------------------------------------------------------------------
// Time-domain trace
// ---------------------------------------------------------------------------

fn trace_plot(ui: &mut Ui, state: &AppState) {
    let Some(trace) = ready(ui, &state.trace, "Analyze") else {
        return;
    };

    ui.label(RichText::new(&trace.title).strong());
    let points: PlotPoints = trace
        .times
        .iter()
        .zip(&trace.values)
        .map(|(&t, &v)| [t, v])
        .collect();

    Plot::new("trace_plot")
        .x_axis_label(&trace.x_label)
        .y_axis_label(&trace.y_label)
        .allow_boxed_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(points).color(Color32::LIGHT_BLUE).width(1.0));
        });
}

// ---------------------------------------------------------------------------
// Scalogram heatmap
// ---------------------------------------------------------------------------

fn scalogram_plot(ui: &mut Ui, state: &mut AppState) {
    let Some(tfr) = ready(ui, &state.scalogram, "Scalogram") else {
        return;
    };
    let (Some(&t0), Some(&t1), Some(&f0), Some(&f1)) = (
        tfr.times.first(),
        tfr.times.last(),
        tfr.freqs.first(),
        tfr.freqs.last(),
    ) else {
        return;
    };

    let texture = state.scalogram_texture.get_or_insert_with(|| {
        let max_side = ui.ctx().input(|i| i.max_texture_side);
        let image = ColorScale::viridis().scalogram_image(tfr, max_side);
        ui.ctx().load_texture("scalogram", image, TextureOptions::LINEAR)
    });

    // The image spans one sample period past the last time and one hertz
    // past the last frequency, however many columns it was averaged into.
    let dt = if tfr.n_times() > 1 {
        (t1 - t0) / (tfr.n_times() - 1) as f64
    } else {
        1.0
    };
    let center = PlotPoint::new((t0 + t1) / 2.0, (f0 + f1) / 2.0);
    let size = egui::vec2((t1 - t0 + dt) as f32, (f1 - f0 + 1.0) as f32);

    ui.label(RichText::new("Scalogram (multitaper wavelet power)").strong());
    Plot::new("scalogram_plot")
        .x_axis_label("Time (s)")
        .y_axis_label("Frequency (Hz)")
        .allow_boxed_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.image(PlotImage::new(texture.id(), center, size));
        });
}

// ---------------------------------------------------------------------------
// Power spectral density
// ---------------------------------------------------------------------------

fn spectrum_plot(ui: &mut Ui, state: &mut AppState) {
    ui.checkbox(&mut state.spectrum_db, "Decibels");
    let Some(psd) = ready(ui, &state.spectrum, "PSD") else {
        return;
    };

    let (values, y_label) = if state.spectrum_db {
        (&psd.db.power_db, "Power (dB)".to_string())
    } else {
        (&psd.linear.power, format!("Power ({}²/Hz)", state.config.unit))
    };
    let points: PlotPoints = psd
        .linear
        .freqs
        .iter()
        .zip(values)
        .map(|(&f, &p)| [f, p])
        .collect();

    ui.label(
        RichText::new(format!(
            "Power spectral density ({} tapers, {} Hz smoothing)",
            psd.linear.n_tapers, psd.linear.smoothing_hz
        ))
        .strong(),
    );
    Plot::new("psd_plot")
        .x_axis_label("Frequency (Hz)")
        .y_axis_label(y_label)
        .allow_boxed_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(points).color(Color32::LIGHT_GREEN).width(1.5));
        });
}
