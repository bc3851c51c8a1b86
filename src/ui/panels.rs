use eframe::egui::{self, Color32, DragValue, RichText, ScrollArea, Ui};

use rusty_signal::{AnalysisConfig, RateUnit};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – column and parameters
// ---------------------------------------------------------------------------

/// Render the left settings panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Signal");
    ui.separator();

    let Some(dataset) = &state.dataset else {
        ui.label("No dataset loaded.");
        return;
    };
    let columns: Vec<String> = dataset.column_names().iter().map(|s| s.to_string()).collect();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.strong("Column");
            let current = state.selected_column.clone().unwrap_or_default();
            egui::ComboBox::from_id_salt("column")
                .selected_text(&current)
                .show_ui(ui, |ui: &mut Ui| {
                    for col in &columns {
                        if ui.selectable_label(current == *col, col).clicked() {
                            state.selected_column = Some(col.clone());
                        }
                    }
                });
            ui.separator();

            parameters(ui, &mut state.config);
            ui.separator();

            ui.horizontal_wrapped(|ui: &mut Ui| {
                if ui.button("Analyze").clicked() {
                    state.run_time_domain();
                }
                if ui.button("Scalogram").clicked() {
                    state.run_scalogram();
                }
                if ui.button("PSD").clicked() {
                    state.run_spectral_density();
                }
            });
        });
}

fn parameters(ui: &mut Ui, config: &mut AnalysisConfig) {
    ui.strong("Acquisition");
    ui.horizontal(|ui: &mut Ui| {
        ui.add(DragValue::new(&mut config.sample_rate).speed(0.1).range(0.001..=f64::MAX));
        egui::ComboBox::from_id_salt("rate_unit")
            .selected_text(config.rate_unit.label())
            .show_ui(ui, |ui: &mut Ui| {
                for unit in [RateUnit::SamplesPerMillisecond, RateUnit::Hertz] {
                    ui.selectable_value(&mut config.rate_unit, unit, unit.label());
                }
            });
    });
    ui.label(format!("= {} Hz", config.sample_rate_hz()));
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Unit");
        ui.text_edit_singleline(&mut config.unit);
    });

    ui.add_space(4.0);
    ui.strong("Time window (s)");
    ui.horizontal(|ui: &mut Ui| {
        ui.add(DragValue::new(&mut config.window.start_s).speed(0.1).range(0.0..=f64::MAX));
        ui.label("to");
        ui.add(DragValue::new(&mut config.window.end_s).speed(0.1).range(0.0..=f64::MAX));
    });

    ui.add_space(4.0);
    ui.strong("Filter band");
    optional_edge(ui, "High-pass", &mut config.filter_band.low_hz, 1.0);
    optional_edge(ui, "Low-pass", &mut config.filter_band.high_hz, 100.0);

    ui.add_space(4.0);
    ui.strong("Scalogram / PSD band (Hz)");
    ui.horizontal(|ui: &mut Ui| {
        let low = config.analysis_band.low_hz.get_or_insert(1.0);
        ui.add(DragValue::new(low).speed(0.5).range(0.0..=f64::MAX));
        ui.label("to");
        let high = config.analysis_band.high_hz.get_or_insert(50.0);
        ui.add(DragValue::new(high).speed(0.5).range(0.0..=f64::MAX));
    });
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Wavelet cycles");
        ui.add(DragValue::new(&mut config.n_cycles).speed(0.1).range(0.1..=100.0));
    });
    ui.horizontal(|ui: &mut Ui| {
        ui.label("PSD window");
        ui.add(DragValue::new(&mut config.psd_window_s).speed(0.1).suffix(" s"));
    });
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Smoothing");
        ui.add(DragValue::new(&mut config.smoothing_hz).speed(0.1).suffix(" Hz"));
    });
}

/// Checkbox enabling a filter edge, plus its value when enabled.
fn optional_edge(ui: &mut Ui, label: &str, edge: &mut Option<f64>, initial: f64) {
    ui.horizontal(|ui: &mut Ui| {
        let mut enabled = edge.is_some();
        if ui.checkbox(&mut enabled, label).changed() {
            *edge = enabled.then_some(edge.unwrap_or(initial));
        }
        if let Some(hz) = edge.as_mut() {
            ui.add(DragValue::new(hz).speed(0.5).range(0.0..=f64::MAX).suffix(" Hz"));
        }
    });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Load settings…").clicked() {
                load_settings_dialog(state);
                ui.close_menu();
            }
            if ui.button("Save settings…").clicked() {
                save_settings_dialog(state);
                ui.close_menu();
            }
            if ui.button("Reset settings").clicked() {
                state.config = AnalysisConfig::default();
                ui.close_menu();
            }
        });

        ui.separator();

        if let (Some(ds), Some(name)) = (&state.dataset, &state.file_name) {
            ui.label(format!(
                "{name}: {} rows, {} columns",
                ds.n_rows(),
                ds.n_columns()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open signal data")
        .add_filter("Supported files", &["csv", "txt", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv", "txt"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        match rusty_signal::load_file(&path) {
            Ok(dataset) => {
                log::info!(
                    "Loaded {} rows with columns {:?}",
                    dataset.n_rows(),
                    dataset.column_names()
                );
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                state.set_dataset(dataset, name);
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}

fn load_settings_dialog(state: &mut AppState) {
    let Some(path) = rfd::FileDialog::new()
        .set_title("Load settings")
        .add_filter("JSON", &["json"])
        .pick_file()
    else {
        return;
    };
    match AnalysisConfig::load(&path) {
        Ok(config) => {
            state.config = config;
            state.status_message = None;
        }
        Err(e) => {
            log::error!("Failed to load settings: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}

fn save_settings_dialog(state: &mut AppState) {
    let Some(path) = rfd::FileDialog::new()
        .set_title("Save settings")
        .add_filter("JSON", &["json"])
        .set_file_name("settings.json")
        .save_file()
    else {
        return;
    };
    if let Err(e) = state.config.save(&path) {
        log::error!("Failed to save settings: {e:#}");
        state.status_message = Some(format!("Error: {e:#}"));
    }
}
