use eframe::egui::TextureHandle;

use rusty_signal::{
    AnalysisConfig, PipelineError, SpectralDensity, TabularDataset, TfrResult, TimeDomainTrace,
    pipeline,
};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Which result the central panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Trace,
    Scalogram,
    Spectrum,
}

/// Outcome of the last run of one analysis path. `None` until first run.
pub type PathOutput<T> = Option<Result<T, PipelineError>>;

/// The full UI state, independent of rendering.
#[derive(Default)]
pub struct AppState {
    /// Most recent upload, replaced wholesale by the next one.
    pub dataset: Option<TabularDataset>,
    pub file_name: Option<String>,

    /// Column every path analyses; revalidated on each upload.
    pub selected_column: Option<String>,

    pub config: AnalysisConfig,

    pub trace: PathOutput<TimeDomainTrace>,
    pub scalogram: PathOutput<TfrResult>,
    /// Uploaded lazily by the plot from `scalogram`; dropped when it changes.
    pub scalogram_texture: Option<TextureHandle>,
    pub spectrum: PathOutput<SpectralDensity>,
    /// Plot the PSD in decibels rather than linear units.
    pub spectrum_db: bool,

    pub view: View,

    /// Status / error message shown in the top bar.
    pub status_message: Option<String>,
}

impl AppState {
    /// Ingest a newly loaded dataset. Results computed from the previous one
    /// are discarded and the selected column is kept only if it still exists.
    pub fn set_dataset(&mut self, dataset: TabularDataset, file_name: String) {
        let keep = self
            .selected_column
            .as_deref()
            .is_some_and(|col| dataset.contains_column(col));
        if !keep {
            self.selected_column = dataset.column_names().first().map(|s| s.to_string());
        }

        self.trace = None;
        self.scalogram = None;
        self.scalogram_texture = None;
        self.spectrum = None;

        self.dataset = Some(dataset);
        self.file_name = Some(file_name);
        self.status_message = None;
    }

    /// Run one path on the current dataset and column. `None` (with a status
    /// message) when either is missing.
    fn run<T>(
        &mut self,
        path: &str,
        f: impl FnOnce(&TabularDataset, &str, &AnalysisConfig) -> Result<T, PipelineError>,
    ) -> PathOutput<T> {
        let out = match (&self.dataset, &self.selected_column) {
            (Some(ds), Some(col)) => f(ds, col, &self.config),
            (None, _) => {
                self.status_message = Some("Open a file first".to_string());
                return None;
            }
            (Some(_), None) => {
                self.status_message = Some("Select a column first".to_string());
                return None;
            }
        };
        if let Err(e) = &out {
            log::warn!("{path} failed: {e}");
        }
        self.status_message = None;
        Some(out)
    }

    pub fn run_time_domain(&mut self) {
        if let Some(out) = self.run("time-domain trace", pipeline::time_domain) {
            self.trace = Some(out);
            self.view = View::Trace;
        }
    }

    pub fn run_scalogram(&mut self) {
        if let Some(out) = self.run("scalogram", pipeline::scalogram) {
            self.scalogram = Some(out);
            self.scalogram_texture = None;
            self.view = View::Scalogram;
        }
    }

    pub fn run_spectral_density(&mut self) {
        if let Some(out) = self.run("PSD", pipeline::spectral_density) {
            self.spectrum = Some(out);
            self.view = View::Spectrum;
        }
    }
}

#[cfg(test)]
mod tests {
    use rusty_signal::data::model::{Cell, Column};

    use super::*;

    fn dataset(names: &[&str]) -> TabularDataset {
        TabularDataset::from_columns(
            names
                .iter()
                .map(|n| Column {
                    name: n.to_string(),
                    cells: vec![Cell::Number(0.0); 8],
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn upload_revalidates_selected_column() {
        let mut state = AppState::default();
        state.set_dataset(dataset(&["a", "b"]), "one.csv".into());
        assert_eq!(state.selected_column.as_deref(), Some("a"));

        state.selected_column = Some("b".into());
        state.set_dataset(dataset(&["b", "c"]), "two.csv".into());
        assert_eq!(state.selected_column.as_deref(), Some("b"));

        state.set_dataset(dataset(&["x"]), "three.csv".into());
        assert_eq!(state.selected_column.as_deref(), Some("x"));
    }

    #[test]
    fn failing_path_keeps_other_results() {
        let mut state = AppState::default();
        state.set_dataset(dataset(&["a"]), "one.csv".into());
        state.config.rate_unit = rusty_signal::RateUnit::Hertz;
        state.config.sample_rate = 4.0;
        state.config.filter_band = rusty_signal::FrequencyBand::lowpass(2.0);
        state.config.window = rusty_signal::TimeWindow::new(0.0, 1.0);

        state.run_time_domain();
        assert!(matches!(state.trace, Some(Ok(_))));

        // Analysis band 1-50 Hz is above Nyquist at 4 Hz.
        state.run_spectral_density();
        assert!(matches!(state.spectrum, Some(Err(PipelineError::InvalidBand(_)))));
        assert!(matches!(state.trace, Some(Ok(_))));
        assert_eq!(state.view, View::Spectrum);
    }

    #[test]
    fn running_without_data_sets_status() {
        let mut state = AppState::default();
        state.run_scalogram();
        assert!(state.scalogram.is_none());
        assert_eq!(state.status_message.as_deref(), Some("Open a file first"));
    }
}
