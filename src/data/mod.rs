/// Data layer: uploaded tables and single-channel signals.
///
/// Architecture:
/// ```text
///  data URL / .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse upload → TabularDataset
///   └──────────┘
///        │
///        ▼
///   ┌───────────────┐
///   │ model::build   │  column + sample rate → Signal
///   └───────────────┘
/// ```

pub mod loader;
pub mod model;
