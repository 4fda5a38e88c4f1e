// SpinTune run driver
// Discovers parameters, runs the SPSA loop and persists snapshots

pub mod driver;

pub use driver::{select_parameters, RunReport, TuningRun};
