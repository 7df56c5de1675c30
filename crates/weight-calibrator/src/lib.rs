//! Weight Calibrator
//!
//! Monthly re-estimation of an entity's macro/sector/idio layer weights from
//! its accumulated snapshots, plus a SQL-backed log of every calibration.

pub mod calibrator;
pub mod history;

pub use calibrator::{
    apply_report, decompose, observations, CalibrationObservation, CalibrationReport,
    CalibrationStatus, RegressionSummary, VarianceShares, WeightCalibrator,
};
pub use history::{CalibrationHistoryStore, CalibrationRecord};
