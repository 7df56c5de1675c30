//! Daily History Recorder
//!
//! Orchestrates the scoring engine into one snapshot per entity per trading
//! day, followed by the composite and propagation passes, plus the monthly
//! calibration pass and price-history backfill.

pub mod backfill;
pub mod config;
pub mod input;
pub mod recorder;
pub mod report;
pub mod universe;


pub use backfill::backfill_history;
pub use config::EngineConfig;
pub use input::{decode_batch, DailyBatch, RejectedQuote};
pub use recorder::{DailyRecorder, DailyRunSummary};
pub use report::{EntityOutcome, EntityReport, RunPass, RunReport, RunStatus};
pub use universe::{check_record, Universe, UniverseEntity};
