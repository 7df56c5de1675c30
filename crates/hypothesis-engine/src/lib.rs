//! Hypothesis Engine
//!
//! Daily price evidence scoring for competing narrative hypotheses:
//! move classification, evidence amplification, score updates, constrained
//! normalisation, dominant-narrative flips and the overcorrection lifecycle.

pub mod amplifier;
pub mod calendar;
pub mod classifier;
pub mod evidence;
pub mod flip;
pub mod normaliser;
pub mod overcorrection;
pub mod policy;

pub use amplifier::{Amplifier, EvidenceWeight};
pub use calendar::{add_trading_days, is_trading_day};
pub use classifier::{classify_change, MoveAssessment, MoveClassifier};
pub use evidence::apply_move_evidence;
pub use flip::{apply_scores, detect_flip, flip_trigger, rank_hypotheses};
pub use normaliser::{normalise, ScoreBounds};
pub use overcorrection::{
    award_fundamental, OvercorrectionMonitor, OvercorrectionOutcome, OvercorrectionTransition,
};
pub use policy::ScoringPolicy;
