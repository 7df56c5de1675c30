use serde::{Deserialize, Serialize};

use crate::normaliser::ScoreBounds;

/// Tunable constants of the daily scoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub bounds: ScoreBounds,
    /// Share of the effective weight a NEUTRAL hypothesis loses under a MATERIAL move
    pub neutral_reversion_coefficient: f64,
    /// |5-day cumulative %| above which the five-day amplifier applies
    pub five_day_amplifier_threshold_pct: f64,
    pub five_day_amplifier: f64,
    /// Calendar days either side of a scheduled disclosure that count as a results day
    pub results_window_days: i64,
    pub results_multiplier: f64,
    /// |daily %| above which an overcorrection is triggered
    pub daily_trigger_pct: f64,
    /// |5-day cumulative %| above which an overcorrection is triggered
    pub five_day_trigger_pct: f64,
    pub review_trading_days: u32,
    /// Reversal above this fraction confirms the overcorrection
    pub confirm_reversal: f64,
    /// Reversal below this fraction marks the move as fundamental
    pub fundamental_reversal: f64,
    pub fundamental_award: i32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            bounds: ScoreBounds::default(),
            neutral_reversion_coefficient: 0.5,
            five_day_amplifier_threshold_pct: 10.0,
            five_day_amplifier: 1.5,
            results_window_days: 2,
            results_multiplier: 2.0,
            daily_trigger_pct: 10.0,
            five_day_trigger_pct: 15.0,
            review_trading_days: 5,
            confirm_reversal: 0.5,
            fundamental_reversal: 0.25,
            fundamental_award: 3,
        }
    }
}

impl ScoringPolicy {
    pub fn with_neutral_reversion(mut self, coefficient: f64) -> Self {
        self.neutral_reversion_coefficient = coefficient;
        self
    }
}
