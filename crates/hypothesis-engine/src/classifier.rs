//! Move Classifier
//!
//! Buckets the daily price change into a severity class and measures the
//! 5/20/60-session cumulative change over real (non-backfilled) history.

use narrative_core::stats::pct_change;
use narrative_core::{EngineError, EngineResult, MoveClass, MoveDirection, PriceObservation};
use serde::{Deserialize, Serialize};

use crate::policy::ScoringPolicy;

/// Classification of one day's move plus its cumulative context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveAssessment {
    pub daily_pct: f64,
    pub direction: MoveDirection,
    pub class: MoveClass,
    pub cumulative_5d: Option<f64>,
    pub cumulative_20d: Option<f64>,
    pub cumulative_60d: Option<f64>,
    /// 1.0, or the five-day amplifier when |5-day cumulative| crosses the threshold
    pub five_day_amplifier: f64,
}

/// Severity bucket for an absolute % change
pub fn classify_change(pct: f64) -> MoveClass {
    let magnitude = pct.abs();
    if magnitude < 2.0 {
        MoveClass::Noise
    } else if magnitude < 5.0 {
        MoveClass::Notable
    } else if magnitude <= 10.0 {
        MoveClass::Significant
    } else {
        MoveClass::Material
    }
}

/// % change from the close `sessions` real sessions ago to `today_close`.
///
/// `history` holds prior closes only (oldest first, today excluded).
/// Synthetic entries are skipped, so backfilled prices never feed the result.
pub fn cumulative_change_pct(
    history: &[PriceObservation],
    today_close: f64,
    sessions: usize,
) -> Option<f64> {
    if sessions == 0 {
        return None;
    }
    let real: Vec<f64> = history
        .iter()
        .filter(|p| !p.synthetic)
        .map(|p| p.close)
        .collect();
    if real.len() < sessions {
        return None;
    }
    pct_change(real[real.len() - sessions], today_close)
}

pub struct MoveClassifier {
    amplifier_threshold_pct: f64,
    amplifier: f64,
}

impl Default for MoveClassifier {
    fn default() -> Self {
        Self::new(&ScoringPolicy::default())
    }
}

impl MoveClassifier {
    pub fn new(policy: &ScoringPolicy) -> Self {
        Self {
            amplifier_threshold_pct: policy.five_day_amplifier_threshold_pct,
            amplifier: policy.five_day_amplifier,
        }
    }

    /// Assess today's close against the prior close and the stored history
    pub fn assess(
        &self,
        close: f64,
        prior_close: f64,
        history: &[PriceObservation],
    ) -> EngineResult<MoveAssessment> {
        if !close.is_finite() || close <= 0.0 {
            return Err(EngineError::MalformedRecord(format!(
                "close must be positive, got {close}"
            )));
        }
        let daily_pct = pct_change(prior_close, close).ok_or_else(|| {
            EngineError::MalformedRecord(format!("prior close must be positive, got {prior_close}"))
        })?;

        let cumulative_5d = cumulative_change_pct(history, close, 5);
        let five_day_amplifier = match cumulative_5d {
            Some(c) if c.abs() > self.amplifier_threshold_pct => self.amplifier,
            _ => 1.0,
        };

        Ok(MoveAssessment {
            daily_pct,
            direction: MoveDirection::from_change(daily_pct),
            class: classify_change(daily_pct),
            cumulative_5d,
            cumulative_20d: cumulative_change_pct(history, close, 20),
            cumulative_60d: cumulative_change_pct(history, close, 60),
            five_day_amplifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn history(closes: &[f64]) -> Vec<PriceObservation> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| PriceObservation {
                date: start + Duration::days(i as i64),
                close: *c,
                volume: None,
                synthetic: false,
            })
            .collect()
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(classify_change(0.0), MoveClass::Noise);
        assert_eq!(classify_change(-1.99), MoveClass::Noise);
        assert_eq!(classify_change(2.0), MoveClass::Notable);
        assert_eq!(classify_change(-4.9), MoveClass::Notable);
        assert_eq!(classify_change(5.0), MoveClass::Significant);
        assert_eq!(classify_change(10.0), MoveClass::Significant);
        assert_eq!(classify_change(-10.01), MoveClass::Material);
        assert_eq!(MoveClass::Material.base_weight(), 10.0);
    }

    #[test]
    fn test_cumulative_uses_session_offset() {
        let h = history(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        // 5 sessions back from today is the close of 101.0
        let c = cumulative_change_pct(&h, 111.1, 5).unwrap();
        assert!((c - 10.0).abs() < 1e-9);
        assert!(cumulative_change_pct(&h, 111.1, 20).is_none());
    }

    #[test]
    fn test_cumulative_excludes_synthetic_entries() {
        let mut h = history(&[50.0, 50.0, 50.0, 100.0, 100.0, 100.0, 100.0]);
        for p in h.iter_mut().take(3) {
            p.synthetic = true;
        }
        // Only four real closes remain, not enough for a 5-session window
        assert!(cumulative_change_pct(&h, 120.0, 5).is_none());
        assert!((cumulative_change_pct(&h, 120.0, 4).unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_five_day_amplifier_independent_of_daily_bucket() {
        let classifier = MoveClassifier::default();
        let h = history(&[100.0, 104.0, 108.0, 110.0, 111.0]);
        // Daily move is small (NOISE) but the 5-day move is +12%
        let a = classifier.assess(112.0, 111.0, &h).unwrap();
        assert_eq!(a.class, MoveClass::Noise);
        assert_eq!(a.five_day_amplifier, 1.5);
        assert_eq!(a.direction, MoveDirection::Up);
    }

    #[test]
    fn test_assess_rejects_bad_prior_close() {
        let classifier = MoveClassifier::default();
        let err = classifier.assess(10.0, 0.0, &[]).unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(_)));
        assert!(classifier.assess(f64::NAN, 10.0, &[]).is_err());
    }
}
