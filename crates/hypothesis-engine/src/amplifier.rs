//! Volume/Results Amplifier
//!
//! Scales the base weight of a price move by how unusual today's volume is
//! and by proximity to a scheduled disclosure.

use chrono::NaiveDate;
use narrative_core::stats::mean;
use narrative_core::{DisclosureEvent, PriceObservation};
use serde::{Deserialize, Serialize};

use crate::classifier::MoveAssessment;
use crate::policy::ScoringPolicy;

/// Trailing sessions in the volume baseline
pub const VOLUME_LOOKBACK: usize = 20;

/// Breakdown of the evidentiary weight applied to hypotheses
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvidenceWeight {
    pub base: f64,
    pub volume_multiplier: f64,
    pub results_multiplier: f64,
    pub five_day_amplifier: f64,
    pub effective: f64,
}

/// Today's volume over the mean of the trailing 20 real sessions that report volume.
/// Zero-volume sessions count towards the baseline.
pub fn volume_ratio(today_volume: Option<f64>, history: &[PriceObservation]) -> Option<f64> {
    let today = today_volume.filter(|v| v.is_finite() && *v >= 0.0)?;
    let volumes: Vec<f64> = history
        .iter()
        .filter(|p| !p.synthetic)
        .filter_map(|p| p.volume)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .collect();
    if volumes.is_empty() {
        return None;
    }
    let window = &volumes[volumes.len().saturating_sub(VOLUME_LOOKBACK)..];
    let baseline = mean(window);
    if baseline <= 0.0 {
        return None;
    }
    Some(today / baseline)
}

/// Volume anomaly multiplier. Unknown volume is neutral.
pub fn volume_multiplier(ratio: Option<f64>) -> f64 {
    match ratio {
        None => 1.0,
        Some(r) if r > 2.0 => 2.0,
        Some(r) if r > 1.5 => 1.5,
        Some(r) if r > 0.8 => 1.0,
        Some(r) if r > 0.5 => 0.7,
        Some(_) => 0.3,
    }
}

/// Nearest scheduled disclosure for `entity_id` within ±`window_days` calendar days
pub fn nearby_event<'a>(
    date: NaiveDate,
    entity_id: &str,
    events: &'a [DisclosureEvent],
    window_days: i64,
) -> Option<&'a DisclosureEvent> {
    events
        .iter()
        .filter(|e| e.entity_id == entity_id)
        .filter(|e| (e.date - date).num_days().abs() <= window_days)
        .min_by_key(|e| ((e.date - date).num_days().abs(), e.date))
}

/// Disclosure scheduled exactly on `date`
pub fn event_on<'a>(
    date: NaiveDate,
    entity_id: &str,
    events: &'a [DisclosureEvent],
) -> Option<&'a DisclosureEvent> {
    events
        .iter()
        .find(|e| e.entity_id == entity_id && e.date == date)
}

pub struct Amplifier {
    results_window_days: i64,
    results_multiplier: f64,
}

impl Default for Amplifier {
    fn default() -> Self {
        Self::new(&ScoringPolicy::default())
    }
}

impl Amplifier {
    pub fn new(policy: &ScoringPolicy) -> Self {
        Self {
            results_window_days: policy.results_window_days,
            results_multiplier: policy.results_multiplier,
        }
    }

    pub fn is_results_day(&self, date: NaiveDate, entity_id: &str, events: &[DisclosureEvent]) -> bool {
        nearby_event(date, entity_id, events, self.results_window_days).is_some()
    }

    /// Effective weight = base × volume × results × five-day amplifier
    pub fn weigh(
        &self,
        assessment: &MoveAssessment,
        volume_ratio: Option<f64>,
        results_day: bool,
    ) -> EvidenceWeight {
        let base = assessment.class.base_weight();
        let volume_multiplier = volume_multiplier(volume_ratio);
        let results_multiplier = if results_day { self.results_multiplier } else { 1.0 };
        let five_day_amplifier = assessment.five_day_amplifier;

        EvidenceWeight {
            base,
            volume_multiplier,
            results_multiplier,
            five_day_amplifier,
            effective: base * volume_multiplier * results_multiplier * five_day_amplifier,
        }
    }
}
