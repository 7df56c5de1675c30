//! Overcorrection State Machine
//!
//! INACTIVE -> TRIGGERED -> (REVIEW_EXTENDED)* -> CONFIRMED | FUNDAMENTAL.
//! The record lives on the entity, not on the snapshot, so a review can span
//! any number of daily runs. An active record blocks new triggers.

use chrono::NaiveDate;
use narrative_core::{
    BannerPayload, BannerSeverity, Hypothesis, MoveDirection, OvercorrectionRecord,
    OvercorrectionResolution, OvercorrectionStatus, OvercorrectionTrigger,
};
use serde::{Deserialize, Serialize};

use crate::calendar::add_trading_days;
use crate::policy::ScoringPolicy;

/// |move %| above which the banner is shown at HIGH severity
const HIGH_SEVERITY_PCT: f64 = 20.0;

/// What happened to the overcorrection record today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OvercorrectionTransition {
    NoChange,
    Triggered,
    Pending,
    Extended,
    Confirmed,
    Fundamental,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OvercorrectionOutcome {
    /// Record to persist (retired records are kept with `active = false`)
    pub record: Option<OvercorrectionRecord>,
    pub status: OvercorrectionStatus,
    pub transition: OvercorrectionTransition,
    pub banner: BannerPayload,
    /// Direction whose aligned hypotheses earn the fundamental award today
    pub award_direction: Option<MoveDirection>,
}

pub struct OvercorrectionMonitor {
    daily_trigger_pct: f64,
    five_day_trigger_pct: f64,
    review_trading_days: u32,
    confirm_reversal: f64,
    fundamental_reversal: f64,
}

impl Default for OvercorrectionMonitor {
    fn default() -> Self {
        Self::new(&ScoringPolicy::default())
    }
}

impl OvercorrectionMonitor {
    pub fn new(policy: &ScoringPolicy) -> Self {
        Self {
            daily_trigger_pct: policy.daily_trigger_pct,
            five_day_trigger_pct: policy.five_day_trigger_pct,
            review_trading_days: policy.review_trading_days,
            confirm_reversal: policy.confirm_reversal,
            fundamental_reversal: policy.fundamental_reversal,
        }
    }

    /// Advance the lifecycle for one trading day.
    ///
    /// A record that was active at the start of the day is only reviewed;
    /// triggers are evaluated only when nothing is active.
    pub fn evaluate(
        &self,
        current: Option<&OvercorrectionRecord>,
        date: NaiveDate,
        price: f64,
        daily_pct: f64,
        cumulative_5d: Option<f64>,
    ) -> OvercorrectionOutcome {
        match current {
            Some(record) if record.active => self.review(record, date, price),
            _ => self.check_trigger(current, date, price, daily_pct, cumulative_5d),
        }
    }

    fn check_trigger(
        &self,
        previous: Option<&OvercorrectionRecord>,
        date: NaiveDate,
        price: f64,
        daily_pct: f64,
        cumulative_5d: Option<f64>,
    ) -> OvercorrectionOutcome {
        let fired = if daily_pct.abs() > self.daily_trigger_pct {
            Some((OvercorrectionTrigger::DailyMove, daily_pct))
        } else {
            cumulative_5d
                .filter(|c| c.abs() > self.five_day_trigger_pct)
                .map(|c| (OvercorrectionTrigger::FiveDayMove, c))
        };

        let Some((trigger, move_pct)) = fired else {
            return OvercorrectionOutcome {
                record: previous.cloned(),
                status: OvercorrectionStatus::Inactive,
                transition: OvercorrectionTransition::NoChange,
                banner: BannerPayload::hidden(),
                award_direction: None,
            };
        };

        let record = OvercorrectionRecord {
            active: true,
            trigger,
            trigger_date: date,
            trigger_price: price,
            direction: MoveDirection::from_change(move_pct),
            move_pct,
            review_date: add_trading_days(date, self.review_trading_days),
            extension_count: 0,
            resolution: None,
            resolved_date: None,
            last_reversal: None,
        };
        tracing::info!(
            move_pct,
            review_date = %record.review_date,
            "Overcorrection triggered"
        );

        OvercorrectionOutcome {
            banner: banner_for(&record),
            record: Some(record),
            status: OvercorrectionStatus::Triggered,
            transition: OvercorrectionTransition::Triggered,
            award_direction: None,
        }
    }

    fn review(&self, record: &OvercorrectionRecord, date: NaiveDate, price: f64) -> OvercorrectionOutcome {
        let mut record = record.clone();

        if date < record.review_date {
            let status = if record.extension_count > 0 {
                OvercorrectionStatus::ReviewExtended
            } else {
                OvercorrectionStatus::UnderReview
            };
            return OvercorrectionOutcome {
                banner: banner_for(&record),
                record: Some(record),
                status,
                transition: OvercorrectionTransition::Pending,
                award_direction: None,
            };
        }

        let reversal = reversed_fraction(&record, price);
        record.last_reversal = Some(reversal);

        if reversal > self.confirm_reversal {
            record.active = false;
            record.resolution = Some(OvercorrectionResolution::Confirmed);
            record.resolved_date = Some(date);
            tracing::info!(reversal, "Overcorrection confirmed");
            OvercorrectionOutcome {
                banner: resolved_banner(&record),
                record: Some(record),
                status: OvercorrectionStatus::Confirmed,
                transition: OvercorrectionTransition::Confirmed,
                award_direction: None,
            }
        } else if reversal >= self.fundamental_reversal {
            record.review_date = add_trading_days(date, self.review_trading_days);
            record.extension_count += 1;
            tracing::info!(
                reversal,
                extensions = record.extension_count,
                "Overcorrection review inconclusive, extended"
            );
            OvercorrectionOutcome {
                banner: banner_for(&record),
                record: Some(record),
                status: OvercorrectionStatus::ReviewExtended,
                transition: OvercorrectionTransition::Extended,
                award_direction: None,
            }
        } else {
            record.active = false;
            record.resolution = Some(OvercorrectionResolution::Fundamental);
            record.resolved_date = Some(date);
            let direction = record.direction;
            tracing::info!(reversal, "Overcorrection resolved as fundamental");
            OvercorrectionOutcome {
                banner: resolved_banner(&record),
                record: Some(record),
                status: OvercorrectionStatus::Fundamental,
                transition: OvercorrectionTransition::Fundamental,
                award_direction: Some(direction),
            }
        }
    }
}

/// Fraction of the original price delta given back since the trigger.
///
/// The pre-move price is reconstructed from the trigger price and move %.
/// Positive means the move is reversing, whatever its direction.
pub fn reversed_fraction(record: &OvercorrectionRecord, price: f64) -> f64 {
    let pre_move = record.trigger_price / (1.0 + record.move_pct / 100.0);
    let delta = pre_move - record.trigger_price;
    if delta.abs() < f64::EPSILON || !delta.is_finite() {
        return 0.0;
    }
    (price - record.trigger_price) / delta
}

/// Display banner for an active record
pub fn banner_for(record: &OvercorrectionRecord) -> BannerPayload {
    let severity = if record.move_pct.abs() > HIGH_SEVERITY_PCT {
        BannerSeverity::High
    } else {
        BannerSeverity::Moderate
    };
    let verb = match record.direction {
        MoveDirection::Down => "fell",
        _ => "rose",
    };
    let window = match record.trigger {
        OvercorrectionTrigger::DailyMove => "in one session",
        OvercorrectionTrigger::FiveDayMove => "over five sessions",
    };
    BannerPayload {
        active: true,
        severity: Some(severity),
        message: format!(
            "Price {verb} {:.1}% {window} on {}. Possible overcorrection under review until {}.",
            record.move_pct.abs(),
            record.trigger_date,
            record.review_date
        ),
    }
}

/// Inactive banner stating how a retired record was resolved
pub fn resolved_banner(record: &OvercorrectionRecord) -> BannerPayload {
    let outcome = match record.resolution {
        Some(OvercorrectionResolution::Confirmed) => {
            "reversed and was treated as an overcorrection"
        }
        Some(OvercorrectionResolution::Fundamental) => "held and was treated as fundamental",
        None => "is no longer under review",
    };
    BannerPayload {
        active: false,
        severity: None,
        message: format!(
            "The {:.1}% move of {} {outcome}.",
            record.move_pct.abs(),
            record.trigger_date
        ),
    }
}

/// Add the fundamental award to the raw scores of hypotheses aligned with
/// the original move, never lifting a score past `ceiling`.
pub fn award_fundamental(
    hypotheses: &[Hypothesis],
    raw: &mut [f64],
    direction: MoveDirection,
    award: i32,
    ceiling: i32,
) {
    let ceiling = ceiling as f64;
    for (h, score) in hypotheses.iter().zip(raw.iter_mut()) {
        if h.sentiment.aligns_with(direction) && *score < ceiling {
            *score = (*score + award as f64).min(ceiling);
        }
    }
}
