//! Layer Weight Calibration
//!
//! Regresses realised returns on the macro and sector signals, splits the
//! explained variance between the two predictors with a two-term
//! Lindeman-Merenda-Gold average, leaves the residual to the idiosyncratic
//! layer, then blends with the entity's default weights and applies the
//! portfolio constraints.

use chrono::NaiveDate;
use narrative_core::stats::pearson;
use narrative_core::{EntityRecord, LayerSignals, LayerWeights};
use serde::{Deserialize, Serialize};

/// Below this, `1 - r_ms²` is treated as collinear
const COLLINEARITY_EPSILON: f64 = 1e-6;

/// One (signals at t, return at t+1) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationObservation {
    pub date: NaiveDate,
    pub signals: LayerSignals,
    /// Daily % change of the next real snapshot
    pub realised_return: f64,
}

/// Pairwise correlations and explained variance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionSummary {
    pub r_macro_return: f64,
    pub r_sector_return: f64,
    pub r_macro_sector: f64,
    pub r2_macro: f64,
    pub r2_sector: f64,
    pub r2_multiple: f64,
    /// The multiple-R² denominator was near zero and the mean of individual R²s was used
    pub collinear: bool,
}

/// Unconstrained regression shares, summing to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceShares {
    pub macro_share: f64,
    pub sector_share: f64,
    pub idio_share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalibrationStatus {
    /// Final weights replace the standing weights
    Applied,
    /// Result failed a policy check; standing weights kept, manual review requested
    Flagged,
    InsufficientHistory,
}

impl CalibrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationStatus::Applied => "APPLIED",
            CalibrationStatus::Flagged => "FLAGGED",
            CalibrationStatus::InsufficientHistory => "INSUFFICIENT_HISTORY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "APPLIED" => Some(CalibrationStatus::Applied),
            "FLAGGED" => Some(CalibrationStatus::Flagged),
            "INSUFFICIENT_HISTORY" => Some(CalibrationStatus::InsufficientHistory),
            _ => None,
        }
    }
}

/// Monthly calibration result for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub entity_id: String,
    pub date: NaiveDate,
    pub status: CalibrationStatus,
    pub sample_size: usize,
    pub previous_weights: LayerWeights,
    pub regression: Option<RegressionSummary>,
    pub shares: Option<VarianceShares>,
    pub blended: Option<LayerWeights>,
    pub final_weights: Option<LayerWeights>,
    pub reason: Option<String>,
}

/// Pair each real snapshot carrying signals with the next real snapshot's
/// daily change, up to and including `as_of`.
pub fn observations(record: &EntityRecord, as_of: NaiveDate) -> Vec<CalibrationObservation> {
    let mut real: Vec<_> = record
        .snapshots
        .iter()
        .filter(|s| !s.synthetic && s.date <= as_of)
        .collect();
    real.sort_by_key(|s| s.date);

    real.windows(2)
        .filter_map(|pair| {
            let signals = pair[0].signals?;
            let realised_return = pair[1].change_pct;
            realised_return.is_finite().then_some(CalibrationObservation {
                date: pair[0].date,
                signals,
                realised_return,
            })
        })
        .collect()
}

/// Closed-form two-predictor decomposition from the three pairwise correlations.
pub fn decompose(r_mr: f64, r_sr: f64, r_ms: f64) -> (RegressionSummary, VarianceShares) {
    let r2_macro = r_mr * r_mr;
    let r2_sector = r_sr * r_sr;

    let denominator = 1.0 - r_ms * r_ms;
    let collinear = denominator < COLLINEARITY_EPSILON;
    let r2_multiple = if collinear {
        (r2_macro + r2_sector) / 2.0
    } else {
        (r2_macro + r2_sector - 2.0 * r_mr * r_sr * r_ms) / denominator
    }
    .clamp(0.0, 1.0);

    // LMG with two predictors: average of first-entry and last-entry contributions
    let macro_raw = (0.5 * (r2_macro + (r2_multiple - r2_sector))).max(0.0);
    let sector_raw = (0.5 * (r2_sector + (r2_multiple - r2_macro))).max(0.0);
    let idio_raw = (1.0 - r2_multiple).max(0.0);

    let total = macro_raw + sector_raw + idio_raw;
    let shares = if total > 0.0 {
        VarianceShares {
            macro_share: macro_raw / total,
            sector_share: sector_raw / total,
            idio_share: idio_raw / total,
        }
    } else {
        VarianceShares {
            macro_share: 1.0 / 3.0,
            sector_share: 1.0 / 3.0,
            idio_share: 1.0 / 3.0,
        }
    };

    (
        RegressionSummary {
            r_macro_return: r_mr,
            r_sector_return: r_sr,
            r_macro_sector: r_ms,
            r2_macro,
            r2_sector,
            r2_multiple,
            collinear,
        },
        shares,
    )
}

pub struct WeightCalibrator {
    pub min_observations: usize,
    /// Share of the blend taken from the regression (the rest from default weights)
    pub regression_blend: f64,
    pub weight_floor: f64,
    /// Cap on macro + sector
    pub systematic_cap: f64,
    pub idio_floor: f64,
    /// Minimum regression sector share for commodity-exposed entities
    pub commodity_min_sector: f64,
}

impl Default for WeightCalibrator {
    fn default() -> Self {
        Self {
            min_observations: 60,
            regression_blend: 0.7,
            weight_floor: 0.05,
            systematic_cap: 0.85,
            idio_floor: 0.15,
            commodity_min_sector: 0.10,
        }
    }
}

impl WeightCalibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the monthly calibration for one record. Never mutates the record;
    /// use [`apply_report`] to act on the result.
    pub fn calibrate(&self, record: &EntityRecord, as_of: NaiveDate) -> CalibrationReport {
        let obs = observations(record, as_of);
        let mut report = CalibrationReport {
            entity_id: record.id().to_string(),
            date: as_of,
            status: CalibrationStatus::InsufficientHistory,
            sample_size: obs.len(),
            previous_weights: record.weights,
            regression: None,
            shares: None,
            blended: None,
            final_weights: None,
            reason: None,
        };

        if obs.len() < self.min_observations {
            report.reason = Some(format!(
                "{} observations, {} required",
                obs.len(),
                self.min_observations
            ));
            return report;
        }

        let macro_series: Vec<f64> = obs.iter().map(|o| o.signals.macro_signal).collect();
        let sector_series: Vec<f64> = obs.iter().map(|o| o.signals.sector_signal).collect();
        let returns: Vec<f64> = obs.iter().map(|o| o.realised_return).collect();

        // An undefined correlation (flat series) carries no explanatory power
        let r_mr = pearson(&macro_series, &returns).unwrap_or(0.0);
        let r_sr = pearson(&sector_series, &returns).unwrap_or(0.0);
        let r_ms = pearson(&macro_series, &sector_series).unwrap_or(0.0);

        let (regression, shares) = decompose(r_mr, r_sr, r_ms);
        tracing::debug!(
            entity = record.id(),
            r2_macro = regression.r2_macro,
            r2_sector = regression.r2_sector,
            r2_multiple = regression.r2_multiple,
            collinear = regression.collinear,
            "Calibration regression"
        );
        report.regression = Some(regression);
        report.shares = Some(shares);

        if record.entity.commodity_exposed && shares.sector_share < self.commodity_min_sector {
            report.status = CalibrationStatus::Flagged;
            report.reason = Some(format!(
                "commodity-exposed entity with regression sector share {:.3} below {:.2}",
                shares.sector_share, self.commodity_min_sector
            ));
            return report;
        }

        let defaults = record.entity.default_weights;
        let blend = |share: f64, default: f64| {
            self.regression_blend * share + (1.0 - self.regression_blend) * default
        };
        let blended = LayerWeights::new(
            blend(shares.macro_share, defaults.macro_weight),
            blend(shares.sector_share, defaults.sector_weight),
            blend(shares.idio_share, defaults.idio_weight),
        );
        report.blended = Some(blended);
        report.final_weights = Some(self.constrain(blended));
        report.status = CalibrationStatus::Applied;
        report
    }

    /// Floor, cap, idio floor and renormalise, expressed in hundredths with
    /// the rounding remainder assigned to idio.
    pub fn constrain(&self, weights: LayerWeights) -> LayerWeights {
        let mut m = weights.macro_weight.max(self.weight_floor);
        let mut s = weights.sector_weight.max(self.weight_floor);
        let mut i = weights.idio_weight.max(self.weight_floor);

        if m + s > self.systematic_cap {
            let scale = self.systematic_cap / (m + s);
            m *= scale;
            s *= scale;
            if m < self.weight_floor {
                m = self.weight_floor;
                s = self.systematic_cap - self.weight_floor;
            } else if s < self.weight_floor {
                s = self.weight_floor;
                m = self.systematic_cap - self.weight_floor;
            }
        }
        i = i.max(self.idio_floor);

        let total = m + s + i;
        m /= total;
        s /= total;

        // Hundredths; rounding must not break the floors or the cap
        let floor = (self.weight_floor * 100.0).round() as i64;
        let cap = (self.systematic_cap * 100.0).round() as i64;
        let mut mh = ((m * 100.0).round() as i64).max(floor);
        let mut sh = ((s * 100.0).round() as i64).max(floor);
        let excess = mh + sh - cap;
        if excess > 0 {
            if mh >= sh {
                mh -= excess;
            } else {
                sh -= excess;
            }
        }
        let ih = 100 - mh - sh;

        LayerWeights::new(mh as f64 / 100.0, sh as f64 / 100.0, ih as f64 / 100.0)
    }
}

/// Apply a report to its record: replace weights when applied, raise the
/// review flag when flagged. Insufficient history leaves the record alone.
pub fn apply_report(record: &mut EntityRecord, report: &CalibrationReport) {
    match report.status {
        CalibrationStatus::Applied => {
            if let Some(weights) = report.final_weights {
                record.weights = weights;
                record.needs_weight_review = false;
                record.last_calibration = Some(report.date);
            }
        }
        CalibrationStatus::Flagged => {
            record.needs_weight_review = true;
            record.last_calibration = Some(report.date);
        }
        CalibrationStatus::InsufficientHistory => {}
    }
}
