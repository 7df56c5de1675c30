//! Composite Sentiment Aggregator
//!
//! Blends independently computed macro, sector and idiosyncratic signals into
//! one score using the entity's current calibrated layer weights.

use chrono::NaiveDate;
use narrative_core::{
    CompositeSentiment, EngineError, EngineResult, EntityRecord, LayerContributions, LayerSignals,
    LayerWeights, SentimentLabel,
};
use serde::{Deserialize, Serialize};

const SCORE_LIMIT: f64 = 100.0;

/// Result of the aggregator pass for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateOutcome {
    /// Composite written to the day's snapshot and to the record
    Amended(CompositeSentiment),
    /// The day's snapshot carries no layer signals
    NoSignals,
}

/// Weighted blend of the three layer signals.
///
/// `overall = clamp(round(Σ wᵢ·sᵢ), -100, 100)`. Each contribution is
/// rounded on its own, so the contributions need not add up to `overall`.
pub fn compose(
    date: NaiveDate,
    weights: LayerWeights,
    signals: LayerSignals,
) -> EngineResult<CompositeSentiment> {
    if !weights.is_normalised() {
        return Err(EngineError::ConstraintViolation(format!(
            "layer weights sum to {:.6}, expected 1",
            weights.sum()
        )));
    }
    let values = [signals.macro_signal, signals.sector_signal, signals.idio_signal];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(EngineError::MalformedRecord(
            "layer signal is not a finite number".to_string(),
        ));
    }

    let macro_part = weights.macro_weight * signals.macro_signal;
    let sector_part = weights.sector_weight * signals.sector_signal;
    let idio_part = weights.idio_weight * signals.idio_signal;

    let overall = (macro_part + sector_part + idio_part)
        .round()
        .clamp(-SCORE_LIMIT, SCORE_LIMIT) as i32;

    Ok(CompositeSentiment {
        date,
        overall,
        label: SentimentLabel::from_score(overall),
        contributions: LayerContributions {
            macro_contribution: macro_part.round() as i32,
            sector_contribution: sector_part.round() as i32,
            idio_contribution: idio_part.round() as i32,
        },
        weights,
        signals,
    })
}

#[derive(Debug, Default)]
pub struct CompositeAggregator;

impl CompositeAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Amend the snapshot for `date` in place with its composite sentiment.
    ///
    /// Re-running on the same day overwrites the previous composite with an
    /// identical value, so the pass is idempotent. Stored weights that do not
    /// sum to 1 make the record malformed rather than the configuration.
    pub fn aggregate(&self, record: &mut EntityRecord, date: NaiveDate) -> EngineResult<AggregateOutcome> {
        let weights = record.weights;
        let entity_id = record.id().to_string();
        if !weights.is_normalised() {
            return Err(EngineError::MalformedRecord(format!(
                "{entity_id}: stored layer weights sum to {:.6}, expected 1",
                weights.sum()
            )));
        }
        let snapshot = record.snapshot_on_mut(date).ok_or_else(|| {
            EngineError::MissingInput(format!("{entity_id}: no snapshot for {date}"))
        })?;

        let Some(signals) = snapshot.signals else {
            tracing::debug!(entity = %entity_id, %date, "No layer signals, composite skipped");
            return Ok(AggregateOutcome::NoSignals);
        };

        let composite = compose(date, weights, signals)?;
        tracing::debug!(
            entity = %entity_id,
            overall = composite.overall,
            label = composite.label.to_label(),
            "Composite sentiment"
        );
        snapshot.composite = Some(composite.clone());
        record.composite = Some(composite.clone());
        Ok(AggregateOutcome::Amended(composite))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrative_core::{
        Entity, Hypothesis, MoveClass, OvercorrectionStatus, Sentiment, Snapshot,
    };

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()
    }

    fn signals(m: f64, s: f64, i: f64) -> LayerSignals {
        LayerSignals {
            macro_signal: m,
            sector_signal: s,
            idio_signal: i,
        }
    }

    fn record_with_snapshot(signals: Option<LayerSignals>) -> EntityRecord {
        let entity = Entity {
            id: "WOW".to_string(),
            name: "Woolworths".to_string(),
            peer_groups: vec![],
            default_weights: LayerWeights::new(0.2, 0.3, 0.5),
            narrative_model: String::new(),
            commodity_exposed: false,
        };
        let hypothesis = Hypothesis {
            id: "T1".to_string(),
            name: "Recovery".to_string(),
            sentiment: Sentiment::Bullish,
            survival_score: 100,
            rank: 1,
        };
        let mut record = EntityRecord::new(entity, vec![hypothesis]);
        record.snapshots.push(Snapshot {
            date: date(),
            price: 30.0,
            change_pct: 0.5,
            classification: MoveClass::Noise,
            volume_ratio: None,
            effective_weight: 0.0,
            scores: vec![],
            dominant: "T1".to_string(),
            narrative_flip: false,
            flip: None,
            signals,
            composite: None,
            overcorrection_status: OvercorrectionStatus::Inactive,
            banner: None,
            forecast: None,
            synthetic: false,
        });
        record
    }

    #[test]
    fn test_weighted_blend() {
        let c = compose(date(), LayerWeights::new(0.2, 0.3, 0.5), signals(50.0, -20.0, 40.0)).unwrap();
        // 10 - 6 + 20
        assert_eq!(c.overall, 24);
        assert_eq!(c.label, SentimentLabel::Upside);
        assert_eq!(c.contributions.macro_contribution, 10);
        assert_eq!(c.contributions.sector_contribution, -6);
        assert_eq!(c.contributions.idio_contribution, 20);
    }

    #[test]
    fn test_overall_is_clamped() {
        let c = compose(date(), LayerWeights::new(0.2, 0.3, 0.5), signals(150.0, 150.0, 150.0)).unwrap();
        assert_eq!(c.overall, 100);
        assert_eq!(c.label, SentimentLabel::StrongUpside);
        let c = compose(date(), LayerWeights::new(0.2, 0.3, 0.5), signals(-300.0, 0.0, 0.0)).unwrap();
        assert_eq!(c.overall, -60);
        assert_eq!(c.label, SentimentLabel::StrongDownside);
    }

    #[test]
    fn test_rejects_unnormalised_weights() {
        let err = compose(date(), LayerWeights::new(0.5, 0.5, 0.5), signals(1.0, 1.0, 1.0)).unwrap_err();
        assert!(matches!(err, EngineError::ConstraintViolation(_)));
        let err = compose(date(), LayerWeights::new(0.2, 0.3, 0.5), signals(f64::NAN, 1.0, 1.0)).unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(_)));
    }

    #[test]
    fn test_aggregate_amends_snapshot_in_place() {
        let mut record = record_with_snapshot(Some(signals(50.0, -20.0, 40.0)));
        let aggregator = CompositeAggregator::new();
        let first = aggregator.aggregate(&mut record, date()).unwrap();
        let second = aggregator.aggregate(&mut record, date()).unwrap();
        assert_eq!(first, second);
        assert_eq!(record.snapshots.len(), 1);
        assert_eq!(record.snapshots[0].composite.as_ref().unwrap().overall, 24);
        assert_eq!(record.composite.as_ref().unwrap().overall, 24);
    }

    #[test]
    fn test_aggregate_without_signals_or_snapshot() {
        let mut record = record_with_snapshot(None);
        let aggregator = CompositeAggregator::new();
        assert_eq!(aggregator.aggregate(&mut record, date()).unwrap(), AggregateOutcome::NoSignals);

        let other = NaiveDate::from_ymd_opt(2025, 3, 6).unwrap();
        let err = aggregator.aggregate(&mut record, other).unwrap_err();
        assert!(matches!(err, EngineError::MissingInput(_)));
    }

    #[test]
    fn test_aggregate_with_drifted_weights_is_entity_scoped() {
        let mut record = record_with_snapshot(Some(signals(50.0, -20.0, 40.0)));
        record.weights = LayerWeights::new(0.6, 0.3, 0.5);
        let err = CompositeAggregator::new().aggregate(&mut record, date()).unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(_)));
        assert!(err.is_entity_scoped());
        assert!(record.snapshots[0].composite.is_none());
        assert!(record.composite.is_none());
    }
}
