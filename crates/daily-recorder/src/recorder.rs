use chrono::NaiveDate;
use evidence_propagator::{EvidencePropagator, PropagationSummary};
use forecast_client::{ForecastInput, ForecastService};
use hypothesis_engine::amplifier::{event_on, volume_ratio};
use hypothesis_engine::{
    apply_move_evidence, apply_scores, award_fundamental, detect_flip, flip_trigger, normalise,
    Amplifier, MoveClassifier, OvercorrectionMonitor, ScoringPolicy,
};
use narrative_core::{
    EngineError, EngineResult, EntityRecord, HypothesisScore, PriceObservation, RecordStore,
    Snapshot,
};
use sentiment_composite::{AggregateOutcome, CompositeAggregator};
use std::collections::BTreeMap;
use std::sync::Arc;
use weight_calibrator::{apply_report, CalibrationHistoryStore, CalibrationStatus, WeightCalibrator};

use crate::backfill::backfill_history;
use crate::input::DailyBatch;
use crate::report::{EntityOutcome, RunPass, RunReport};
use crate::universe::{check_record, Universe, UniverseEntity};

pub const DEFAULT_FORECAST_HORIZON_DAYS: u32 = 63;

/// Reports of the three same-day passes
#[derive(Debug, Clone)]
pub struct DailyRunSummary {
    pub recording: RunReport,
    pub composite: RunReport,
    pub propagation: PropagationSummary,
}

/// Daily History Recorder.
///
/// Owns the scoring components and drives one pass at a time over the
/// universe. Per-entity failures are reported and skipped; anything that is
/// not entity-scoped aborts the pass.
pub struct DailyRecorder {
    store: Arc<dyn RecordStore>,
    universe: Universe,
    policy: ScoringPolicy,
    classifier: MoveClassifier,
    amplifier: Amplifier,
    monitor: OvercorrectionMonitor,
    aggregator: CompositeAggregator,
    propagator: EvidencePropagator,
    calibrator: WeightCalibrator,
    forecasts: ForecastService,
    horizon_days: u32,
    history: Option<CalibrationHistoryStore>,
}

impl DailyRecorder {
    /// Validates the universe up front; a bad configuration never reaches the store.
    pub fn new(store: Arc<dyn RecordStore>, universe: Universe, policy: ScoringPolicy) -> EngineResult<Self> {
        if !(0.0..=1.0).contains(&policy.neutral_reversion_coefficient) {
            return Err(EngineError::ConstraintViolation(format!(
                "neutral reversion coefficient {} outside [0, 1]",
                policy.neutral_reversion_coefficient
            )));
        }
        universe.validate(policy.bounds)?;

        Ok(Self {
            store,
            universe,
            classifier: MoveClassifier::new(&policy),
            amplifier: Amplifier::new(&policy),
            monitor: OvercorrectionMonitor::new(&policy),
            aggregator: CompositeAggregator::new(),
            propagator: EvidencePropagator::default(),
            calibrator: WeightCalibrator::new(),
            forecasts: ForecastService::offline(),
            horizon_days: DEFAULT_FORECAST_HORIZON_DAYS,
            history: None,
            policy,
        })
    }

    pub fn with_forecasts(mut self, forecasts: ForecastService, horizon_days: u32) -> Self {
        self.forecasts = forecasts;
        self.horizon_days = horizon_days;
        self
    }

    pub fn with_calibration_history(mut self, history: CalibrationHistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_propagation_window(mut self, window_days: i64) -> Self {
        self.propagator = EvidencePropagator::new(window_days);
        self
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    async fn load_or_init(&self, entity: &UniverseEntity) -> EngineResult<EntityRecord> {
        match self.store.load(entity.id()).await? {
            Some(record) => {
                check_record(&record, self.policy.bounds)?;
                Ok(record)
            }
            None => {
                tracing::info!(entity = entity.id(), "New entity, starting from initial scores");
                Ok(entity.initial_record())
            }
        }
    }

    /// Stored record that passes `check_record`; absent records are missing input
    async fn load_existing(&self, id: &str) -> EngineResult<EntityRecord> {
        let record = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| EngineError::MissingInput(format!("{id}: no stored record")))?;
        check_record(&record, self.policy.bounds)?;
        Ok(record)
    }

    fn settle(report: &mut RunReport, entity_id: &str, result: EngineResult<EntityOutcome>) -> EngineResult<()> {
        match result {
            Ok(outcome) => report.push(entity_id, outcome),
            Err(e) if e.is_entity_scoped() => report.push(entity_id, EntityOutcome::from_error(&e)),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    // ---- daily recording ----

    /// Append today's snapshot for every entity in the universe
    pub async fn record_day(&self, batch: &DailyBatch) -> EngineResult<RunReport> {
        let mut report = RunReport::new(RunPass::Daily, batch.date);
        tracing::info!(
            date = %batch.date,
            entities = self.universe.entities.len(),
            quotes = batch.quotes.len(),
            "Recording daily snapshots"
        );

        for entity in &self.universe.entities {
            let result = self.record_entity(entity, batch).await;
            Self::settle(&mut report, entity.id(), result)?;
        }

        report.log_summary();
        Ok(report)
    }

    async fn record_entity(&self, entity: &UniverseEntity, batch: &DailyBatch) -> EngineResult<EntityOutcome> {
        let date = batch.date;
        let id = entity.id();
        let mut record = self.load_or_init(entity).await?;

        if record.snapshot_on(date).is_some() {
            return Ok(EntityOutcome::Skipped(format!("snapshot for {date} already recorded")));
        }
        let quote = batch.quote(id).ok_or_else(|| batch.missing_reason(id))?;

        let prior: Vec<PriceObservation> = record
            .price_history
            .iter()
            .filter(|p| p.date < date)
            .cloned()
            .collect();

        let assessment = self.classifier.assess(quote.close, quote.prior_close, &prior)?;
        let ratio = volume_ratio(quote.volume, &prior);
        let results_day = self.amplifier.is_results_day(date, id, &batch.events);
        let weight = self.amplifier.weigh(&assessment, ratio, results_day);
        tracing::debug!(
            entity = id,
            daily_pct = assessment.daily_pct,
            class = assessment.class.label(),
            volume_ratio = ?ratio,
            results_day,
            effective = weight.effective,
            "Move assessed"
        );

        let mut raw = apply_move_evidence(
            &record.hypotheses,
            assessment.direction,
            assessment.class,
            weight.effective,
            self.policy.neutral_reversion_coefficient,
        );

        let overcorrection = self.monitor.evaluate(
            record.overcorrection.as_ref(),
            date,
            quote.close,
            assessment.daily_pct,
            assessment.cumulative_5d,
        );
        if let Some(direction) = overcorrection.award_direction {
            award_fundamental(
                &record.hypotheses,
                &mut raw,
                direction,
                self.policy.fundamental_award,
                self.policy.bounds.ceiling,
            );
        }

        let scores = normalise(&raw, self.policy.bounds)?;

        let previous_dominant = record
            .previous_snapshot(date)
            .map(|s| s.dominant.clone())
            .or_else(|| record.dominant_id().map(str::to_string));
        let dominant = apply_scores(&mut record.hypotheses, &scores)
            .ok_or_else(|| EngineError::MalformedRecord(format!("{id}: record has no hypotheses")))?;
        let trigger = flip_trigger(event_on(date, id, &batch.events), assessment.class);
        let flip = detect_flip(previous_dominant.as_deref(), &dominant, &trigger);
        if let Some(f) = &flip {
            tracing::info!(entity = id, from = %f.from, to = %f.to, trigger = %f.trigger, "Narrative flip");
        }

        record.overcorrection = overcorrection.record;
        record.current_price = Some(quote.close);
        record.price_history.retain(|p| p.date != date);
        record.price_history.push(PriceObservation {
            date,
            close: quote.close,
            volume: quote.volume,
            synthetic: false,
        });
        record.price_history.sort_by_key(|p| p.date);

        let input = ForecastInput::from_record(&record, date, quote.close, self.horizon_days);
        let forecast = self.forecasts.forecast(&input).await;

        let scores = record
            .hypotheses
            .iter()
            .map(|h| HypothesisScore {
                id: h.id.clone(),
                score: h.survival_score,
                rank: h.rank,
            })
            .collect();
        record.snapshots.push(Snapshot {
            date,
            price: quote.close,
            change_pct: assessment.daily_pct,
            classification: assessment.class,
            volume_ratio: ratio,
            effective_weight: weight.effective,
            scores,
            dominant,
            narrative_flip: flip.is_some(),
            flip,
            signals: quote.signals,
            composite: None,
            overcorrection_status: overcorrection.status,
            banner: Some(overcorrection.banner),
            forecast,
            synthetic: false,
        });

        self.store.save(&record).await?;
        Ok(EntityOutcome::Recorded)
    }

    // ---- composite ----

    /// Amend today's snapshots with their composite sentiment
    pub async fn aggregate_day(&self, date: NaiveDate) -> EngineResult<RunReport> {
        let mut report = RunReport::new(RunPass::Composite, date);
        for entity in &self.universe.entities {
            let result = self.aggregate_entity(entity.id(), date).await;
            Self::settle(&mut report, entity.id(), result)?;
        }
        report.log_summary();
        Ok(report)
    }

    async fn aggregate_entity(&self, id: &str, date: NaiveDate) -> EngineResult<EntityOutcome> {
        let mut record = self.load_existing(id).await?;

        match self.aggregator.aggregate(&mut record, date)? {
            AggregateOutcome::Amended(_) => {
                self.store.save(&record).await?;
                Ok(EntityOutcome::Recorded)
            }
            AggregateOutcome::NoSignals => Ok(EntityOutcome::Skipped("no layer signals".to_string())),
        }
    }

    // ---- propagation ----

    /// Copy high-diagnosticity evidence across peer groups.
    ///
    /// Every record is loaded before any target is written.
    pub async fn propagate_day(&self, date: NaiveDate) -> EngineResult<PropagationSummary> {
        let mut records = BTreeMap::new();
        for entity in &self.universe.entities {
            let loaded = match self.store.load(entity.id()).await {
                Ok(Some(record)) => check_record(&record, self.policy.bounds).map(|_| Some(record)),
                other => other,
            };
            match loaded {
                Ok(Some(record)) => {
                    records.insert(entity.id().to_string(), record);
                }
                Ok(None) => {}
                Err(e) if e.is_entity_scoped() => {
                    tracing::warn!(entity = entity.id(), "Left out of propagation: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        let summary = self
            .propagator
            .propagate(&mut records, &self.universe.peer_groups, date);

        for target in &summary.updated_targets {
            if let Some(record) = records.get(target) {
                if let Err(e) = self.store.save(record).await {
                    if !e.is_entity_scoped() {
                        return Err(e);
                    }
                    tracing::error!(entity = %target, "Failed to save propagated evidence: {}", e);
                }
            }
        }
        Ok(summary)
    }

    /// Recording, composite and propagation passes for one batch
    pub async fn run_daily(&self, batch: &DailyBatch) -> EngineResult<DailyRunSummary> {
        let recording = self.record_day(batch).await?;
        let composite = self.aggregate_day(batch.date).await?;
        let propagation = self.propagate_day(batch.date).await?;
        Ok(DailyRunSummary {
            recording,
            composite,
            propagation,
        })
    }

    // ---- monthly calibration ----

    pub async fn run_monthly(&self, date: NaiveDate) -> EngineResult<RunReport> {
        let mut report = RunReport::new(RunPass::Monthly, date);
        tracing::info!(%date, "Monthly weight calibration");
        for entity in &self.universe.entities {
            let result = self.calibrate_entity(entity.id(), date).await;
            Self::settle(&mut report, entity.id(), result)?;
        }
        report.log_summary();
        Ok(report)
    }

    async fn calibrate_entity(&self, id: &str, date: NaiveDate) -> EngineResult<EntityOutcome> {
        let mut record = self.load_existing(id).await?;

        let report = self.calibrator.calibrate(&record, date);
        if let Some(history) = &self.history {
            history
                .record(&report)
                .await
                .map_err(|e| EngineError::Store(format!("{id}: calibration history: {e:#}")))?;
        }

        apply_report(&mut record, &report);
        if report.status != CalibrationStatus::InsufficientHistory {
            self.store.save(&record).await?;
        }

        let reason = || report.reason.clone().unwrap_or_default();
        Ok(match report.status {
            CalibrationStatus::Applied => EntityOutcome::Recorded,
            CalibrationStatus::Flagged => {
                EntityOutcome::Skipped(format!("weights flagged for review: {}", reason()))
            }
            CalibrationStatus::InsufficientHistory => {
                EntityOutcome::Skipped(format!("insufficient history: {}", reason()))
            }
        })
    }

    // ---- backfill ----

    /// Extend every stored price history to `target` observations
    pub async fn run_backfill(&self, date: NaiveDate, target: usize) -> EngineResult<RunReport> {
        let mut report = RunReport::new(RunPass::Backfill, date);
        for entity in &self.universe.entities {
            let result = self.backfill_entity(entity.id(), target).await;
            Self::settle(&mut report, entity.id(), result)?;
        }
        report.log_summary();
        Ok(report)
    }

    async fn backfill_entity(&self, id: &str, target: usize) -> EngineResult<EntityOutcome> {
        let mut record = self.load_existing(id).await?;

        let added = backfill_history(&mut record, target);
        if added == 0 {
            return Ok(EntityOutcome::Skipped(format!(
                "{} observations, nothing to backfill",
                record.price_history.len()
            )));
        }
        self.store.save(&record).await?;
        tracing::info!(entity = id, added, "History backfilled");
        Ok(EntityOutcome::Recorded)
    }
}
