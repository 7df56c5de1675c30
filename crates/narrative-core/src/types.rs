use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Polarity of a hypothesis with respect to the entity's price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    /// True when a price move in `direction` supports this hypothesis
    pub fn aligns_with(&self, direction: MoveDirection) -> bool {
        matches!(
            (self, direction),
            (Sentiment::Bullish, MoveDirection::Up) | (Sentiment::Bearish, MoveDirection::Down)
        )
    }

    /// True when a price move in `direction` contradicts this hypothesis
    pub fn opposes(&self, direction: MoveDirection) -> bool {
        matches!(
            (self, direction),
            (Sentiment::Bullish, MoveDirection::Down) | (Sentiment::Bearish, MoveDirection::Up)
        )
    }
}

/// Sign of a price move (or of a piece of evidence)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveDirection {
    Up,
    Down,
    Flat,
}

impl MoveDirection {
    pub fn from_change(pct: f64) -> Self {
        if pct > 0.0 {
            MoveDirection::Up
        } else if pct < 0.0 {
            MoveDirection::Down
        } else {
            MoveDirection::Flat
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MoveDirection::Up => "up",
            MoveDirection::Down => "down",
            MoveDirection::Flat => "flat",
        }
    }
}

/// Severity bucket of a daily price change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveClass {
    Noise,
    Notable,
    Significant,
    Material,
}

impl MoveClass {
    /// Base evidentiary weight before amplification
    pub fn base_weight(&self) -> f64 {
        match self {
            MoveClass::Noise => 0.0,
            MoveClass::Notable => 2.0,
            MoveClass::Significant => 5.0,
            MoveClass::Material => 10.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MoveClass::Noise => "NOISE",
            MoveClass::Notable => "NOTABLE",
            MoveClass::Significant => "SIGNIFICANT",
            MoveClass::Material => "MATERIAL",
        }
    }
}

/// One competing narrative for an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: String,
    pub name: String,
    pub sentiment: Sentiment,
    /// Survival score, 5..=80, summing to 100 across the set
    pub survival_score: i32,
    /// 1 = dominant
    #[serde(default)]
    pub rank: u8,
}

/// Layer weights for the composite sentiment (sum to 1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    pub macro_weight: f64,
    pub sector_weight: f64,
    pub idio_weight: f64,
}

impl LayerWeights {
    pub fn new(macro_weight: f64, sector_weight: f64, idio_weight: f64) -> Self {
        Self {
            macro_weight,
            sector_weight,
            idio_weight,
        }
    }

    pub fn sum(&self) -> f64 {
        self.macro_weight + self.sector_weight + self.idio_weight
    }

    pub fn is_normalised(&self) -> bool {
        (self.sum() - 1.0).abs() <= 1e-6
            && self.macro_weight >= 0.0
            && self.sector_weight >= 0.0
            && self.idio_weight >= 0.0
    }
}

/// Independently computed per-layer sentiment signals, roughly -100..=100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerSignals {
    pub macro_signal: f64,
    pub sector_signal: f64,
    pub idio_signal: f64,
}

/// Rounded per-layer contributions persisted next to the composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerContributions {
    pub macro_contribution: i32,
    pub sector_contribution: i32,
    pub idio_contribution: i32,
}

/// Composite sentiment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SentimentLabel {
    StrongUpside,
    Upside,
    Neutral,
    Downside,
    StrongDownside,
}

impl SentimentLabel {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s > 30 => SentimentLabel::StrongUpside,
            s if s > 10 => SentimentLabel::Upside,
            s if s > -10 => SentimentLabel::Neutral,
            s if s > -30 => SentimentLabel::Downside,
            _ => SentimentLabel::StrongDownside,
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            SentimentLabel::StrongUpside => "STRONG UPSIDE",
            SentimentLabel::Upside => "UPSIDE",
            SentimentLabel::Neutral => "NEUTRAL",
            SentimentLabel::Downside => "DOWNSIDE",
            SentimentLabel::StrongDownside => "STRONG DOWNSIDE",
        }
    }
}

/// Blended three-layer sentiment for one entity on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSentiment {
    pub date: NaiveDate,
    /// -100..=100
    pub overall: i32,
    pub label: SentimentLabel,
    pub contributions: LayerContributions,
    pub weights: LayerWeights,
    pub signals: LayerSignals,
}

/// A single daily close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
    /// Reconstructed (backfilled) entry, excluded from cumulative statistics
    #[serde(default)]
    pub synthetic: bool,
}

/// Dominant-hypothesis change between consecutive snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeFlip {
    pub from: String,
    pub to: String,
    pub trigger: String,
}

/// Score and rank of one hypothesis inside a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypothesisScore {
    pub id: String,
    pub score: i32,
    pub rank: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OvercorrectionTrigger {
    DailyMove,
    FiveDayMove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OvercorrectionResolution {
    /// The move substantially reversed and is treated as noise
    Confirmed,
    /// The move held and is treated as information
    Fundamental,
}

/// Overcorrection state as seen from a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OvercorrectionStatus {
    Inactive,
    Triggered,
    UnderReview,
    ReviewExtended,
    Confirmed,
    Fundamental,
}

impl OvercorrectionStatus {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OvercorrectionStatus::Triggered
                | OvercorrectionStatus::UnderReview
                | OvercorrectionStatus::ReviewExtended
        )
    }
}

/// Entity-scoped overcorrection lifecycle record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvercorrectionRecord {
    pub active: bool,
    pub trigger: OvercorrectionTrigger,
    pub trigger_date: NaiveDate,
    pub trigger_price: f64,
    pub direction: MoveDirection,
    /// Signed % move that fired the trigger
    pub move_pct: f64,
    pub review_date: NaiveDate,
    pub extension_count: u32,
    #[serde(default)]
    pub resolution: Option<OvercorrectionResolution>,
    #[serde(default)]
    pub resolved_date: Option<NaiveDate>,
    /// Fraction of the move reversed at the last review
    #[serde(default)]
    pub last_reversal: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BannerSeverity {
    High,
    Moderate,
}

/// Display payload consumed by the UI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BannerPayload {
    pub active: bool,
    pub severity: Option<BannerSeverity>,
    pub message: String,
}

impl BannerPayload {
    pub fn hidden() -> Self {
        Self {
            active: false,
            severity: None,
            message: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForecastSource {
    Remote,
    Fallback,
}

/// One price scenario of a forecast
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub price: f64,
    pub probability: f64,
}

/// Bull / base / bear forecast over a horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioForecast {
    pub horizon_days: u32,
    pub bull: Scenario,
    pub base: Scenario,
    pub bear: Scenario,
    pub source: ForecastSource,
}

/// Immutable daily record for one entity (amended only by same-day passes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub price: f64,
    pub change_pct: f64,
    pub classification: MoveClass,
    #[serde(default)]
    pub volume_ratio: Option<f64>,
    pub effective_weight: f64,
    /// Declaration order of the entity's hypotheses
    pub scores: Vec<HypothesisScore>,
    pub dominant: String,
    pub narrative_flip: bool,
    #[serde(default)]
    pub flip: Option<NarrativeFlip>,
    #[serde(default)]
    pub signals: Option<LayerSignals>,
    #[serde(default)]
    pub composite: Option<CompositeSentiment>,
    pub overcorrection_status: OvercorrectionStatus,
    #[serde(default)]
    pub banner: Option<BannerPayload>,
    #[serde(default)]
    pub forecast: Option<ScenarioForecast>,
    #[serde(default)]
    pub synthetic: bool,
}

/// Static description of a tracked instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub peer_groups: Vec<String>,
    pub default_weights: LayerWeights,
    #[serde(default)]
    pub narrative_model: String,
    /// Commodity-exposed entities need a minimum regression sector share
    #[serde(default)]
    pub commodity_exposed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Diagnosticity {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Diagnosticity {
    fn level(&self) -> u8 {
        match self {
            Diagnosticity::Low => 0,
            Diagnosticity::Medium => 1,
            Diagnosticity::High => 2,
            Diagnosticity::VeryHigh => 3,
        }
    }

    fn from_level(level: u8) -> Self {
        match level {
            0 => Diagnosticity::Low,
            1 => Diagnosticity::Medium,
            2 => Diagnosticity::High,
            _ => Diagnosticity::VeryHigh,
        }
    }

    /// Drop `levels` steps, never below LOW
    pub fn downgrade(&self, levels: u8) -> Self {
        Self::from_level(self.level().saturating_sub(levels))
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Diagnosticity::High | Diagnosticity::VeryHigh)
    }
}

/// Granularity at which a piece of evidence applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceScope {
    Macro,
    Sector,
    Company,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceImpact {
    Supports,
    Contradicts,
    Neutral,
}

/// A dated piece of evidence attached to an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: String,
    pub entity_id: String,
    pub evidence_type: String,
    pub scope: EvidenceScope,
    /// Price direction the evidence points to
    pub direction: MoveDirection,
    pub diagnosticity: Diagnosticity,
    pub date: NaiveDate,
    pub active: bool,
    pub half_life_days: f64,
    /// Impact per hypothesis id
    #[serde(default)]
    pub impacts: BTreeMap<String, EvidenceImpact>,
    #[serde(default)]
    pub summary: String,
    /// Source entity when the item was copied from a peer
    #[serde(default)]
    pub propagated_from: Option<String>,
}

impl EvidenceItem {
    /// Remaining evidentiary value in (0, 1] after exponential decay
    pub fn decayed_weight(&self, as_of: NaiveDate) -> f64 {
        let age = (as_of - self.date).num_days().max(0) as f64;
        if self.half_life_days <= 0.0 {
            return if age == 0.0 { 1.0 } else { 0.0 };
        }
        0.5f64.powf(age / self.half_life_days)
    }
}

/// Static set of entities sharing return-driving exposures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerGroup {
    pub id: String,
    pub members: Vec<String>,
    pub relevant_evidence_types: Vec<String>,
    /// Retained share of evidentiary value when copied to a peer, in (0, 1]
    pub attenuation: f64,
}

/// Scheduled disclosure (results, AGM, trading update)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisclosureEvent {
    pub entity_id: String,
    pub date: NaiveDate,
    pub summary: String,
}

/// One entity's market input for the run date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyQuote {
    pub entity_id: String,
    pub close: f64,
    pub prior_close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub signals: Option<LayerSignals>,
}

/// Persisted per-entity record (the unit of read-modify-write)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity: Entity,
    #[serde(default)]
    pub current_price: Option<f64>,
    pub weights: LayerWeights,
    pub hypotheses: Vec<Hypothesis>,
    #[serde(default)]
    pub price_history: Vec<PriceObservation>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    #[serde(default)]
    pub overcorrection: Option<OvercorrectionRecord>,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    #[serde(default)]
    pub composite: Option<CompositeSentiment>,
    #[serde(default)]
    pub needs_weight_review: bool,
    #[serde(default)]
    pub last_calibration: Option<NaiveDate>,
}

impl EntityRecord {
    pub fn new(entity: Entity, hypotheses: Vec<Hypothesis>) -> Self {
        let weights = entity.default_weights;
        Self {
            entity,
            current_price: None,
            weights,
            hypotheses,
            price_history: Vec::new(),
            snapshots: Vec::new(),
            overcorrection: None,
            evidence: Vec::new(),
            composite: None,
            needs_weight_review: false,
            last_calibration: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.entity.id
    }

    pub fn snapshot_on(&self, date: NaiveDate) -> Option<&Snapshot> {
        self.snapshots.iter().rev().find(|s| s.date == date)
    }

    pub fn snapshot_on_mut(&mut self, date: NaiveDate) -> Option<&mut Snapshot> {
        self.snapshots.iter_mut().rev().find(|s| s.date == date)
    }

    /// Latest snapshot strictly before `date`
    pub fn previous_snapshot(&self, date: NaiveDate) -> Option<&Snapshot> {
        self.snapshots.iter().rev().find(|s| s.date < date)
    }

    /// Id of the current rank-1 hypothesis
    pub fn dominant_id(&self) -> Option<&str> {
        self.hypotheses
            .iter()
            .find(|h| h.rank == 1)
            .map(|h| h.id.as_str())
    }

    /// Price history with backfilled entries removed
    pub fn real_history(&self) -> Vec<&PriceObservation> {
        self.price_history.iter().filter(|p| !p.synthetic).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_alignment() {
        assert!(Sentiment::Bullish.aligns_with(MoveDirection::Up));
        assert!(Sentiment::Bearish.aligns_with(MoveDirection::Down));
        assert!(Sentiment::Bullish.opposes(MoveDirection::Down));
        assert!(!Sentiment::Neutral.aligns_with(MoveDirection::Up));
        assert!(!Sentiment::Neutral.opposes(MoveDirection::Down));
        assert!(!Sentiment::Bullish.aligns_with(MoveDirection::Flat));
    }

    #[test]
    fn test_sentiment_label_thresholds() {
        assert_eq!(SentimentLabel::from_score(31), SentimentLabel::StrongUpside);
        assert_eq!(SentimentLabel::from_score(30), SentimentLabel::Upside);
        assert_eq!(SentimentLabel::from_score(11), SentimentLabel::Upside);
        assert_eq!(SentimentLabel::from_score(10), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-9), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-10), SentimentLabel::Downside);
        assert_eq!(SentimentLabel::from_score(-29), SentimentLabel::Downside);
        assert_eq!(SentimentLabel::from_score(-30), SentimentLabel::StrongDownside);
        assert_eq!(SentimentLabel::StrongDownside.to_label(), "STRONG DOWNSIDE");
    }

    #[test]
    fn test_diagnosticity_downgrade_floors_at_low() {
        assert_eq!(Diagnosticity::VeryHigh.downgrade(1), Diagnosticity::High);
        assert_eq!(Diagnosticity::High.downgrade(2), Diagnosticity::Low);
        assert_eq!(Diagnosticity::Medium.downgrade(5), Diagnosticity::Low);
        assert!(Diagnosticity::VeryHigh.is_high());
        assert!(!Diagnosticity::Medium.is_high());
    }

    #[test]
    fn test_evidence_decay() {
        let item = EvidenceItem {
            id: "ev-1".to_string(),
            entity_id: "BHP".to_string(),
            evidence_type: "commodity_price".to_string(),
            scope: EvidenceScope::Sector,
            direction: MoveDirection::Up,
            diagnosticity: Diagnosticity::High,
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            active: true,
            half_life_days: 10.0,
            impacts: BTreeMap::new(),
            summary: String::new(),
            propagated_from: None,
        };
        let d0 = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let d10 = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();
        assert!((item.decayed_weight(d0) - 1.0).abs() < 1e-12);
        assert!((item.decayed_weight(d10) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_weights_normalised() {
        assert!(LayerWeights::new(0.3, 0.3, 0.4).is_normalised());
        assert!(!LayerWeights::new(0.3, 0.3, 0.3).is_normalised());
        assert!(!LayerWeights::new(1.2, -0.1, -0.1).is_normalised());
    }

    #[test]
    fn test_record_serde_defaults() {
        let json = r#"{
            "entity": {"id": "WOW", "name": "Woolworths",
                       "default_weights": {"macro_weight": 0.2, "sector_weight": 0.3, "idio_weight": 0.5}},
            "weights": {"macro_weight": 0.2, "sector_weight": 0.3, "idio_weight": 0.5},
            "hypotheses": [
                {"id": "T1", "name": "Recovery", "sentiment": "BULLISH", "survival_score": 50}
            ]
        }"#;
        let record: EntityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id(), "WOW");
        assert!(record.snapshots.is_empty());
        assert!(record.overcorrection.is_none());
        assert_eq!(record.hypotheses[0].rank, 0);
    }
}
