use async_trait::async_trait;
use chrono::NaiveDate;
use narrative_core::{EntityRecord, Hypothesis, ScenarioForecast, Sentiment};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, ForecastResult};

/// Survival-score mass behind each scenario, as fractions summing to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioWeights {
    pub bullish: f64,
    pub neutral: f64,
    pub bearish: f64,
}

impl ScenarioWeights {
    pub fn from_hypotheses(hypotheses: &[Hypothesis]) -> Self {
        let mass = |sentiment: Sentiment| -> f64 {
            hypotheses
                .iter()
                .filter(|h| h.sentiment == sentiment)
                .map(|h| h.survival_score.max(0) as f64)
                .sum()
        };
        let bullish = mass(Sentiment::Bullish);
        let neutral = mass(Sentiment::Neutral);
        let bearish = mass(Sentiment::Bearish);
        let total = bullish + neutral + bearish;
        if total <= 0.0 {
            return Self {
                bullish: 1.0 / 3.0,
                neutral: 1.0 / 3.0,
                bearish: 1.0 / 3.0,
            };
        }
        Self {
            bullish: bullish / total,
            neutral: neutral / total,
            bearish: bearish / total,
        }
    }
}

/// Everything a provider needs to produce a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastInput {
    pub entity_id: String,
    pub as_of: NaiveDate,
    pub current_price: f64,
    pub horizon_days: u32,
    /// Real (non-synthetic) closes, oldest first
    pub closes: Vec<f64>,
    pub weights: ScenarioWeights,
}

impl ForecastInput {
    /// Build from a record whose hypotheses already carry today's scores
    pub fn from_record(record: &EntityRecord, as_of: NaiveDate, price: f64, horizon_days: u32) -> Self {
        Self {
            entity_id: record.id().to_string(),
            as_of,
            current_price: price,
            horizon_days,
            closes: record.real_history().iter().map(|p| p.close).collect(),
            weights: ScenarioWeights::from_hypotheses(&record.hypotheses),
        }
    }
}

/// Produces a bull / base / bear forecast.
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn forecast(&self, input: &ForecastInput) -> ForecastResult<ScenarioForecast>;

    fn backend_name(&self) -> &'static str;
}

/// Reject forecasts no consumer could display
pub fn validate_forecast(forecast: &ScenarioForecast) -> ForecastResult<()> {
    let scenarios = [forecast.bull, forecast.base, forecast.bear];
    if scenarios.iter().any(|s| !s.price.is_finite() || s.price <= 0.0) {
        return Err(ForecastError::InvalidResponse(
            "scenario price must be positive".to_string(),
        ));
    }
    if scenarios
        .iter()
        .any(|s| !(0.0..=1.0).contains(&s.probability))
    {
        return Err(ForecastError::InvalidResponse(
            "scenario probability outside [0, 1]".to_string(),
        ));
    }
    let total: f64 = scenarios.iter().map(|s| s.probability).sum();
    if (total - 1.0).abs() > 0.01 {
        return Err(ForecastError::InvalidResponse(format!(
            "scenario probabilities sum to {total:.3}"
        )));
    }
    if !(forecast.bear.price <= forecast.base.price && forecast.base.price <= forecast.bull.price) {
        return Err(ForecastError::InvalidResponse(
            "scenario prices out of order".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrative_core::{ForecastSource, Scenario};

    fn hyp(sentiment: Sentiment, score: i32) -> Hypothesis {
        Hypothesis {
            id: format!("{sentiment:?}"),
            name: String::new(),
            sentiment,
            survival_score: score,
            rank: 0,
        }
    }

    #[test]
    fn test_scenario_weights_from_scores() {
        let w = ScenarioWeights::from_hypotheses(&[
            hyp(Sentiment::Bullish, 22),
            hyp(Sentiment::Bearish, 67),
            hyp(Sentiment::Neutral, 11),
        ]);
        assert!((w.bullish - 0.22).abs() < 1e-12);
        assert!((w.bearish - 0.67).abs() < 1e-12);
        assert!((w.neutral - 0.11).abs() < 1e-12);

        let empty = ScenarioWeights::from_hypotheses(&[]);
        assert!((empty.bullish - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_forecast() {
        let mut f = ScenarioForecast {
            horizon_days: 63,
            bull: Scenario { price: 110.0, probability: 0.3 },
            base: Scenario { price: 100.0, probability: 0.4 },
            bear: Scenario { price: 90.0, probability: 0.3 },
            source: ForecastSource::Remote,
        };
        assert!(validate_forecast(&f).is_ok());
        f.bear.probability = 0.6;
        assert!(validate_forecast(&f).is_err());
        f.bear.probability = 0.3;
        f.bull.price = 95.0;
        assert!(validate_forecast(&f).is_err());
    }
}
