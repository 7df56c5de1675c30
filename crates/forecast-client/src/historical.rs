//! Deterministic fallback forecast from realised volatility and hypothesis mass.

use async_trait::async_trait;
use narrative_core::stats::{log_returns, std_dev};
use narrative_core::{ForecastSource, Scenario, ScenarioForecast};

use crate::error::{ForecastError, ForecastResult};
use crate::provider::{ForecastInput, ForecastProvider};

pub const MIN_DAILY_VOLATILITY: f64 = 0.008;
pub const MAX_DAILY_VOLATILITY: f64 = 0.030;
/// Used when fewer than two returns are available
pub const DEFAULT_DAILY_VOLATILITY: f64 = 0.015;

/// Clamped daily log-return volatility of a close series
pub fn daily_volatility(closes: &[f64]) -> f64 {
    let returns = log_returns(closes);
    if returns.len() < 2 {
        return DEFAULT_DAILY_VOLATILITY;
    }
    std_dev(&returns).clamp(MIN_DAILY_VOLATILITY, MAX_DAILY_VOLATILITY)
}

#[derive(Debug, Default, Clone)]
pub struct HistoricalForecaster;

impl HistoricalForecaster {
    pub fn new() -> Self {
        Self
    }

    /// Bull and bear sit one horizon standard deviation either side of the
    /// current price; probabilities follow the survival-score mass.
    pub fn estimate(&self, input: &ForecastInput) -> ForecastResult<ScenarioForecast> {
        if !input.current_price.is_finite() || input.current_price <= 0.0 {
            return Err(ForecastError::InvalidResponse(format!(
                "{}: current price must be positive",
                input.entity_id
            )));
        }
        let sigma = daily_volatility(&input.closes) * (input.horizon_days.max(1) as f64).sqrt();
        let price = input.current_price;

        Ok(ScenarioForecast {
            horizon_days: input.horizon_days,
            bull: Scenario {
                price: price * sigma.exp(),
                probability: input.weights.bullish,
            },
            base: Scenario {
                price,
                probability: input.weights.neutral,
            },
            bear: Scenario {
                price: price * (-sigma).exp(),
                probability: input.weights.bearish,
            },
            source: ForecastSource::Fallback,
        })
    }
}

#[async_trait]
impl ForecastProvider for HistoricalForecaster {
    async fn forecast(&self, input: &ForecastInput) -> ForecastResult<ScenarioForecast> {
        self.estimate(input)
    }

    fn backend_name(&self) -> &'static str {
        "historical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScenarioWeights;
    use chrono::NaiveDate;

    fn input(closes: Vec<f64>) -> ForecastInput {
        ForecastInput {
            entity_id: "WOW".to_string(),
            as_of: NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
            current_price: 100.0,
            horizon_days: 63,
            closes,
            weights: ScenarioWeights {
                bullish: 0.22,
                neutral: 0.11,
                bearish: 0.67,
            },
        }
    }

    #[test]
    fn test_volatility_is_clamped() {
        assert_eq!(daily_volatility(&[100.0; 30]), MIN_DAILY_VOLATILITY);
        let wild: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 100.0 } else { 150.0 }).collect();
        assert_eq!(daily_volatility(&wild), MAX_DAILY_VOLATILITY);
        assert_eq!(daily_volatility(&[100.0]), DEFAULT_DAILY_VOLATILITY);
    }

    #[test]
    fn test_estimate_is_deterministic_and_ordered() {
        let f = HistoricalForecaster::new();
        let a = f.estimate(&input(vec![100.0; 30])).unwrap();
        let b = f.estimate(&input(vec![100.0; 30])).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.source, ForecastSource::Fallback);
        assert!(a.bear.price < a.base.price && a.base.price < a.bull.price);
        // 0.008 * sqrt(63)
        let sigma = 0.008 * 63f64.sqrt();
        assert!((a.bull.price - 100.0 * sigma.exp()).abs() < 1e-9);
        assert_eq!(a.bear.probability, 0.67);
        assert!(crate::provider::validate_forecast(&a).is_ok());
    }

    #[test]
    fn test_rejects_non_positive_price() {
        let mut bad = input(vec![]);
        bad.current_price = 0.0;
        assert!(HistoricalForecaster::new().estimate(&bad).is_err());
    }
}
