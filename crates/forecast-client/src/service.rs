use narrative_core::ScenarioForecast;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ForecastError, ForecastResult};
use crate::historical::HistoricalForecaster;
use crate::provider::{ForecastInput, ForecastProvider};

/// Timeout + fallback wrapper around an optional remote provider.
///
/// `forecast` never fails on account of the remote side: any error or
/// timeout degrades to the historical estimate.
#[derive(Clone)]
pub struct ForecastService {
    provider: Option<Arc<dyn ForecastProvider>>,
    fallback: HistoricalForecaster,
    timeout: Duration,
}

impl ForecastService {
    pub fn new(provider: Option<Arc<dyn ForecastProvider>>, timeout: Duration) -> Self {
        Self {
            provider,
            fallback: HistoricalForecaster::new(),
            timeout,
        }
    }

    /// Fallback only
    pub fn offline() -> Self {
        Self::new(None, Duration::from_millis(0))
    }

    async fn remote(&self, provider: &dyn ForecastProvider, input: &ForecastInput) -> ForecastResult<ScenarioForecast> {
        match tokio::time::timeout(self.timeout, provider.forecast(input)).await {
            Ok(result) => result,
            Err(_) => Err(ForecastError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    /// Remote forecast when available, otherwise the deterministic fallback.
    /// Only an unusable input (non-positive price) yields `None`.
    pub async fn forecast(&self, input: &ForecastInput) -> Option<ScenarioForecast> {
        if let Some(provider) = &self.provider {
            match self.remote(provider.as_ref(), input).await {
                Ok(forecast) => return Some(forecast),
                Err(e) => {
                    tracing::warn!(
                        entity = %input.entity_id,
                        backend = provider.backend_name(),
                        "Forecast provider failed, using historical fallback: {}",
                        e
                    );
                }
            }
        }

        match self.fallback.estimate(input) {
            Ok(forecast) => Some(forecast),
            Err(e) => {
                tracing::warn!(entity = %input.entity_id, "No forecast: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScenarioWeights;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use narrative_core::{ForecastSource, Scenario};

    struct Failing;

    #[async_trait]
    impl ForecastProvider for Failing {
        async fn forecast(&self, _input: &ForecastInput) -> ForecastResult<ScenarioForecast> {
            Err(ForecastError::ServiceUnavailable("down".to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "failing"
        }
    }

    struct Slow;

    #[async_trait]
    impl ForecastProvider for Slow {
        async fn forecast(&self, input: &ForecastInput) -> ForecastResult<ScenarioForecast> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Fixed.forecast(input).await
        }

        fn backend_name(&self) -> &'static str {
            "slow"
        }
    }

    struct Fixed;

    #[async_trait]
    impl ForecastProvider for Fixed {
        async fn forecast(&self, input: &ForecastInput) -> ForecastResult<ScenarioForecast> {
            Ok(ScenarioForecast {
                horizon_days: input.horizon_days,
                bull: Scenario { price: 130.0, probability: 0.3 },
                base: Scenario { price: 100.0, probability: 0.4 },
                bear: Scenario { price: 80.0, probability: 0.3 },
                source: ForecastSource::Remote,
            })
        }

        fn backend_name(&self) -> &'static str {
            "fixed"
        }
    }

    fn input() -> ForecastInput {
        ForecastInput {
            entity_id: "WOW".to_string(),
            as_of: NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
            current_price: 100.0,
            horizon_days: 63,
            closes: vec![100.0, 101.0, 99.0, 100.5],
            weights: ScenarioWeights {
                bullish: 0.4,
                neutral: 0.2,
                bearish: 0.4,
            },
        }
    }

    #[tokio::test]
    async fn test_remote_success() {
        let service = ForecastService::new(Some(Arc::new(Fixed)), Duration::from_secs(1));
        let f = service.forecast(&input()).await.unwrap();
        assert_eq!(f.source, ForecastSource::Remote);
        assert_eq!(f.bull.price, 130.0);
    }

    #[tokio::test]
    async fn test_error_falls_back() {
        let service = ForecastService::new(Some(Arc::new(Failing)), Duration::from_secs(1));
        let f = service.forecast(&input()).await.unwrap();
        assert_eq!(f.source, ForecastSource::Fallback);
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let service = ForecastService::new(Some(Arc::new(Slow)), Duration::from_millis(20));
        let f = service.forecast(&input()).await.unwrap();
        assert_eq!(f.source, ForecastSource::Fallback);
    }

    #[tokio::test]
    async fn test_offline_is_deterministic() {
        let service = ForecastService::offline();
        let a = service.forecast(&input()).await;
        let b = service.forecast(&input()).await;
        assert!(a.is_some());
        assert_eq!(a, b);
    }
}
