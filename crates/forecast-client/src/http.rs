use async_trait::async_trait;
use narrative_core::{ForecastSource, Scenario, ScenarioForecast};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ForecastError, ForecastResult};
use crate::provider::{validate_forecast, ForecastInput, ForecastProvider};

#[derive(Debug, Clone, Serialize)]
struct ForecastRequest<'a> {
    entity_id: &'a str,
    as_of: String,
    current_price: f64,
    horizon_days: u32,
    closes: &'a [f64],
    bullish_weight: f64,
    neutral_weight: f64,
    bearish_weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ForecastResponse {
    bull: Scenario,
    base: Scenario,
    bear: Scenario,
    #[serde(default)]
    horizon_days: Option<u32>,
}

/// Remote forecast service reached over HTTP
#[derive(Clone)]
pub struct HttpForecastProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpForecastProvider {
    pub fn new(base_url: String, timeout: Duration) -> ForecastResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ForecastProvider for HttpForecastProvider {
    async fn forecast(&self, input: &ForecastInput) -> ForecastResult<ScenarioForecast> {
        let request = ForecastRequest {
            entity_id: &input.entity_id,
            as_of: input.as_of.to_string(),
            current_price: input.current_price,
            horizon_days: input.horizon_days,
            closes: &input.closes,
            bullish_weight: input.weights.bullish,
            neutral_weight: input.weights.neutral,
            bearish_weight: input.weights.bearish,
        };

        let response = self
            .client
            .post(format!("{}/forecast", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ForecastError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let body = response.json::<ForecastResponse>().await?;
        let forecast = ScenarioForecast {
            horizon_days: body.horizon_days.unwrap_or(input.horizon_days),
            bull: body.bull,
            base: body.base,
            bear: body.bear,
            source: ForecastSource::Remote,
        };
        validate_forecast(&forecast)?;
        Ok(forecast)
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}
