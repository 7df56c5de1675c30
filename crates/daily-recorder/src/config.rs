use anyhow::{Context, Result};
use hypothesis_engine::ScoringPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory of per-entity JSON records
    pub data_dir: PathBuf,
    /// Static universe: entities, hypotheses, peer groups
    pub universe_path: PathBuf,
    /// Calibration history database
    pub database_url: String,

    // Forecast collaborator
    pub forecast_service_url: Option<String>,
    pub forecast_timeout_ms: u64,
    pub forecast_horizon_days: u32,

    // Scoring
    pub neutral_reversion_coefficient: f64,
    pub propagation_window_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/entities"),
            universe_path: PathBuf::from("data/universe.json"),
            database_url: "sqlite:calibration.db".to_string(),
            forecast_service_url: None,
            forecast_timeout_ms: 5000,
            forecast_horizon_days: 63,
            neutral_reversion_coefficient: 0.5,
            propagation_window_days: 30,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            data_dir: env::var("NARRATIVE_DATA_DIR")
                .unwrap_or_else(|_| "data/entities".to_string())
                .into(),
            universe_path: env::var("NARRATIVE_UNIVERSE_PATH")
                .unwrap_or_else(|_| "data/universe.json".to_string())
                .into(),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:calibration.db".to_string()),

            forecast_service_url: env::var("FORECAST_SERVICE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            forecast_timeout_ms: env::var("FORECAST_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("FORECAST_TIMEOUT_MS must be an integer")?,
            forecast_horizon_days: env::var("FORECAST_HORIZON_DAYS")
                .unwrap_or_else(|_| "63".to_string())
                .parse()
                .context("FORECAST_HORIZON_DAYS must be an integer")?,

            neutral_reversion_coefficient: env::var("NEUTRAL_REVERSION_COEFFICIENT")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()
                .context("NEUTRAL_REVERSION_COEFFICIENT must be a number")?,
            propagation_window_days: env::var("PROPAGATION_WINDOW_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("PROPAGATION_WINDOW_DAYS must be an integer")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.neutral_reversion_coefficient) {
            anyhow::bail!(
                "NEUTRAL_REVERSION_COEFFICIENT must be within [0, 1], got {}",
                self.neutral_reversion_coefficient
            );
        }
        if self.forecast_horizon_days == 0 {
            anyhow::bail!("FORECAST_HORIZON_DAYS must be positive");
        }
        if self.propagation_window_days <= 0 {
            anyhow::bail!("PROPAGATION_WINDOW_DAYS must be positive");
        }
        Ok(())
    }

    pub fn policy(&self) -> ScoringPolicy {
        ScoringPolicy::default().with_neutral_reversion(self.neutral_reversion_coefficient)
    }

    pub fn forecast_timeout(&self) -> Duration {
        Duration::from_millis(self.forecast_timeout_ms)
    }
}
