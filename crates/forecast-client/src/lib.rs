//! Three-scenario price forecasts behind a single-method provider interface,
//! with a deterministic historical fallback whenever the remote call fails.

pub mod error;
pub mod historical;
pub mod http;
pub mod provider;
pub mod service;

pub use error::{ForecastError, ForecastResult};
pub use historical::HistoricalForecaster;
pub use http::HttpForecastProvider;
pub use provider::{ForecastInput, ForecastProvider, ScenarioWeights};
pub use service::ForecastService;
