//! Daily input batch: `{ date, quotes: [...], events: [...] }`.
//!
//! Quotes are decoded one at a time so that a single bad quote only costs
//! its own entity.

use chrono::NaiveDate;
use narrative_core::{DailyQuote, DisclosureEvent, EngineError, EngineResult};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct RawBatch {
    date: NaiveDate,
    #[serde(default)]
    quotes: Vec<serde_json::Value>,
    #[serde(default)]
    events: Vec<DisclosureEvent>,
}

/// A quote that could not be used, with the entity it belonged to when known
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedQuote {
    pub index: usize,
    pub entity_id: Option<String>,
    pub error: EngineError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyBatch {
    pub date: NaiveDate,
    pub quotes: BTreeMap<String, DailyQuote>,
    pub events: Vec<DisclosureEvent>,
    pub rejected: Vec<RejectedQuote>,
}

impl DailyBatch {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            quotes: BTreeMap::new(),
            events: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn with_quote(mut self, quote: DailyQuote) -> Self {
        self.quotes.insert(quote.entity_id.clone(), quote);
        self
    }

    pub fn with_event(mut self, event: DisclosureEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn quote(&self, entity_id: &str) -> Option<&DailyQuote> {
        self.quotes.get(entity_id)
    }

    /// Why an entity has no usable quote
    pub fn missing_reason(&self, entity_id: &str) -> EngineError {
        self.rejected
            .iter()
            .find(|r| r.entity_id.as_deref() == Some(entity_id))
            .map(|r| r.error.clone())
            .unwrap_or_else(|| {
                EngineError::MissingInput(format!("{entity_id}: no quote for {}", self.date))
            })
    }
}

fn quote_entity_id(value: &serde_json::Value) -> Option<String> {
    value
        .get("entity_id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn check_quote(quote: &DailyQuote) -> EngineResult<()> {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if !positive(quote.close) || !positive(quote.prior_close) {
        return Err(EngineError::MalformedRecord(format!(
            "{}: close {} / prior close {} must be positive",
            quote.entity_id, quote.close, quote.prior_close
        )));
    }
    if let Some(volume) = quote.volume {
        if !volume.is_finite() || volume < 0.0 {
            return Err(EngineError::MalformedRecord(format!(
                "{}: volume {volume} must be non-negative",
                quote.entity_id
            )));
        }
    }
    Ok(())
}

/// Decode a batch. Only an unreadable envelope is an error; individual quotes
/// that fail to decode or validate land in `rejected`.
pub fn decode_batch(text: &str) -> EngineResult<DailyBatch> {
    let raw: RawBatch = serde_json::from_str(text)?;
    let mut batch = DailyBatch::new(raw.date);
    batch.events = raw.events;

    for (index, value) in raw.quotes.into_iter().enumerate() {
        let entity_id = quote_entity_id(&value);
        let decoded = serde_json::from_value::<DailyQuote>(value)
            .map_err(|e| EngineError::MalformedRecord(format!("quote #{index}: {e}")))
            .and_then(|q| check_quote(&q).map(|_| q));

        match decoded {
            Ok(quote) if batch.quotes.contains_key(&quote.entity_id) => {
                batch.rejected.push(RejectedQuote {
                    index,
                    entity_id: Some(quote.entity_id.clone()),
                    error: EngineError::MalformedRecord(format!(
                        "{}: duplicate quote #{index}",
                        quote.entity_id
                    )),
                });
            }
            Ok(quote) => {
                batch.quotes.insert(quote.entity_id.clone(), quote);
            }
            Err(error) => {
                tracing::warn!(index, entity = ?entity_id, "Rejected quote: {}", error);
                batch.rejected.push(RejectedQuote {
                    index,
                    entity_id,
                    error,
                });
            }
        }
    }

    tracing::debug!(
        date = %batch.date,
        quotes = batch.quotes.len(),
        rejected = batch.rejected.len(),
        events = batch.events.len(),
        "Decoded daily batch"
    );
    Ok(batch)
}
