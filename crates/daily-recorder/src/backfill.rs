//! Synthetic price-history backfill.
//!
//! Short histories are extended backwards with a reverse geometric Brownian
//! walk so that the cumulative windows and forecasts have something to look
//! at. Generated entries are flagged `synthetic` and excluded from every
//! statistic that feeds scoring or calibration.

use chrono::{Duration, NaiveDate};
use forecast_client::historical::daily_volatility;
use hypothesis_engine::is_trading_day;
use narrative_core::{EntityRecord, PriceObservation};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;

/// Daily log drift of the walk
pub const BACKFILL_DRIFT: f64 = 0.0002;

/// FNV-1a, so that every entity gets its own reproducible walk
fn seed_for(entity_id: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in entity_id.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn previous_trading_day(date: NaiveDate) -> NaiveDate {
    let mut current = date - Duration::days(1);
    while !is_trading_day(current) {
        current -= Duration::days(1);
    }
    current
}

/// Prepend synthetic observations until the history holds `target` entries.
/// Returns how many were added; an empty history has no anchor and is left
/// alone.
pub fn backfill_history(record: &mut EntityRecord, target: usize) -> usize {
    let existing = record.price_history.len();
    if existing >= target {
        return 0;
    }
    let Some(oldest) = record.price_history.first() else {
        return 0;
    };
    let (mut date, mut price) = (oldest.date, oldest.close);

    let closes: Vec<f64> = record.real_history().iter().map(|p| p.close).collect();
    let sigma = daily_volatility(&closes);
    let step_drift = BACKFILL_DRIFT - sigma * sigma / 2.0;

    let Ok(normal) = Normal::new(0.0, 1.0) else {
        return 0;
    };
    let mut rng = StdRng::seed_from_u64(seed_for(record.id()));

    let needed = target - existing;
    let mut generated = Vec::with_capacity(needed);
    for _ in 0..needed {
        let z: f64 = normal.sample(&mut rng);
        price /= (step_drift + sigma * z).exp();
        date = previous_trading_day(date);
        generated.push(PriceObservation {
            date,
            close: price,
            volume: None,
            synthetic: true,
        });
    }
    generated.reverse();
    generated.extend(record.price_history.drain(..));
    record.price_history = generated;

    tracing::debug!(
        entity = record.id(),
        added = needed,
        sigma,
        "Backfilled synthetic history"
    );
    needed
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrative_core::{Entity, LayerWeights};

    fn record(id: &str) -> EntityRecord {
        let entity = Entity {
            id: id.to_string(),
            name: id.to_string(),
            peer_groups: vec![],
            default_weights: LayerWeights::new(0.3, 0.3, 0.4),
            narrative_model: String::new(),
            commodity_exposed: false,
        };
        let mut r = EntityRecord::new(entity, vec![]);
        // Mon 2025-03-03 .. Wed 2025-03-05
        for (i, close) in [40.0, 40.8, 40.2].iter().enumerate() {
            r.price_history.push(PriceObservation {
                date: NaiveDate::from_ymd_opt(2025, 3, 3 + i as u32).unwrap(),
                close: *close,
                volume: Some(1000.0),
                synthetic: false,
            });
        }
        r
    }

    #[test]
    fn test_prepends_synthetic_weekdays() {
        let mut r = record("WOW");
        let added = backfill_history(&mut r, 10);
        assert_eq!(added, 7);
        assert_eq!(r.price_history.len(), 10);
        assert!(r.price_history[..7].iter().all(|p| p.synthetic && p.volume.is_none()));
        assert!(r.price_history[7..].iter().all(|p| !p.synthetic));
        assert_eq!(r.real_history().len(), 3);

        // Friday before the Monday anchor
        assert_eq!(r.price_history[6].date, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert!(r.price_history.windows(2).all(|w| w[0].date < w[1].date));
        assert!(r.price_history.iter().all(|p| is_trading_day(p.date)));
        assert!(r.price_history.iter().all(|p| p.close.is_finite() && p.close > 0.0));
    }

    #[test]
    fn test_replay_is_identical() {
        let mut a = record("WOW");
        let mut b = record("WOW");
        backfill_history(&mut a, 30);
        backfill_history(&mut b, 30);
        assert_eq!(a.price_history, b.price_history);

        let mut c = record("CSL");
        backfill_history(&mut c, 30);
        assert_ne!(a.price_history[0].close, c.price_history[0].close);
    }

    #[test]
    fn test_long_or_empty_history_untouched() {
        let mut r = record("WOW");
        assert_eq!(backfill_history(&mut r, 3), 0);
        assert_eq!(r.price_history.len(), 3);

        let mut empty = record("WOW");
        empty.price_history.clear();
        assert_eq!(backfill_history(&mut empty, 10), 0);
    }
}
