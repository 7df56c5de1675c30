//! Score Normaliser
//!
//! Projects raw hypothesis scores onto integer vectors that sum to `total`
//! with every element inside `[floor, ceiling]`. Pure and deterministic:
//! identical input always yields identical output.

use narrative_core::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

const MAX_REPAIR_PASSES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBounds {
    pub floor: i32,
    pub ceiling: i32,
    pub total: i32,
}

impl Default for ScoreBounds {
    fn default() -> Self {
        Self {
            floor: 5,
            ceiling: 80,
            total: 100,
        }
    }
}

impl ScoreBounds {
    /// Whether `len` scores can satisfy the bounds at all
    pub fn is_feasible(&self, len: usize) -> bool {
        let n = len as i64;
        self.floor <= self.ceiling
            && n * self.floor as i64 <= self.total as i64
            && self.total as i64 <= n * self.ceiling as i64
    }
}

/// Normalise raw scores into bounded integers summing to `bounds.total`.
///
/// Non-finite raw values are treated as the floor. An empty input yields an
/// empty output; a length the bounds cannot accommodate (one hypothesis
/// under the default bounds, say) is a constraint violation.
pub fn normalise(raw: &[f64], bounds: ScoreBounds) -> EngineResult<Vec<i32>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    if !bounds.is_feasible(raw.len()) {
        return Err(EngineError::ConstraintViolation(format!(
            "{} scores cannot fit floor {} / ceiling {} / total {}",
            raw.len(),
            bounds.floor,
            bounds.ceiling,
            bounds.total
        )));
    }

    let floor = bounds.floor as f64;
    let ceiling = bounds.ceiling as f64;
    let total = bounds.total as f64;

    // 1. clamp
    let clamped: Vec<f64> = raw
        .iter()
        .map(|v| if v.is_finite() { v.clamp(floor, ceiling) } else { floor })
        .collect();

    // 2. proportional scale
    let sum: f64 = clamped.iter().sum();
    let mut scores: Vec<i32> = if sum > 0.0 {
        clamped
            .iter()
            .map(|v| (v * total / sum).round() as i32)
            .collect()
    } else {
        let share = (total / raw.len() as f64).round() as i32;
        vec![share; raw.len()]
    };

    // 3. repair floor/ceiling violations
    let mut pinned = vec![false; scores.len()];
    for _ in 0..MAX_REPAIR_PASSES {
        let mut surplus: i64 = 0;
        let mut violated = false;
        for (i, score) in scores.iter_mut().enumerate() {
            if *score > bounds.ceiling {
                surplus += (*score - bounds.ceiling) as i64;
                *score = bounds.ceiling;
                pinned[i] = true;
                violated = true;
            } else if *score < bounds.floor {
                surplus -= (bounds.floor - *score) as i64;
                *score = bounds.floor;
                pinned[i] = true;
                violated = true;
            }
        }
        if !violated {
            break;
        }
        redistribute(&mut scores, &pinned, surplus, bounds);
    }

    // 4. residual onto the largest score
    let residual = bounds.total as i64 - scores.iter().map(|s| *s as i64).sum::<i64>();
    if residual != 0 {
        let idx = largest_index(&scores);
        let adjusted = (scores[idx] as i64 + residual)
            .clamp(bounds.floor as i64, bounds.ceiling as i64);
        scores[idx] = adjusted as i32;
    }

    // Anything the clamp above refused is settled across every score
    let remainder = bounds.total as i64 - scores.iter().map(|s| *s as i64).sum::<i64>();
    if remainder != 0 {
        let unpinned = vec![false; scores.len()];
        redistribute(&mut scores, &unpinned, remainder, bounds);
    }

    Ok(scores)
}

/// Move `amount` units into (positive) or out of (negative) the free scores,
/// one unit at a time: smallest free score first when adding, largest first
/// when removing. Lower index wins ties.
fn redistribute(scores: &mut [i32], pinned: &[bool], amount: i64, bounds: ScoreBounds) {
    let mut remaining = amount;
    while remaining > 0 {
        let target = (0..scores.len())
            .filter(|&i| !pinned[i] && scores[i] < bounds.ceiling)
            .min_by_key(|&i| (scores[i], i));
        match target {
            Some(i) => {
                scores[i] += 1;
                remaining -= 1;
            }
            None => break,
        }
    }
    while remaining < 0 {
        let target = (0..scores.len())
            .filter(|&i| !pinned[i] && scores[i] > bounds.floor)
            .min_by_key(|&i| (-scores[i], i));
        match target {
            Some(i) => {
                scores[i] -= 1;
                remaining += 1;
            }
            None => break,
        }
    }
}

/// Index of the maximum score, first index on ties
fn largest_index(scores: &[i32]) -> usize {
    scores
        .iter()
        .enumerate()
        .min_by_key(|(i, s)| (-**s, *i))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
