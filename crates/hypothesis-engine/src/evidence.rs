//! Hypothesis Evidence Applier
//!
//! Direct policy update of raw survival scores from one day's price move.
//! Aligned hypotheses gain the effective weight, opposed ones lose it.
//! NEUTRAL hypotheses are untouched except under a MATERIAL move, where the
//! status-quo narrative loses `coefficient × weight`.

use narrative_core::{Hypothesis, MoveClass, MoveDirection, Sentiment};

/// Raw (unnormalised) scores after applying the move, in declaration order
pub fn apply_move_evidence(
    hypotheses: &[Hypothesis],
    direction: MoveDirection,
    class: MoveClass,
    effective_weight: f64,
    neutral_coefficient: f64,
) -> Vec<f64> {
    hypotheses
        .iter()
        .map(|h| {
            let score = h.survival_score as f64;
            if effective_weight == 0.0 || direction == MoveDirection::Flat {
                return score;
            }
            match h.sentiment {
                s if s.aligns_with(direction) => score + effective_weight,
                s if s.opposes(direction) => score - effective_weight,
                Sentiment::Neutral if class == MoveClass::Material => {
                    score - neutral_coefficient * effective_weight
                }
                _ => score,
            }
        })
        .collect()
}
