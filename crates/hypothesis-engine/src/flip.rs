//! Flip Detector
//!
//! Ranks normalised scores and reports a change of dominant hypothesis.

use narrative_core::{DisclosureEvent, Hypothesis, MoveClass, NarrativeFlip};

/// Ranks (1 = dominant) for `scores`, descending, ties by declaration order
pub fn rank_hypotheses(scores: &[i32]) -> Vec<u8> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    // stable sort keeps declaration order among equal scores
    order.sort_by(|a, b| scores[*b].cmp(&scores[*a]));

    let mut ranks = vec![0u8; scores.len()];
    for (position, idx) in order.into_iter().enumerate() {
        ranks[idx] = (position + 1) as u8;
    }
    ranks
}

/// Write normalised scores and ranks back onto the hypotheses.
/// Returns the id of the new dominant hypothesis.
pub fn apply_scores(hypotheses: &mut [Hypothesis], scores: &[i32]) -> Option<String> {
    let ranks = rank_hypotheses(scores);
    for ((h, score), rank) in hypotheses.iter_mut().zip(scores).zip(ranks) {
        h.survival_score = *score;
        h.rank = rank;
    }
    hypotheses
        .iter()
        .find(|h| h.rank == 1)
        .map(|h| h.id.clone())
}

/// Human-readable cause of a flip
pub fn flip_trigger(event_today: Option<&DisclosureEvent>, class: MoveClass) -> String {
    match event_today {
        Some(event) => event.summary.clone(),
        None if class != MoveClass::Noise => class.label().to_string(),
        None => "score recalculation".to_string(),
    }
}

/// `Some` when the dominant hypothesis changed since the previous snapshot
pub fn detect_flip(previous: Option<&str>, current: &str, trigger: &str) -> Option<NarrativeFlip> {
    match previous {
        Some(prev) if prev != current => Some(NarrativeFlip {
            from: prev.to_string(),
            to: current.to_string(),
            trigger: trigger.to_string(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use narrative_core::Sentiment;

    fn hyps() -> Vec<Hypothesis> {
        ["A", "B", "C"]
            .iter()
            .zip([Sentiment::Bullish, Sentiment::Bearish, Sentiment::Neutral])
            .map(|(id, sentiment)| Hypothesis {
                id: id.to_string(),
                name: format!("Hypothesis {id}"),
                sentiment,
                survival_score: 0,
                rank: 0,
            })
            .collect()
    }

    #[test]
    fn test_ranks_descending() {
        assert_eq!(rank_hypotheses(&[22, 67, 11]), vec![2, 1, 3]);
    }

    #[test]
    fn test_ties_broken_by_declaration_order() {
        assert_eq!(rank_hypotheses(&[40, 40, 20]), vec![1, 2, 3]);
        assert_eq!(rank_hypotheses(&[20, 40, 40]), vec![3, 1, 2]);
        assert_eq!(rank_hypotheses(&[25, 25, 25, 25]), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_apply_scores_sets_single_dominant() {
        let mut h = hyps();
        let dominant = apply_scores(&mut h, &[22, 67, 11]);
        assert_eq!(dominant.as_deref(), Some("B"));
        assert_eq!(h.iter().filter(|x| x.rank == 1).count(), 1);
        assert_eq!(h[0].survival_score, 22);
    }

    #[test]
    fn test_flip_detection() {
        let flip = detect_flip(Some("A"), "B", "MATERIAL").unwrap();
        assert_eq!(flip.from, "A");
        assert_eq!(flip.to, "B");
        assert!(detect_flip(Some("B"), "B", "MATERIAL").is_none());
        assert!(detect_flip(None, "B", "MATERIAL").is_none());
    }

    #[test]
    fn test_trigger_text_precedence() {
        let event = DisclosureEvent {
            entity_id: "WOW".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 2, 20).unwrap(),
            summary: "1H25 result".to_string(),
        };
        assert_eq!(flip_trigger(Some(&event), MoveClass::Material), "1H25 result");
        assert_eq!(flip_trigger(None, MoveClass::Significant), "SIGNIFICANT");
        assert_eq!(flip_trigger(None, MoveClass::Noise), "score recalculation");
    }
}
