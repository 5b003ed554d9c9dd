// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weighted reciprocal rank fusion of a vector ranking and a keyword ranking.

use std::cmp::Reverse;
use std::collections::HashMap;

/// RRF constant from the original RRF paper.
pub const RRF_K: f32 = 60.0;

/// Resolution used to compare fused scores.
const SCORE_SCALE: f64 = 1e12;

/// Fuses two rankings of record ids.
///
/// Each list is ordered best first. An id contributes
/// `weight / (k + rank)` per list it appears in, with 1-based ranks; a list
/// that does not contain the id contributes nothing. Equal fused scores are
/// ordered by vector rank, then by id.
pub fn weighted_rrf(
    vector_ranked: &[i64],
    keyword_ranked: &[i64],
    vector_weight: f32,
    keyword_weight: f32,
    k: f32,
) -> Vec<(i64, f64)> {
    let k = f64::from(k);
    let mut scores: HashMap<i64, f64> = HashMap::new();

    for (rank, id) in vector_ranked.iter().enumerate() {
        *scores.entry(*id).or_default() += f64::from(vector_weight) / (k + rank as f64 + 1.0);
    }
    for (rank, id) in keyword_ranked.iter().enumerate() {
        *scores.entry(*id).or_default() += f64::from(keyword_weight) / (k + rank as f64 + 1.0);
    }

    let vector_position: HashMap<i64, usize> = vector_ranked
        .iter()
        .enumerate()
        .map(|(rank, id)| (*id, rank))
        .collect();

    let mut fused: Vec<(i64, f64)> = scores.into_iter().collect();
    fused.sort_by_key(|(id, score)| {
        (
            Reverse((score * SCORE_SCALE).round() as i64),
            vector_position.get(id).copied().unwrap_or(usize::MAX),
            *id,
        )
    });
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn item_in_both_lists_wins() {
        let fused = weighted_rrf(&[1, 2, 3], &[2, 4], 0.5, 0.5, RRF_K);
        assert_eq!(fused[0].0, 2);
        let expected = 0.5 / 62.0 + 0.5 / 61.0;
        assert!((fused[0].1 - expected).abs() < 1e-12);
    }

    #[test]
    fn missing_list_contributes_zero() {
        let fused = weighted_rrf(&[1], &[9], 0.7, 0.3, RRF_K);
        let by_id: HashMap<i64, f64> = fused.into_iter().collect();
        assert!((by_id[&1] - 0.7 / 61.0).abs() < 1e-6);
        assert!((by_id[&9] - 0.3 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn ties_prefer_vector_rank_then_id() {
        // 5 and 2 tie at w/(k+1).
        let fused = weighted_rrf(&[5, 1], &[2], 0.5, 0.5, RRF_K);
        let ids: Vec<i64> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![5, 2, 1]);

        let fused = weighted_rrf(&[], &[7, 3], 0.5, 0.5, RRF_K);
        assert_eq!(fused[0].0, 7);
    }

    #[test]
    fn empty_inputs() {
        assert!(weighted_rrf(&[], &[], 0.7, 0.3, RRF_K).is_empty());
    }

    fn rankings() -> impl Strategy<Value = (Vec<i64>, Vec<i64>)> {
        (2usize..20)
            .prop_flat_map(|n| {
                let ids: Vec<i64> = (0..n as i64).collect();
                (
                    Just(ids.clone()).prop_shuffle(),
                    Just(ids).prop_shuffle(),
                    0..=n,
                )
            })
            .prop_map(|(vector, keyword, keep)| (vector, keyword[..keep].to_vec()))
    }

    proptest! {
        #[test]
        fn raising_vector_weight_never_demotes_top_vector_item(
            (vector, keyword) in rankings(),
            low in 0.0f32..1.0,
            delta in 0.01f32..1.0,
            keyword_weight in 0.0f32..1.0,
        ) {
            let top = vector[0];
            let position = |weight: f32| {
                weighted_rrf(&vector, &keyword, weight, keyword_weight, RRF_K)
                    .iter()
                    .position(|(id, _)| *id == top)
            };
            let before = position(low);
            let after = position(low + delta);
            prop_assert!(after.is_some());
            prop_assert!(after <= before);
        }
    }
}
