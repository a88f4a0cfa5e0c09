//! Ranking of scored fingerprints

use crate::db::Fingerprint;
use crate::engine::ScoreBoard;
use osmatch_common::RankedMatch;

/// Share of `max_points` reached by `score`, in percent. Zero when nothing
/// can be scored at all.
#[inline]
#[must_use]
pub fn percent(score: u64, max_points: u64) -> f64 {
    if max_points == 0 {
        0.0
    } else {
        score as f64 / max_points as f64 * 100.0
    }
}

/// The `limit` best fingerprints, highest score first. Equal scores keep
/// database order.
#[must_use]
pub fn rank(
    fingerprints: &[Fingerprint],
    scores: &ScoreBoard,
    max_points: u64,
    limit: usize,
) -> Vec<RankedMatch> {
    let mut order: Vec<(usize, u64)> = scores
        .as_slice()
        .iter()
        .copied()
        .enumerate()
        .take(fingerprints.len())
        .collect();
    order.sort_by(|a, b| b.1.cmp(&a.1));

    order
        .into_iter()
        .take(limit)
        .map(|(index, score)| {
            let fp = &fingerprints[index];
            RankedMatch {
                name: fp.name.clone(),
                classes: fp.classes.clone(),
                cpe: fp.cpe.clone(),
                line: fp.line,
                score,
                percent: percent(score, max_points),
            }
        })
        .collect()
}
