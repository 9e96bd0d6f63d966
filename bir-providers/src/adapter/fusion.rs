//! Combining per-segment results into a record-level verdict.

use crate::types::{BiometricType, MatchPolicy};
use bir_core::Bir;

/// AUTH: every segment matched (and there was at least one).
/// DEDUPE: at least one segment matched.
pub fn fuse(policy: MatchPolicy, decisions: &[bool]) -> bool {
    match policy {
        MatchPolicy::Auth => !decisions.is_empty() && decisions.iter().all(|d| *d),
        MatchPolicy::Dedupe => decisions.iter().any(|d| *d),
    }
}

/// Fuse each column of a sample-segment × gallery-record decision matrix.
pub fn fuse_columns(policy: MatchPolicy, rows: &[Vec<bool>], columns: usize) -> Vec<bool> {
    (0..columns)
        .map(|col| {
            let column: Vec<bool> = rows
                .iter()
                .map(|row| row.get(col).copied().unwrap_or(false))
                .collect();
            fuse(policy, &column)
        })
        .collect()
}

pub fn average(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Highest score, 0 for none.
pub fn best_score(scores: &[f64]) -> f64 {
    scores.iter().copied().fold(0.0, f64::max)
}

pub fn meets_threshold(score: f64, threshold: f64) -> bool {
    score >= threshold
}

/// Leaves of `segments` (depth-first) that declare `modality`.
pub fn segments_of(segments: &[Bir], modality: BiometricType) -> Vec<&Bir> {
    leaves(segments)
        .into_iter()
        .filter(|b| b.has_type(modality))
        .collect()
}

pub fn leaves(segments: &[Bir]) -> Vec<&Bir> {
    let mut out = Vec::new();
    for seg in segments {
        push_leaves(seg, &mut out);
    }
    out
}

fn push_leaves<'a>(bir: &'a Bir, out: &mut Vec<&'a Bir>) {
    if bir.is_leaf() {
        out.push(bir);
    } else {
        for child in &bir.birs {
            push_leaves(child, out);
        }
    }
}
