//! Ranking of scored listings and top-K selection

use crate::output::artifacts::ScoreEntry;

/// Number of listings carried into the match stage.
pub const TOP_K: usize = 5;

/// Sort by score, highest first. Equal scores keep the model's order.
pub fn rank(mut entries: Vec<ScoreEntry>) -> Vec<ScoreEntry> {
    // sort_by is stable
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries
}

/// The first `k` entries of an already ranked list, or all of them.
pub fn top_k(ranked: &[ScoreEntry], k: usize) -> &[ScoreEntry] {
    &ranked[..ranked.len().min(k)]
}
