//! Picks vocabulary the learner already commands, so that new example
//! sentences can be built mostly from familiar words.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use log::debug;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::models::{Card, Snapshot};
use crate::scheduler::SchedulingAdapter;

pub const DEFAULT_TOP_FRACTION: f64 = 0.10;
pub const DEFAULT_MAX_WORDS: usize = 20;

/// Cards paired with their mastery score, best first. Cards whose state
/// cannot be scored are left out.
pub fn rank_by_mastery<'a>(
    snapshot: &'a Snapshot,
    adapter: &SchedulingAdapter,
    at: DateTime<Utc>,
) -> Vec<(&'a Card, f64)> {
    let mut ranked: Vec<(&Card, f64)> = snapshot
        .cards
        .iter()
        .filter_map(|card| match adapter.mastery_score_at(&card.scheduler_state, at) {
            Ok(score) => Some((card, score)),
            Err(e) => {
                debug!("Not ranking card {}: {}", card.id, e);
                None
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Distinct words of the notes behind the top `top_fraction` of cards by
/// mastery, reduced to a random `max_words` of them if there are more.
pub fn sample_known_words<R>(
    snapshot: &Snapshot,
    adapter: &SchedulingAdapter,
    top_fraction: f64,
    max_words: usize,
    at: DateTime<Utc>,
    rng: &mut R,
) -> BTreeSet<String>
where
    R: Rng + ?Sized,
{
    let ranked = rank_by_mastery(snapshot, adapter, at);
    if ranked.is_empty() {
        return BTreeSet::new();
    }
    let fraction = top_fraction.clamp(0.0, 1.0);
    let take = ((fraction * ranked.len() as f64).ceil() as usize).clamp(1, ranked.len());

    let words: BTreeSet<String> = ranked[..take]
        .iter()
        .filter_map(|(card, _)| snapshot.note(card.note_id))
        .map(|note| note.word.clone())
        .collect();
    if words.len() <= max_words {
        return words;
    }
    let pool: Vec<String> = words.into_iter().collect();
    pool.choose_multiple(rng, max_words).cloned().collect()
}
