use chrono::{DateTime, Utc};
use log::debug;

use crate::models::{Card, Note, Snapshot};
use crate::scheduler::SchedulingAdapter;

/// Cards due at `now` together with their due time. Cards whose state cannot
/// be read are left out.
pub fn collect_due_cards<'a>(
    snapshot: &'a Snapshot,
    adapter: &SchedulingAdapter,
    now: DateTime<Utc>,
) -> Vec<(&'a Card, DateTime<Utc>)> {
    snapshot
        .cards
        .iter()
        .filter_map(|card| match adapter.due(&card.scheduler_state) {
            Ok(due) => Some((card, due)),
            Err(e) => {
                debug!("Skipping card {}: {}", card.id, e);
                None
            }
        })
        .filter(|(_, due)| *due <= now)
        .collect()
}

/// The due card with the earliest due time, joined with its note.
///
/// Returns `None` when nothing is due or when that card's note is missing.
pub fn next_due(
    snapshot: &Snapshot,
    adapter: &SchedulingAdapter,
    now: DateTime<Utc>,
) -> Option<(Card, Note)> {
    let (card, _) = collect_due_cards(snapshot, adapter, now)
        .into_iter()
        .min_by_key(|(_, due)| *due)?;
    match snapshot.note(card.note_id) {
        Some(note) => Some((card.clone(), note.clone())),
        None => {
            debug!("Card {} points at missing note {}", card.id, card.note_id);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::Direction;
    use crate::scheduler::{Fsrs, SchedulerConfig};
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap()
    }

    fn adapter() -> SchedulingAdapter {
        SchedulingAdapter::new(
            Fsrs::seeded(SchedulerConfig::default(), 3),
            Arc::new(FixedClock::at(now())),
        )
    }

    fn note(id: u64) -> Note {
        Note {
            id,
            word: format!("word{}", id),
            translation: format!("translation{}", id),
            sentence: String::new(),
            sentence_translation: String::new(),
            word_audio: String::new(),
            translation_audio: String::new(),
            sentence_audio: String::new(),
            sentence_translation_audio: String::new(),
            created_at: now() - Duration::days(3),
        }
    }

    fn card(id: u64, note_id: u64, due: DateTime<Utc>) -> Card {
        Card {
            id,
            note_id,
            direction: Direction::Forward,
            scheduler_state: json!({"due": due, "state": "review", "stability": 2.0, "difficulty": 5.0}),
        }
    }

    #[test]
    fn test_past_due_is_returned_and_future_is_not() {
        let adapter = adapter();
        let mut snapshot = Snapshot {
            learning_notes: vec![note(1)],
            cards: vec![card(1, 1, now() + Duration::hours(1))],
            ..Snapshot::default()
        };
        assert!(next_due(&snapshot, &adapter, now()).is_none());

        snapshot.cards.push(card(2, 1, now() - Duration::hours(1)));
        let (card, note) = next_due(&snapshot, &adapter, now()).unwrap();
        assert_eq!(card.id, 2);
        assert_eq!(note.id, 1);
    }

    #[test]
    fn test_earliest_due_wins_and_malformed_cards_are_skipped() {
        let adapter = adapter();
        let mut broken = card(9, 1, now());
        broken.scheduler_state = json!({"due": 17});
        let snapshot = Snapshot {
            learning_notes: vec![note(1), note(2)],
            cards: vec![
                broken,
                card(1, 1, now() - Duration::hours(2)),
                card(2, 2, now() - Duration::days(2)),
                card(3, 1, now()),
            ],
            ..Snapshot::default()
        };
        let (card, note) = next_due(&snapshot, &adapter, now()).unwrap();
        assert_eq!(card.id, 2);
        assert_eq!(note.id, 2);
        assert_eq!(collect_due_cards(&snapshot, &adapter, now()).len(), 3);
    }

    #[test]
    fn test_dangling_note_means_nothing_to_show() {
        let adapter = adapter();
        let snapshot = Snapshot {
            learning_notes: vec![note(1)],
            cards: vec![card(1, 42, now() - Duration::days(1))],
            ..Snapshot::default()
        };
        assert!(next_due(&snapshot, &adapter, now()).is_none());
    }
}
