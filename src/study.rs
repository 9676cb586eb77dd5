//! Operations offered to front ends: note creation, the review loop, known
//! word sampling and history simulation. Every read-modify-write runs inside
//! one store transaction.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::due::next_due;
use crate::error::{Error, Result};
use crate::known_words::{self, DEFAULT_MAX_WORDS, DEFAULT_TOP_FRACTION};
use crate::models::{Card, Collection, Direction, Note, NoteDraft, Rating, ReviewLog, Snapshot};
use crate::scheduler::SchedulingAdapter;
use crate::sentence::{emphasize, SentenceSource};
use crate::simulator::{SimulationReport, Simulator};
use crate::store::{next_id, Store};

/// Window used when history is simulated without any note to start from.
const DEFAULT_WINDOW_DAYS: i64 = 30;

pub struct Study {
    store: Store,
    adapter: SchedulingAdapter,
    rng: Mutex<StdRng>,
}

impl Study {
    pub fn new(store: Store, adapter: SchedulingAdapter) -> Self {
        Self {
            store,
            adapter,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Makes word sampling and simulation reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn adapter(&self) -> &SchedulingAdapter {
        &self.adapter
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.adapter.now()
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        self.store.read()
    }

    /// Stores a note created now, plus its forward and reverse cards.
    pub fn create_note(&self, draft: NoteDraft) -> Result<(Note, [Card; 2])> {
        self.create_note_at(draft, self.now())
    }

    /// Stores a note created at `created_at`. Both cards start fresh and are
    /// due at that instant.
    pub fn create_note_at(&self, draft: NoteDraft, created_at: DateTime<Utc>) -> Result<(Note, [Card; 2])> {
        self.store.transaction(|snapshot| {
            let id = next_id(snapshot, Collection::LearningNotes);
            let note = Note {
                id,
                sentence: emphasize(&draft.sentence, &draft.word),
                word: draft.word,
                translation: draft.translation,
                sentence_translation: draft.sentence_translation,
                word_audio: format!("word_{}.mp3", id),
                translation_audio: format!("translation_{}.mp3", id),
                sentence_audio: format!("sentence_{}.mp3", id),
                sentence_translation_audio: format!("sentence_translation_{}.mp3", id),
                created_at,
            };
            snapshot.learning_notes.push(note.clone());

            let forward = self.push_card(snapshot, id, Direction::Forward, created_at)?;
            let reverse = self.push_card(snapshot, id, Direction::Reverse, created_at)?;
            debug!("Created note {} ({}) with cards {} and {}", id, note.word, forward.id, reverse.id);
            Ok((note, [forward, reverse]))
        })
    }

    fn push_card(
        &self,
        snapshot: &mut Snapshot,
        note_id: u64,
        direction: Direction,
        created_at: DateTime<Utc>,
    ) -> Result<Card> {
        let card = Card {
            id: next_id(snapshot, Collection::Cards),
            note_id,
            direction,
            scheduler_state: self.adapter.new_card_state(Some(created_at))?,
        };
        snapshot.cards.push(card.clone());
        Ok(card)
    }

    /// Asks `source` for an example sentence built around known words, then
    /// stores the note.
    pub fn compose_note(
        &self,
        word: &str,
        translation: &str,
        source: &dyn SentenceSource,
    ) -> Result<(Note, [Card; 2])> {
        let known = self.sample_known_words(DEFAULT_TOP_FRACTION, DEFAULT_MAX_WORDS)?;
        let generated = source.generate(word, translation, &known)?;
        self.create_note(NoteDraft {
            word: word.to_string(),
            translation: translation.to_string(),
            sentence: generated.sentence,
            sentence_translation: generated.translation,
        })
    }

    pub fn get_next_due_card(&self, now: DateTime<Utc>) -> Result<Option<(Card, Note)>> {
        let snapshot = self.store.read()?;
        Ok(next_due(&snapshot, &self.adapter, now))
    }

    /// Applies a rating to a card right now and appends the review log.
    ///
    /// The rating is checked before the store is touched.
    pub fn record_review(&self, card_id: u64, rating: i64) -> Result<Snapshot> {
        let rating = Rating::try_from(rating)?;
        self.store.transaction(|snapshot| {
            let log_id = next_id(snapshot, Collection::ReviewLogs);
            let card = snapshot
                .cards
                .iter_mut()
                .find(|c| c.id == card_id)
                .ok_or(Error::NotFound { kind: "card", id: card_id })?;
            let (state, entry) =
                self.adapter
                    .apply_review(&card.scheduler_state, i64::from(u8::from(rating)), None)?;
            card.scheduler_state = state;
            snapshot.review_logs.push(ReviewLog {
                id: log_id,
                card_id,
                entry,
            });
            Ok(snapshot.clone())
        })
    }

    pub fn sample_known_words(&self, top_fraction: f64, max_words: usize) -> Result<BTreeSet<String>> {
        let snapshot = self.store.read()?;
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(known_words::sample_known_words(
            &snapshot,
            &self.adapter,
            top_fraction,
            max_words,
            self.now(),
            &mut *rng,
        ))
    }

    /// Simulated review logs for `cards`, numbered after the stored logs.
    /// The cards' states are advanced in place; nothing is persisted.
    pub fn run_history_simulation(
        &self,
        cards: &mut [Card],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ReviewLog>> {
        let snapshot = self.store.read()?;
        let report = self.simulate(cards, start, end, next_id(&snapshot, Collection::ReviewLogs))?;
        info!("{}", report);
        Ok(report.logs)
    }

    /// Throws away all review history and simulates a new one.
    ///
    /// Every card restarts fresh, due when its note was created. The window
    /// starts at `start`, or at the earliest note creation when omitted.
    pub fn reset_history(&self, start: Option<DateTime<Utc>>, end: DateTime<Utc>) -> Result<SimulationReport> {
        self.store.transaction(|snapshot| {
            let start = start
                .or_else(|| snapshot.learning_notes.iter().map(|n| n.created_at).min())
                .unwrap_or(end - Duration::days(DEFAULT_WINDOW_DAYS));

            let Snapshot {
                learning_notes,
                cards,
                review_logs,
            } = snapshot;
            for card in cards.iter_mut() {
                match learning_notes.iter().find(|n| n.id == card.note_id) {
                    Some(note) => {
                        card.scheduler_state = self.adapter.new_card_state(Some(note.created_at))?;
                    }
                    None => debug!("Card {} has no note, keeping its state", card.id),
                }
            }
            let report = self.simulate(cards, start, end, 1)?;
            *review_logs = report.logs.clone();
            info!("{}", report);
            Ok(report)
        })
    }

    fn simulate(
        &self,
        cards: &mut [Card],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        first_log_id: u64,
    ) -> Result<SimulationReport> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Simulator::new(&self.adapter, &mut *rng).run(cards, start, end, first_log_id)
    }
}

/// A study over a fresh store in `dir`, driven by a clock fixed at `now`.
/// Fuzzing is off so intervals are exact.
#[cfg(test)]
pub(crate) fn test_study(
    dir: &std::path::Path,
    now: DateTime<Utc>,
) -> (Study, std::sync::Arc<crate::clock::FixedClock>) {
    use crate::clock::FixedClock;
    use crate::scheduler::{Fsrs, SchedulerConfig};
    use std::sync::Arc;

    let clock = Arc::new(FixedClock::at(now));
    let config = SchedulerConfig {
        enable_fuzzing: false,
        ..SchedulerConfig::default()
    };
    let adapter = SchedulingAdapter::new(Fsrs::seeded(config, 11), clock.clone());
    let study = Study::new(Store::new(dir.join("store.json")), adapter).with_seed(11);
    (study, clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::State;
    use crate::sentence::{emphasized_word, TemplateSentences};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 3, 8, 0, 0).unwrap()
    }

    fn draft(word: &str, translation: &str) -> NoteDraft {
        NoteDraft {
            word: word.to_string(),
            translation: translation.to_string(),
            sentence: format!("Veo el {} aquí.", word),
            sentence_translation: format!("I see the {} here.", translation),
        }
    }

    #[test]
    fn test_create_note_adds_both_directions() {
        let dir = tempfile::tempdir().unwrap();
        let (study, _) = test_study(dir.path(), now());
        let (note, [forward, reverse]) = study.create_note(draft("perro", "dog")).unwrap();

        assert_eq!(note.id, 1);
        assert_eq!(note.sentence, "Veo el *perro* aquí.");
        assert_eq!(note.word_audio, "word_1.mp3");
        assert_eq!(note.sentence_translation_audio, "sentence_translation_1.mp3");
        assert_eq!((forward.id, forward.direction), (1, Direction::Forward));
        assert_eq!((reverse.id, reverse.direction), (2, Direction::Reverse));

        let snapshot = study.snapshot().unwrap();
        assert_eq!(snapshot.learning_notes, vec![note]);
        assert_eq!(snapshot.cards.len(), 2);
        for card in &snapshot.cards {
            assert_eq!(card.note_id, 1);
            assert_eq!(study.adapter().due(&card.scheduler_state).unwrap(), now());
        }
    }

    #[test]
    fn test_record_review_appends_a_log_and_moves_due() {
        let dir = tempfile::tempdir().unwrap();
        let (study, _) = test_study(dir.path(), now());
        study.create_note(draft("gato", "cat")).unwrap();

        let snapshot = study.record_review(1, 3).unwrap();
        assert_eq!(snapshot.review_logs.len(), 1);
        let log = &snapshot.review_logs[0];
        assert_eq!((log.id, log.card_id), (1, 1));
        assert_eq!(log.entry.rating, Rating::Good);
        assert_eq!(log.entry.review_datetime, now());

        let state = study
            .adapter()
            .decode(&snapshot.card(1).unwrap().scheduler_state)
            .unwrap();
        assert!(state.due > now());
        assert_eq!(state.state, State::Learning);
        assert_eq!(study.snapshot().unwrap(), snapshot);
    }

    #[test]
    fn test_invalid_rating_or_unknown_card_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let (study, _) = test_study(dir.path(), now());
        study.create_note(draft("gato", "cat")).unwrap();
        let before = study.snapshot().unwrap();

        assert!(matches!(study.record_review(1, 5), Err(Error::InvalidRating(5))));
        assert!(matches!(study.record_review(1, 0), Err(Error::InvalidRating(0))));
        assert!(matches!(
            study.record_review(99, 3),
            Err(Error::NotFound { kind: "card", id: 99 })
        ));
        assert_eq!(study.snapshot().unwrap(), before);
    }

    #[test]
    fn test_next_due_card_respects_the_clock() {
        let dir = tempfile::tempdir().unwrap();
        let (study, clock) = test_study(dir.path(), now());
        assert!(study.get_next_due_card(now()).unwrap().is_none());

        study.create_note(draft("sol", "sun")).unwrap();
        let (card, note) = study.get_next_due_card(now()).unwrap().unwrap();
        assert_eq!((card.id, note.word.as_str()), (1, "sol"));
        assert!(study.get_next_due_card(now() - Duration::hours(1)).unwrap().is_none());

        study.record_review(1, 3).unwrap();
        study.record_review(2, 3).unwrap();
        assert!(study.get_next_due_card(study.now()).unwrap().is_none());
        clock.advance(Duration::minutes(10));
        assert!(study.get_next_due_card(study.now()).unwrap().is_some());
    }

    #[test]
    fn test_compose_note_uses_the_sentence_source() {
        let dir = tempfile::tempdir().unwrap();
        let (study, _) = test_study(dir.path(), now());
        let (note, _) = study.compose_note("luna", "moon", &TemplateSentences).unwrap();
        assert_eq!(emphasized_word(&note.sentence), Some("luna"));
        assert_eq!(note.sentence_translation, "The moon is important.");
    }

    #[test]
    fn test_sample_known_words_prefers_reviewed_notes() {
        let dir = tempfile::tempdir().unwrap();
        let (study, _) = test_study(dir.path(), now());
        assert!(study.sample_known_words(0.1, 20).unwrap().is_empty());

        for (word, translation) in [("uno", "one"), ("dos", "two"), ("tres", "three")] {
            study.create_note(draft(word, translation)).unwrap();
        }
        // Card 3 is the forward card of "dos".
        study.record_review(3, 4).unwrap();
        let words = study.sample_known_words(0.1, 20).unwrap();
        assert_eq!(words.into_iter().collect::<Vec<_>>(), vec!["dos".to_string()]);
    }

    #[test]
    fn test_run_history_simulation_does_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let (study, _) = test_study(dir.path(), now());
        study.create_note(draft("pan", "bread")).unwrap();
        let mut cards = study.snapshot().unwrap().cards;

        let logs = study
            .run_history_simulation(&mut cards, now(), now() + Duration::days(30))
            .unwrap();
        assert!(!logs.is_empty());
        assert_eq!(logs[0].id, 1);
        assert!(study.snapshot().unwrap().review_logs.is_empty());
        assert_ne!(cards, study.snapshot().unwrap().cards);
    }

    #[test]
    fn test_reset_history_replaces_logs() {
        let dir = tempfile::tempdir().unwrap();
        let (study, _) = test_study(dir.path(), now());
        for (i, (word, translation)) in [("mar", "sea"), ("río", "river")].into_iter().enumerate() {
            let created = now() + Duration::minutes(18 * i as i64);
            study.create_note_at(draft(word, translation), created).unwrap();
        }
        study.record_review(1, 1).unwrap();

        let end = now() + Duration::days(30);
        let report = study.reset_history(None, end).unwrap();
        let snapshot = study.snapshot().unwrap();
        assert_eq!(snapshot.review_logs, report.logs);
        assert_eq!(report.card_profiles.len(), 2);
        for (i, log) in snapshot.review_logs.iter().enumerate() {
            assert_eq!(log.id, i as u64 + 1);
            assert!(log.entry.review_datetime >= now());
            assert!(log.entry.review_datetime <= end);
        }
        assert!(matches!(
            study.reset_history(Some(end), now()),
            Err(Error::InvalidWindow { .. })
        ));
        assert_eq!(study.snapshot().unwrap(), snapshot);
    }
}
