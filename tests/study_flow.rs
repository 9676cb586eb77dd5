use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use repaso::clock::FixedClock;
use repaso::models::{Direction, NoteDraft, Snapshot};
use repaso::scheduler::{Fsrs, SchedulerConfig, SchedulingAdapter};
use repaso::store::Store;
use repaso::study::Study;
use repaso::Error;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 3, 8, 0, 0).unwrap()
}

fn open(path: &std::path::Path, clock: Arc<FixedClock>) -> Study {
    let adapter = SchedulingAdapter::new(Fsrs::seeded(SchedulerConfig::default(), 1), clock);
    Study::new(Store::new(path), adapter).with_seed(1)
}

fn draft() -> NoteDraft {
    NoteDraft {
        word: String::from("manzana"),
        translation: String::from("apple"),
        sentence: String::from("Como una manzana."),
        sentence_translation: String::from("I eat an apple."),
    }
}

#[test]
fn empty_store_reads_as_empty_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path().join("nested").join("store.json"));
    assert_eq!(store.read().unwrap(), Snapshot::default());
    assert!(store.path().exists());
}

#[test]
fn written_snapshot_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let clock = Arc::new(FixedClock::at(now()));

    let study = open(&path, clock.clone());
    study.create_note(draft()).unwrap();
    study.record_review(2, 4).unwrap();
    let before = study.snapshot().unwrap();
    drop(study);

    let reopened = open(&path, clock);
    assert_eq!(reopened.snapshot().unwrap(), before);
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"learning_notes\""));
    assert!(raw.contains("\"review_logs\""));
}

#[test]
fn learning_session_over_a_few_days() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FixedClock::at(now()));
    let study = open(&dir.path().join("store.json"), clock.clone());

    let (note, [forward, reverse]) = study.create_note(draft()).unwrap();
    assert_eq!(note.sentence, "Como una *manzana*.");
    assert_eq!(forward.direction, Direction::Forward);
    assert_eq!(reverse.direction, Direction::Reverse);

    // An hour before creation nothing is due, an hour after both cards are
    assert!(study.get_next_due_card(now() - Duration::hours(1)).unwrap().is_none());
    let (card, _) = study.get_next_due_card(now() + Duration::hours(1)).unwrap().unwrap();
    assert_eq!(card.id, forward.id);

    for card_id in [forward.id, reverse.id] {
        study.record_review(card_id, 4).unwrap();
    }
    assert!(study.get_next_due_card(study.now()).unwrap().is_none());

    clock.advance(Duration::days(31));
    let (due, _) = study.get_next_due_card(study.now()).unwrap().unwrap();
    let snapshot = study.record_review(due.id, 3).unwrap();
    assert_eq!(snapshot.review_logs.len(), 3);
    assert_eq!(snapshot.review_logs[2].id, 3);

    assert!(matches!(study.record_review(due.id, 9), Err(Error::InvalidRating(9))));
    assert_eq!(study.snapshot().unwrap(), snapshot);
}

#[test]
fn concurrent_reviews_keep_every_log() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FixedClock::at(now()));
    let study = Arc::new(open(&dir.path().join("store.json"), clock));
    study.create_note(draft()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let study = Arc::clone(&study);
            std::thread::spawn(move || {
                for _ in 0..5 {
                    study.record_review(1 + i % 2, 3).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let ids: Vec<u64> = study.snapshot().unwrap().review_logs.iter().map(|l| l.id).collect();
    assert_eq!(ids, (1..=20).collect::<Vec<_>>());
}
