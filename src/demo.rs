//! A ready-made collection of Spanish nouns with a month of simulated study,
//! so that stats and review can be tried without typing anything in.

use crate::models::{NoteDraft, Snapshot};
use crate::sentence::{SentenceSource, TemplateSentences};
use crate::simulator::SimulationReport;
use crate::study::Study;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

pub const SPANISH_WORDS: [(&str, &str); 50] = [
    ("casa", "house"),
    ("perro", "dog"),
    ("gato", "cat"),
    ("libro", "book"),
    ("agua", "water"),
    ("mesa", "table"),
    ("silla", "chair"),
    ("ventana", "window"),
    ("puerta", "door"),
    ("coche", "car"),
    ("ciudad", "city"),
    ("calle", "street"),
    ("árbol", "tree"),
    ("flor", "flower"),
    ("sol", "sun"),
    ("luna", "moon"),
    ("estrella", "star"),
    ("mar", "sea"),
    ("río", "river"),
    ("montaña", "mountain"),
    ("pan", "bread"),
    ("leche", "milk"),
    ("queso", "cheese"),
    ("manzana", "apple"),
    ("naranja", "orange"),
    ("café", "coffee"),
    ("tiempo", "time"),
    ("día", "day"),
    ("noche", "night"),
    ("semana", "week"),
    ("año", "year"),
    ("amigo", "friend"),
    ("familia", "family"),
    ("madre", "mother"),
    ("padre", "father"),
    ("hermano", "brother"),
    ("niño", "child"),
    ("trabajo", "work"),
    ("escuela", "school"),
    ("maestro", "teacher"),
    ("pregunta", "question"),
    ("respuesta", "answer"),
    ("dinero", "money"),
    ("mano", "hand"),
    ("ojo", "eye"),
    ("corazón", "heart"),
    ("cabeza", "head"),
    ("camino", "path"),
    ("tierra", "earth"),
    ("fuego", "fire"),
];

/// Notes are created this far apart, starting at the window start.
const CREATION_GAP_MINUTES: i64 = 18;

/// Replaces the store contents with the demo notes, all created shortly
/// after `start`. Returns the number of notes.
pub fn populate(study: &Study, start: DateTime<Utc>) -> Result<usize> {
    study.store().write(&Snapshot::default())?;
    let no_known_words = BTreeSet::new();
    for (i, (word, translation)) in SPANISH_WORDS.iter().enumerate() {
        let generated = TemplateSentences.generate(word, translation, &no_known_words)?;
        let created_at = start + Duration::minutes(CREATION_GAP_MINUTES * i as i64);
        study.create_note_at(
            NoteDraft {
                word: word.to_string(),
                translation: translation.to_string(),
                sentence: generated.sentence,
                sentence_translation: generated.translation,
            },
            created_at,
        )?;
    }
    Ok(SPANISH_WORDS.len())
}

/// The demo window: thirty days from `start`, ending at 22:00 when `start`
/// is at 8:00.
pub fn window_end(start: DateTime<Utc>) -> DateTime<Utc> {
    start + Duration::days(30) + Duration::hours(14)
}

/// Fills the store with demo notes and simulated history. Refuses to touch a
/// store that already holds notes unless `force` is set.
pub fn demo(study: &Study, start: DateTime<Utc>, force: bool) -> Result<()> {
    let existing = study.snapshot()?.learning_notes.len();
    if existing > 0 && !force {
        return Err(anyhow!(
            "Store {:?} already holds {} notes. Use --force to replace them with demo data. Aborting.",
            study.store().path(),
            existing
        ));
    }
    let report = seed(study, start)?;
    println!("{}", report);
    println!("Demo store written to {:?}", study.store().path());
    Ok(())
}

fn seed(study: &Study, start: DateTime<Utc>) -> Result<SimulationReport> {
    populate(study, start)?;
    Ok(study.reset_history(Some(start), window_end(start))?)
}

#[test]
fn test_seed_builds_a_month_of_history() {
    use crate::sentence::emphasized_word;
    use crate::study::test_study;
    use chrono::TimeZone;

    let dir = tempfile::tempdir().unwrap();
    let start = Utc.with_ymd_and_hms(2025, 9, 3, 8, 0, 0).unwrap();
    let (study, _) = test_study(dir.path(), start + Duration::days(31));
    let report = seed(&study, start).unwrap();

    let snapshot = study.snapshot().unwrap();
    assert_eq!(snapshot.learning_notes.len(), 50);
    assert_eq!(snapshot.cards.len(), 100);
    assert_eq!(report.card_profiles.len(), 100);
    assert_eq!(snapshot.review_logs, report.logs);

    let last = &snapshot.learning_notes[49];
    assert_eq!(last.created_at, start + Duration::minutes(18 * 49));
    assert_eq!(emphasized_word(&last.sentence), Some("fuego"));

    let end = Utc.with_ymd_and_hms(2025, 10, 3, 22, 0, 0).unwrap();
    assert_eq!(window_end(start), end);
    for log in &snapshot.review_logs {
        assert!(log.entry.review_datetime >= start);
        assert!(log.entry.review_datetime <= end);
    }
}

#[test]
fn test_demo_keeps_existing_notes_without_force() {
    use crate::study::test_study;
    use chrono::TimeZone;

    let dir = tempfile::tempdir().unwrap();
    let start = Utc.with_ymd_and_hms(2025, 9, 3, 8, 0, 0).unwrap();
    let (study, _) = test_study(dir.path(), start);
    populate(&study, start).unwrap();
    let before = study.snapshot().unwrap();

    assert!(demo(&study, start, false).is_err());
    assert_eq!(study.snapshot().unwrap(), before);
}
