use crate::models::{Direction, Snapshot, State};
use crate::study::Study;
use crate::utils::create_writer;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use struct_field_names_as_array::FieldNamesAsArray;

/// One review log joined with its card and note, as written to CSV.
#[derive(Debug, Serialize, FieldNamesAsArray)]
struct ReviewRow {
    id: u64,
    card_id: u64,
    word: String,
    direction: Option<Direction>,
    rating: u8,
    review_datetime: DateTime<Utc>,
    state: Option<State>,
    stability: Option<f64>,
    difficulty: Option<f64>,
    scheduled_days: Option<f64>,
}

/// Writes the review history to a CSV file for analysis elsewhere.
pub fn export(study: &Study, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let rows = write_review_logs(&study.snapshot()?, file)?;
    println!(
        "Exported {} review log{} to {:?}",
        rows,
        if rows == 1 { "" } else { "s" },
        path
    );
    Ok(())
}

/// Returns the number of rows written, not counting the header.
fn write_review_logs<W: Write>(snapshot: &Snapshot, out: W) -> Result<usize> {
    let mut writer = create_writer(out);
    writer.write_record(ReviewRow::FIELD_NAMES_AS_ARRAY)?;
    for log in &snapshot.review_logs {
        let card = snapshot.card(log.card_id);
        let note = card.and_then(|c| snapshot.note(c.note_id));
        writer.serialize(ReviewRow {
            id: log.id,
            card_id: log.card_id,
            word: note.map(|n| n.word.clone()).unwrap_or_default(),
            direction: card.map(|c| c.direction),
            rating: log.entry.rating.into(),
            review_datetime: log.entry.review_datetime,
            state: log.entry.state,
            stability: log.entry.stability,
            difficulty: log.entry.difficulty,
            scheduled_days: log.entry.scheduled_days,
        })?;
    }
    writer.flush()?;
    Ok(snapshot.review_logs.len())
}

#[test]
fn test_write_review_logs() {
    use crate::models::{Card, Note, Rating, ReviewEntry, ReviewLog};
    use chrono::TimeZone;
    use serde_json::json;

    let at = Utc.with_ymd_and_hms(2025, 9, 4, 18, 30, 0).unwrap();
    let snapshot = Snapshot {
        learning_notes: vec![Note {
            id: 1,
            word: String::from("casa"),
            translation: String::from("house"),
            sentence: String::new(),
            sentence_translation: String::new(),
            word_audio: String::new(),
            translation_audio: String::new(),
            sentence_audio: String::new(),
            sentence_translation_audio: String::new(),
            created_at: at,
        }],
        cards: vec![Card {
            id: 2,
            note_id: 1,
            direction: Direction::Reverse,
            scheduler_state: json!({}),
        }],
        review_logs: vec![
            ReviewLog {
                id: 1,
                card_id: 2,
                entry: ReviewEntry {
                    rating: Rating::Easy,
                    review_datetime: at,
                    previous_state: Some(State::New),
                    state: Some(State::Review),
                    stability: Some(8.5),
                    difficulty: Some(3.25),
                    elapsed_days: None,
                    scheduled_days: Some(8.0),
                },
            },
            ReviewLog {
                id: 2,
                card_id: 9,
                entry: ReviewEntry {
                    rating: Rating::Again,
                    review_datetime: at,
                    previous_state: None,
                    state: None,
                    stability: None,
                    difficulty: None,
                    elapsed_days: None,
                    scheduled_days: None,
                },
            },
        ],
    };

    let mut out = Vec::new();
    let rows = write_review_logs(&snapshot, &mut out).unwrap();
    assert_eq!(rows, 2);
    assert_eq!(
        String::from_utf8_lossy(&out),
        "id,card_id,word,direction,rating,review_datetime,state,stability,difficulty,scheduled_days\n\
    1,2,casa,reverse,4,2025-09-04T18:30:00Z,review,8.5,3.25,8.0\n\
    2,9,,,1,2025-09-04T18:30:00Z,,,,\n"
    );
}
