use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// The persisted aggregate: every record the application knows about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub learning_notes: Vec<Note>,
    #[serde(default)]
    pub cards: Vec<Card>,
    #[serde(default)]
    pub review_logs: Vec<ReviewLog>,
}

impl Snapshot {
    pub fn note(&self, id: u64) -> Option<&Note> {
        self.learning_notes.iter().find(|n| n.id == id)
    }

    pub fn card(&self, id: u64) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }
}

/// Names of the three record collections inside a [`Snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    LearningNotes,
    Cards,
    ReviewLogs,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Collection::LearningNotes => "learning_notes",
            Collection::Cards => "cards",
            Collection::ReviewLogs => "review_logs",
        };
        f.write_str(name)
    }
}

/// A vocabulary item together with its example sentence and audio files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: u64,
    pub word: String,
    pub translation: String,
    /// May wrap the target word in `*` markers.
    pub sentence: String,
    pub sentence_translation: String,
    pub word_audio: String,
    pub translation_audio: String,
    pub sentence_audio: String,
    pub sentence_translation_audio: String,
    pub created_at: DateTime<Utc>,
}

/// What a learner types in before a note gets its ID and audio references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteDraft {
    pub word: String,
    pub translation: String,
    pub sentence: String,
    pub sentence_translation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

/// One review direction of a note. The scheduler state is kept as raw JSON
/// so that a single unreadable state never poisons the whole snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: u64,
    pub note_id: u64,
    pub direction: Direction,
    #[serde(alias = "fsrs_card")]
    pub scheduler_state: Value,
}

pub struct CardRef<'a> {
    pub front: &'a str,
    pub back: &'a str,
}

impl Card {
    /// Prompt and answer sides of this card for the given note.
    pub fn sides<'a>(&self, note: &'a Note) -> CardRef<'a> {
        match self.direction {
            Direction::Forward => CardRef {
                front: &note.word,
                back: &note.translation,
            },
            Direction::Reverse => CardRef {
                front: &note.translation,
                back: &note.word,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];
}

impl TryFrom<i64> for Rating {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            _ => Err(Error::InvalidRating(value)),
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rating::try_from(i64::from(value))
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating as u8
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Rating::Again => "Again",
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        };
        f.write_str(name)
    }
}

/// Written by name. Reading also accepts the integer codes of py-fsrs card
/// dicts, where 0 stands for New in releases that still had that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    New,
    Learning,
    Review,
    Relearning,
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u8),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(0) => Ok(State::New),
            Raw::Code(1) => Ok(State::Learning),
            Raw::Code(2) => Ok(State::Review),
            Raw::Code(3) => Ok(State::Relearning),
            Raw::Code(code) => Err(D::Error::custom(format!("unknown card state {}", code))),
            Raw::Name(name) => match name.as_str() {
                "new" => Ok(State::New),
                "learning" => Ok(State::Learning),
                "review" => Ok(State::Review),
                "relearning" => Ok(State::Relearning),
                _ => Err(D::Error::custom(format!("unknown card state {:?}", name))),
            },
        }
    }
}

/// Typed view of a card's scheduler state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardState {
    pub due: DateTime<Utc>,
    #[serde(default)]
    pub stability: Option<f64>,
    #[serde(default)]
    pub difficulty: Option<f64>,
    pub state: State,
    /// Position inside the learning or relearning step sequence.
    #[serde(default)]
    pub step: Option<usize>,
    #[serde(default)]
    pub last_review: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reps: u32,
    #[serde(default)]
    pub lapses: u32,
}

impl CardState {
    pub fn new(due: DateTime<Utc>) -> Self {
        Self {
            due,
            stability: None,
            difficulty: None,
            state: State::New,
            step: None,
            last_review: None,
            reps: 0,
            lapses: 0,
        }
    }
}

/// Fields a scheduler emits for one review event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub rating: Rating,
    pub review_datetime: DateTime<Utc>,
    #[serde(default)]
    pub previous_state: Option<State>,
    #[serde(default)]
    pub state: Option<State>,
    #[serde(default)]
    pub stability: Option<f64>,
    #[serde(default)]
    pub difficulty: Option<f64>,
    /// Days since the previous review, if there was one.
    #[serde(default)]
    pub elapsed_days: Option<f64>,
    /// Days from this review until the card is due again.
    #[serde(default)]
    pub scheduled_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLog {
    pub id: u64,
    pub card_id: u64,
    #[serde(flatten)]
    pub entry: ReviewEntry,
}

#[test]
fn test_rating_rejects_out_of_range() {
    assert!(matches!(Rating::try_from(0i64), Err(Error::InvalidRating(0))));
    assert!(matches!(Rating::try_from(5u8), Err(Error::InvalidRating(5))));
    assert_eq!(Rating::try_from(3i64).unwrap(), Rating::Good);
}

#[test]
fn test_card_accepts_legacy_state_key() {
    let card: Card = serde_json::from_str(
        r#"{"id": 1, "note_id": 1, "direction": "reverse", "fsrs_card": {"due": "2025-09-03T08:00:00+00:00"}}"#,
    )
    .unwrap();
    assert_eq!(card.direction, Direction::Reverse);
    assert_eq!(card.scheduler_state["due"], "2025-09-03T08:00:00+00:00");
}

#[test]
fn test_review_log_is_flat_on_disk() {
    let log: ReviewLog = serde_json::from_str(
        r#"{"id": 7, "card_id": 2, "rating": 3, "review_datetime": "2025-09-04T10:15:00Z"}"#,
    )
    .unwrap();
    assert_eq!(log.entry.rating, Rating::Good);
    assert_eq!(log.entry.state, None);

    let json = serde_json::to_value(&log).unwrap();
    assert_eq!(json["rating"], 3);
    assert_eq!(json["card_id"], 2);
}

#[test]
fn test_state_reads_names_and_integer_codes() {
    let states: Vec<State> =
        serde_json::from_str(r#"["review", 0, 1, 2, 3, "relearning"]"#).unwrap();
    assert_eq!(
        states,
        [State::Review, State::New, State::Learning, State::Review, State::Relearning, State::Relearning]
    );
    assert!(serde_json::from_str::<State>("4").is_err());
    assert!(serde_json::from_str::<State>(r#""Review""#).is_err());
    assert_eq!(serde_json::to_value(State::Learning).unwrap(), "learning");
}
