//! Spaced repetition scheduling.
//!
//! [`Scheduler`] is the pluggable capability that owns the interval math.
//! [`SchedulingAdapter`] is the only place that converts between the raw
//! JSON state stored on a card and the typed [`CardState`].

pub mod fsrs;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::models::{CardState, Rating, ReviewEntry};

pub use fsrs::Fsrs;

pub trait Scheduler: Send + Sync {
    /// State of a card nobody has reviewed yet, due at `at`.
    fn new_state(&self, at: DateTime<Utc>) -> CardState;

    /// Applies one review that happened at `at`.
    fn apply(&self, state: &CardState, rating: Rating, at: DateTime<Utc>) -> (CardState, ReviewEntry);

    /// Probability of recalling the card at `at`, in `[0, 1]`.
    fn retrievability(&self, state: &CardState, at: DateTime<Utc>) -> f64;
}

/// Knobs fixed when a scheduler is built. The defaults favour short cycles
/// suited to a study window of a few weeks.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub desired_retention: f64,
    /// Shortest review interval in days once a card has graduated.
    pub minimum_interval: u32,
    /// Longest review interval in days.
    pub maximum_interval: u32,
    pub learning_steps: Vec<Duration>,
    pub relearning_steps: Vec<Duration>,
    pub enable_fuzzing: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            desired_retention: 0.9,
            minimum_interval: 1,
            maximum_interval: 30,
            learning_steps: vec![Duration::minutes(1), Duration::minutes(10)],
            relearning_steps: vec![Duration::minutes(10)],
            enable_fuzzing: true,
        }
    }
}

pub struct SchedulingAdapter {
    scheduler: Box<dyn Scheduler>,
    clock: Arc<dyn Clock>,
}

impl SchedulingAdapter {
    pub fn new(scheduler: impl Scheduler + 'static, clock: Arc<dyn Clock>) -> Self {
        Self {
            scheduler: Box::new(scheduler),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn decode(&self, raw: &Value) -> Result<CardState> {
        CardState::deserialize(raw).map_err(|e| Error::MalformedCardState {
            reason: e.to_string(),
        })
    }

    pub fn encode(&self, state: &CardState) -> Result<Value> {
        Ok(serde_json::to_value(state)?)
    }

    pub fn new_card_state(&self, at: Option<DateTime<Utc>>) -> Result<Value> {
        let at = at.unwrap_or_else(|| self.now());
        self.encode(&self.scheduler.new_state(at))
    }

    /// Applies a review. When `at` is given the review is computed as if it
    /// happened at that instant, which is what backdated history needs.
    pub fn apply_review(
        &self,
        raw: &Value,
        rating: i64,
        at: Option<DateTime<Utc>>,
    ) -> Result<(Value, ReviewEntry)> {
        let rating = Rating::try_from(rating)?;
        let state = self.decode(raw)?;
        let at = at.unwrap_or_else(|| self.now());
        let (next, entry) = self.scheduler.apply(&state, rating, at);
        Ok((self.encode(&next)?, entry))
    }

    pub fn retrievability(&self, raw: &Value, at: Option<DateTime<Utc>>) -> Result<f64> {
        let state = self.decode(raw)?;
        let at = at.unwrap_or_else(|| self.now());
        Ok(self.scheduler.retrievability(&state, at).clamp(0.0, 1.0))
    }

    /// `retrievability × stability`. Only meaningful for ranking cards
    /// against each other.
    pub fn mastery_score(&self, raw: &Value) -> Result<f64> {
        self.mastery_score_at(raw, self.now())
    }

    pub fn mastery_score_at(&self, raw: &Value, at: DateTime<Utc>) -> Result<f64> {
        let state = self.decode(raw)?;
        let retrievability = self.scheduler.retrievability(&state, at).clamp(0.0, 1.0);
        Ok(retrievability * state.stability.unwrap_or(0.0))
    }

    pub fn due(&self, raw: &Value) -> Result<DateTime<Utc>> {
        Ok(self.decode(raw)?.due)
    }

    pub fn is_due(&self, raw: &Value, at: Option<DateTime<Utc>>) -> Result<bool> {
        let at = at.unwrap_or_else(|| self.now());
        Ok(self.due(raw)? <= at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;
    use serde_json::json;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 3, 8, 0, 0).unwrap()
    }

    fn adapter() -> SchedulingAdapter {
        let config = SchedulerConfig {
            enable_fuzzing: false,
            ..SchedulerConfig::default()
        };
        SchedulingAdapter::new(Fsrs::seeded(config, 7), Arc::new(FixedClock::at(start())))
    }

    #[test]
    fn test_invalid_rating_is_rejected_before_state_is_read() {
        let adapter = adapter();
        for rating in [0, 5, -1, 42] {
            let result = adapter.apply_review(&json!("garbage"), rating, None);
            assert!(matches!(result, Err(Error::InvalidRating(r)) if r == rating));
        }
    }

    #[test]
    fn test_malformed_state_is_reported() {
        let adapter = adapter();
        let result = adapter.apply_review(&json!({"due": "yesterday"}), 3, None);
        assert!(matches!(result, Err(Error::MalformedCardState { .. })));
        assert!(matches!(
            adapter.mastery_score(&json!(null)),
            Err(Error::MalformedCardState { .. })
        ));
    }

    #[test]
    fn test_new_state_is_due_immediately() {
        let adapter = adapter();
        let raw = adapter.new_card_state(None).unwrap();
        assert_eq!(adapter.due(&raw).unwrap(), start());
        assert!(adapter.is_due(&raw, None).unwrap());
        assert!(!adapter.is_due(&raw, Some(start() - Duration::seconds(1))).unwrap());
        assert_eq!(adapter.mastery_score(&raw).unwrap(), 0.0);
        assert_eq!(adapter.retrievability(&raw, None).unwrap(), 0.0);
    }

    #[test]
    fn test_explicit_timestamp_drives_the_review() {
        let adapter = adapter();
        let raw = adapter.new_card_state(Some(start())).unwrap();
        let past = start() - Duration::days(20);
        let (next, entry) = adapter.apply_review(&raw, 4, Some(past)).unwrap();
        assert_eq!(entry.review_datetime, past);
        let state = adapter.decode(&next).unwrap();
        assert_eq!(state.last_review, Some(past));
        assert_eq!(state.due, past + Duration::days(16));
    }

    #[test]
    fn test_mastery_combines_recall_and_stability() {
        let adapter = adapter();
        let raw = adapter.new_card_state(None).unwrap();
        let (easy, _) = adapter.apply_review(&raw, 4, None).unwrap();
        let (hard, _) = adapter.apply_review(&raw, 2, None).unwrap();
        let easy_score = adapter.mastery_score(&easy).unwrap();
        let hard_score = adapter.mastery_score(&hard).unwrap();
        assert!(easy_score > hard_score);
        assert!(hard_score > 0.0);
    }

    #[test]
    fn test_py_fsrs_card_dicts_are_read() {
        use crate::models::State;

        let adapter = adapter();
        let learning = json!({
            "card_id": 1756886400123u64,
            "state": 1,
            "step": 0,
            "stability": null,
            "difficulty": null,
            "due": "2025-09-03T07:55:00.123456+00:00",
            "last_review": null,
        });
        let state = adapter.decode(&learning).unwrap();
        assert_eq!(state.state, State::Learning);
        assert_eq!(state.step, Some(0));
        assert!(adapter.is_due(&learning, None).unwrap());
        let (next, entry) = adapter.apply_review(&learning, 3, None).unwrap();
        assert_eq!(entry.previous_state, Some(State::Learning));
        let next = adapter.decode(&next).unwrap();
        assert_eq!(next.last_review, Some(start()));
        assert!(next.due > start());

        let review = json!({
            "card_id": 1756886400456u64,
            "state": 2,
            "step": null,
            "stability": 12.5,
            "difficulty": 5.3,
            "due": "2025-09-05T08:00:00+00:00",
            "last_review": "2025-08-24T08:00:00+00:00",
        });
        assert_eq!(adapter.decode(&review).unwrap().state, State::Review);
        let recall = adapter.retrievability(&review, None).unwrap();
        assert!(recall > 0.0 && recall < 1.0);
        assert!(adapter.mastery_score(&review).unwrap() > 0.0);

        let mut unknown = review.clone();
        unknown["state"] = json!(7);
        assert!(matches!(adapter.decode(&unknown), Err(Error::MalformedCardState { .. })));
    }
}
