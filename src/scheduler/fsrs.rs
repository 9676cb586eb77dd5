//! FSRS-style scheduler.
//!
//! Memory is modelled by stability `S` (days until recall drops to 90%) and
//! difficulty `D` in `[1, 10]`. Recall probability follows the power curve
//! `R(t) = (1 + FACTOR * t / S) ^ DECAY`.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Scheduler, SchedulerConfig};
use crate::models::{CardState, Rating, ReviewEntry, State};

const DEFAULT_WEIGHTS: [f64; 19] = [
    0.40255, 1.18385, 3.173, 15.69105, 7.1949, 0.5345, 1.4604, 0.0046, 1.54575, 0.1192, 1.01925,
    1.9395, 0.11, 0.29605, 2.2698, 0.2315, 2.9898, 0.51655, 0.6621,
];

const DECAY: f64 = -0.5;
/// Chosen so that `R(S) = 0.9`: `0.9 ^ (1 / DECAY) - 1`.
const FACTOR: f64 = 19.0 / 81.0;
const STABILITY_MIN: f64 = 0.001;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// (start, end, factor) bands for interval fuzz, in days.
const FUZZ_RANGES: [(f64, f64, f64); 3] = [
    (2.5, 7.0, 0.15),
    (7.0, 20.0, 0.1),
    (20.0, f64::INFINITY, 0.05),
];

pub struct Fsrs {
    config: SchedulerConfig,
    w: [f64; 19],
    rng: Mutex<StdRng>,
}

impl Fsrs {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Same configuration, reproducible fuzz.
    pub fn seeded(config: SchedulerConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SchedulerConfig, rng: StdRng) -> Self {
        Self {
            config,
            w: DEFAULT_WEIGHTS,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn initial_stability(&self, rating: Rating) -> f64 {
        self.w[rating as usize - 1].max(STABILITY_MIN)
    }

    fn initial_difficulty(&self, rating: Rating) -> f64 {
        let grade = f64::from(rating as u8);
        (self.w[4] - (self.w[5] * (grade - 1.0)).exp() + 1.0).clamp(1.0, 10.0)
    }

    fn next_difficulty(&self, difficulty: f64, rating: Rating) -> f64 {
        let grade = f64::from(rating as u8);
        let delta = -self.w[6] * (grade - 3.0);
        // Linear damping: steps shrink as difficulty approaches 10.
        let damped = difficulty + (10.0 - difficulty) * delta / 9.0;
        // Mean reversion towards the difficulty of an "Easy" first answer.
        let reverted = self.w[7] * self.initial_difficulty(Rating::Easy) + (1.0 - self.w[7]) * damped;
        reverted.clamp(1.0, 10.0)
    }

    fn short_term_stability(&self, stability: f64, rating: Rating) -> f64 {
        let grade = f64::from(rating as u8);
        (stability * (self.w[17] * (grade - 3.0 + self.w[18])).exp()).max(STABILITY_MIN)
    }

    fn recall_stability(&self, difficulty: f64, stability: f64, retrievability: f64, rating: Rating) -> f64 {
        let hard_penalty = if rating == Rating::Hard { self.w[15] } else { 1.0 };
        let easy_bonus = if rating == Rating::Easy { self.w[16] } else { 1.0 };
        let growth = self.w[8].exp()
            * (11.0 - difficulty)
            * stability.powf(-self.w[9])
            * (((1.0 - retrievability) * self.w[10]).exp() - 1.0)
            * hard_penalty
            * easy_bonus;
        (stability * (1.0 + growth)).max(STABILITY_MIN)
    }

    fn forget_stability(&self, difficulty: f64, stability: f64, retrievability: f64) -> f64 {
        let long_term = self.w[11]
            * difficulty.powf(-self.w[12])
            * ((stability + 1.0).powf(self.w[13]) - 1.0)
            * ((1.0 - retrievability) * self.w[14]).exp();
        let short_term = stability / (self.w[17] * self.w[18]).exp();
        long_term.min(short_term).max(STABILITY_MIN)
    }

    /// Whole days until recall is expected to drop to the desired retention.
    fn next_interval_days(&self, stability: f64) -> f64 {
        let days = stability / FACTOR * (self.config.desired_retention.powf(1.0 / DECAY) - 1.0);
        let max = f64::from(self.config.maximum_interval.max(1));
        let min = f64::from(self.config.minimum_interval.max(1)).min(max);
        days.round().clamp(min, max)
    }

    fn fuzz(&self, days: f64) -> f64 {
        if !self.config.enable_fuzzing || days < 2.5 {
            return days;
        }
        let delta = FUZZ_RANGES
            .iter()
            .fold(1.0, |acc, (start, end, factor)| acc + factor * (days.min(*end) - start).max(0.0));
        let max = (days + delta)
            .round()
            .min(f64::from(self.config.maximum_interval.max(1)));
        let min = (days - delta).round().max(2.0).min(max);
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random_range(min as i64..=max as i64) as f64
    }

    fn review_interval(&self, stability: f64) -> Duration {
        let days = self.fuzz(self.next_interval_days(stability));
        Duration::days(days as i64)
    }

    fn graduate(&self, next: &mut CardState, stability: f64) -> Duration {
        next.state = State::Review;
        next.step = None;
        self.review_interval(stability)
    }

    /// Moves a learning or relearning card along its step sequence.
    fn step(&self, next: &mut CardState, rating: Rating, phase: State, stability: f64) -> Duration {
        let steps = match phase {
            State::Relearning => &self.config.relearning_steps,
            _ => &self.config.learning_steps,
        };
        if steps.is_empty() {
            return self.graduate(next, stability);
        }
        let last = steps.len() - 1;
        let step = next.step.unwrap_or(0).min(last);
        match rating {
            Rating::Again => {
                next.state = phase;
                next.step = Some(0);
                steps[0]
            }
            Rating::Hard => {
                next.state = phase;
                next.step = Some(step);
                match (step, steps.len()) {
                    (0, 1) => steps[0] * 3 / 2,
                    (0, _) => (steps[0] + steps[1]) / 2,
                    _ => steps[step],
                }
            }
            Rating::Good if step < last => {
                next.state = phase;
                next.step = Some(step + 1);
                steps[step + 1]
            }
            Rating::Good | Rating::Easy => self.graduate(next, stability),
        }
    }
}

impl Scheduler for Fsrs {
    fn new_state(&self, at: DateTime<Utc>) -> CardState {
        CardState::new(at)
    }

    fn apply(&self, card: &CardState, rating: Rating, at: DateTime<Utc>) -> (CardState, ReviewEntry) {
        let elapsed_days = card
            .last_review
            .map(|last| ((at - last).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0));

        let (stability, difficulty) = match (card.stability, card.difficulty) {
            (Some(s), Some(d)) => {
                let days = elapsed_days.unwrap_or(0.0);
                let s = if days < 1.0 {
                    self.short_term_stability(s, rating)
                } else {
                    let r = forgetting_curve(days, s);
                    match rating {
                        Rating::Again => self.forget_stability(d, s, r),
                        _ => self.recall_stability(d, s, r, rating),
                    }
                };
                (s, self.next_difficulty(d, rating))
            }
            _ => (self.initial_stability(rating), self.initial_difficulty(rating)),
        };

        let mut next = card.clone();
        next.stability = Some(stability);
        next.difficulty = Some(difficulty);

        let interval = match card.state {
            State::New | State::Learning => self.step(&mut next, rating, State::Learning, stability),
            State::Relearning => self.step(&mut next, rating, State::Relearning, stability),
            State::Review => match rating {
                Rating::Again => {
                    next.lapses += 1;
                    match self.config.relearning_steps.first() {
                        Some(first) => {
                            next.state = State::Relearning;
                            next.step = Some(0);
                            *first
                        }
                        None => self.review_interval(stability),
                    }
                }
                _ => self.review_interval(stability),
            },
        };

        next.due = at + interval;
        next.last_review = Some(at);
        next.reps += 1;

        let entry = ReviewEntry {
            rating,
            review_datetime: at,
            previous_state: Some(card.state),
            state: Some(next.state),
            stability: Some(stability),
            difficulty: Some(difficulty),
            elapsed_days,
            scheduled_days: Some(interval.num_seconds() as f64 / SECONDS_PER_DAY),
        };
        (next, entry)
    }

    fn retrievability(&self, card: &CardState, at: DateTime<Utc>) -> f64 {
        match (card.last_review, card.stability) {
            (Some(last), Some(stability)) => {
                let days = ((at - last).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0);
                forgetting_curve(days, stability)
            }
            _ => 0.0,
        }
    }
}

fn forgetting_curve(elapsed_days: f64, stability: f64) -> f64 {
    (1.0 + FACTOR * elapsed_days / stability).powf(DECAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 10, 12, 0, 0).unwrap()
    }

    fn fsrs() -> Fsrs {
        Fsrs::seeded(
            SchedulerConfig {
                enable_fuzzing: false,
                ..SchedulerConfig::default()
            },
            1,
        )
    }

    #[test]
    fn test_good_on_new_card_moves_to_second_learning_step() {
        let fsrs = fsrs();
        let (card, entry) = fsrs.apply(&fsrs.new_state(now()), Rating::Good, now());
        assert_eq!(card.state, State::Learning);
        assert_eq!(card.step, Some(1));
        assert_eq!(card.due, now() + Duration::minutes(10));
        assert_eq!(card.stability, Some(DEFAULT_WEIGHTS[2]));
        assert_eq!(entry.previous_state, Some(State::New));
        assert_eq!(entry.elapsed_days, None);
    }

    #[test]
    fn test_learning_card_graduates_after_last_step() {
        let fsrs = fsrs();
        let (card, _) = fsrs.apply(&fsrs.new_state(now()), Rating::Good, now());
        let later = card.due;
        let (card, entry) = fsrs.apply(&card, Rating::Good, later);
        assert_eq!(card.state, State::Review);
        assert_eq!(card.step, None);
        assert!(card.due >= later + Duration::days(1));
        assert_eq!(entry.state, Some(State::Review));
        assert_eq!(card.reps, 2);
    }

    #[test]
    fn test_easy_on_new_card_graduates_immediately() {
        let fsrs = fsrs();
        let (card, entry) = fsrs.apply(&fsrs.new_state(now()), Rating::Easy, now());
        assert_eq!(card.state, State::Review);
        assert_eq!(card.due, now() + Duration::days(16));
        assert_eq!(entry.scheduled_days, Some(16.0));
    }

    #[test]
    fn test_hard_on_first_step_averages_the_first_two_steps() {
        let fsrs = fsrs();
        let (card, _) = fsrs.apply(&fsrs.new_state(now()), Rating::Hard, now());
        assert_eq!(card.state, State::Learning);
        assert_eq!(card.step, Some(0));
        assert_eq!(card.due, now() + Duration::seconds(330));
    }

    #[test]
    fn test_lapse_enters_relearning() {
        let fsrs = fsrs();
        let (card, _) = fsrs.apply(&fsrs.new_state(now()), Rating::Easy, now());
        let later = card.due;
        let (lapsed, _) = fsrs.apply(&card, Rating::Again, later);
        assert_eq!(lapsed.state, State::Relearning);
        assert_eq!(lapsed.lapses, 1);
        assert_eq!(lapsed.due, later + Duration::minutes(10));
        assert!(lapsed.stability.unwrap() < card.stability.unwrap());

        let (relearned, _) = fsrs.apply(&lapsed, Rating::Good, lapsed.due);
        assert_eq!(relearned.state, State::Review);
    }

    #[test]
    fn test_interval_respects_maximum() {
        let fsrs = Fsrs::seeded(
            SchedulerConfig {
                maximum_interval: 5,
                enable_fuzzing: false,
                ..SchedulerConfig::default()
            },
            1,
        );
        let (card, _) = fsrs.apply(&fsrs.new_state(now()), Rating::Easy, now());
        assert_eq!(card.due, now() + Duration::days(5));
    }

    #[test]
    fn test_fuzz_stays_near_the_interval() {
        let fsrs = Fsrs::seeded(SchedulerConfig::default(), 99);
        for _ in 0..50 {
            let (card, _) = fsrs.apply(&fsrs.new_state(now()), Rating::Easy, now());
            let days = (card.due - now()).num_days();
            assert!((13..=19).contains(&days), "{} days", days);
        }
    }

    #[test]
    fn test_retrievability_decays_over_time() {
        let fsrs = fsrs();
        let (card, _) = fsrs.apply(&fsrs.new_state(now()), Rating::Easy, now());
        assert_eq!(fsrs.retrievability(&card, now()), 1.0);
        let soon = fsrs.retrievability(&card, now() + Duration::days(2));
        let late = fsrs.retrievability(&card, now() + Duration::days(40));
        assert!(soon > late);
        assert!(late > 0.0 && soon < 1.0);
        let at_stability = now() + Duration::seconds((card.stability.unwrap() * SECONDS_PER_DAY) as i64);
        assert!((fsrs.retrievability(&card, at_stability) - 0.9).abs() < 1e-3);
    }

    #[test]
    fn test_difficulty_stays_in_bounds() {
        let fsrs = fsrs();
        let mut card = fsrs.new_state(now());
        let mut at = now();
        for _ in 0..20 {
            let (next, _) = fsrs.apply(&card, Rating::Again, at);
            at = next.due;
            card = next;
            let d = card.difficulty.unwrap();
            assert!((1.0..=10.0).contains(&d));
        }
    }
}
