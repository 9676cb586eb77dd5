//! Synthetic review history for demo data.
//!
//! Every card gets a difficulty profile that biases its ratings and a review
//! budget. Reviews then follow the scheduler's own due dates, shifted by a
//! little jitter and placed at a plausible hour of the day, until the budget
//! runs out or the simulated time leaves the window.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

use chrono::{DateTime, Duration, Timelike, Utc};
use log::{debug, info};
use rand::Rng;

use crate::error::{Error, Result};
use crate::models::{Card, Rating, ReviewLog};
use crate::scheduler::SchedulingAdapter;

/// Study sessions happen between 8:00 and 22:59, mostly around midday and in
/// the early evening.
const HOUR_WEIGHTS: [(u32, u32); 15] = [
    (8, 5),
    (9, 10),
    (10, 8),
    (11, 6),
    (12, 5),
    (13, 4),
    (14, 6),
    (15, 8),
    (16, 10),
    (17, 12),
    (18, 15),
    (19, 18),
    (20, 12),
    (21, 8),
    (22, 5),
];

const PROFILE_WEIGHTS: [(DifficultyProfile, u32); 5] = [
    (DifficultyProfile::Easy, 20),
    (DifficultyProfile::Hard, 20),
    (DifficultyProfile::MediumHard, 20),
    (DifficultyProfile::MediumEasy, 20),
    (DifficultyProfile::Average, 20),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DifficultyProfile {
    Easy,
    Hard,
    MediumHard,
    MediumEasy,
    Average,
}

impl DifficultyProfile {
    /// Relative weights of Again, Hard, Good and Easy.
    pub fn rating_weights(self) -> [u32; 4] {
        match self {
            DifficultyProfile::Easy => [5, 10, 35, 50],
            DifficultyProfile::Hard => [40, 35, 20, 5],
            DifficultyProfile::MediumHard => [25, 35, 30, 10],
            DifficultyProfile::MediumEasy => [10, 20, 45, 25],
            DifficultyProfile::Average => [15, 25, 40, 20],
        }
    }

    /// How many reviews a card with this profile aims for.
    pub fn review_budget(self) -> RangeInclusive<u32> {
        match self {
            DifficultyProfile::Easy => 3..=8,
            DifficultyProfile::Hard => 5..=12,
            _ => 3..=9,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DifficultyProfile::Easy => "easy",
            DifficultyProfile::Hard => "hard",
            DifficultyProfile::MediumHard => "medium-hard",
            DifficultyProfile::MediumEasy => "medium-easy",
            DifficultyProfile::Average => "average",
        }
    }

    fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        weighted(rng, &PROFILE_WEIGHTS)
    }

    fn draw_rating<R: Rng + ?Sized>(self, rng: &mut R) -> Rating {
        let table: Vec<(Rating, u32)> = Rating::ALL
            .into_iter()
            .zip(self.rating_weights())
            .collect();
        weighted(rng, &table)
    }
}

fn weighted<T: Copy, R: Rng + ?Sized>(rng: &mut R, table: &[(T, u32)]) -> T {
    let total: u32 = table.iter().map(|(_, w)| w).sum();
    let mut roll = rng.random_range(0..total.max(1));
    for &(item, weight) in table {
        if roll < weight {
            return item;
        }
        roll -= weight;
    }
    table[table.len() - 1].0
}

fn days(amount: f64) -> Duration {
    Duration::seconds((amount * 86_400.0).round() as i64)
}

pub struct SimulationReport {
    pub logs: Vec<ReviewLog>,
    pub card_profiles: BTreeMap<u64, DifficultyProfile>,
    pub skipped_cards: usize,
}

impl SimulationReport {
    pub fn profile_counts(&self) -> BTreeMap<DifficultyProfile, usize> {
        let mut counts = BTreeMap::new();
        for profile in self.card_profiles.values() {
            *counts.entry(*profile).or_insert(0) += 1;
        }
        counts
    }

    pub fn average_reviews(&self) -> f64 {
        if self.card_profiles.is_empty() {
            return 0.0;
        }
        self.logs.len() as f64 / self.card_profiles.len() as f64
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let cards = self.card_profiles.len();
        writeln!(
            f,
            "Generated {} review log{} for {} card{}",
            self.logs.len(),
            if self.logs.len() == 1 { "" } else { "s" },
            cards,
            if cards == 1 { "" } else { "s" }
        )?;
        writeln!(f, "Card difficulty distribution:")?;
        let counts = self.profile_counts();
        for (profile, _) in PROFILE_WEIGHTS {
            let count = counts.get(&profile).copied().unwrap_or(0);
            let share = if cards == 0 {
                0.0
            } else {
                count as f64 * 100.0 / cards as f64
            };
            writeln!(f, "  {:<12} {:>4} ({:.1}%)", profile.name(), count, share)?;
        }
        if self.skipped_cards > 0 {
            writeln!(f, "Skipped cards: {}", self.skipped_cards)?;
        }
        write!(f, "Average reviews per card: {:.1}", self.average_reviews())
    }
}

pub struct Simulator<'a, R> {
    adapter: &'a SchedulingAdapter,
    rng: R,
}

impl<'a, R: Rng> Simulator<'a, R> {
    pub fn new(adapter: &'a SchedulingAdapter, rng: R) -> Self {
        Self { adapter, rng }
    }

    /// Simulates reviews for `cards` inside `[start, end]`, updating each
    /// card's scheduler state in place. Log IDs count up from `first_log_id`.
    pub fn run(
        &mut self,
        cards: &mut [Card],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        first_log_id: u64,
    ) -> Result<SimulationReport> {
        if start > end {
            return Err(Error::InvalidWindow { start, end });
        }
        let mut report = SimulationReport {
            logs: Vec::new(),
            card_profiles: BTreeMap::new(),
            skipped_cards: 0,
        };
        let mut next_id = first_log_id;
        for card in cards.iter_mut() {
            match self.simulate_card(card, start, end, &mut next_id, &mut report.logs) {
                Ok(profile) => {
                    report.card_profiles.insert(card.id, profile);
                }
                Err(Error::MalformedCardState { reason }) => {
                    debug!("Not simulating card {}: {}", card.id, reason);
                    report.skipped_cards += 1;
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            "Simulated {} reviews for {} cards between {} and {}",
            report.logs.len(),
            report.card_profiles.len(),
            start,
            end
        );
        Ok(report)
    }

    fn simulate_card(
        &mut self,
        card: &mut Card,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        next_id: &mut u64,
        logs: &mut Vec<ReviewLog>,
    ) -> Result<DifficultyProfile> {
        let created = self.adapter.due(&card.scheduler_state)?;
        let profile = DifficultyProfile::draw(&mut self.rng);
        let budget = self.rng.random_range(profile.review_budget());
        debug!(
            "Card {}: profile {}, up to {} reviews",
            card.id,
            profile.name(),
            budget
        );

        let mut state = card.scheduler_state.clone();
        let mut last: Option<DateTime<Utc>> = None;
        for _ in 0..budget {
            let base = match last {
                None => created + days(self.rng.random_range(0.0..2.0)),
                Some(_) => self.adapter.due(&state)?,
            };
            let jittered = base + days(self.rng.random_range(-0.3..0.5));
            let mut at = self.session_time(jittered);
            if at < start {
                let day = start + Duration::seconds(self.rng.random_range(0..12 * 3600));
                at = self.session_not_before(day, start);
            }
            // A session placed before the previous review is redrawn from the
            // scheduler's own due day on.
            if let Some(previous) = last {
                if at < previous {
                    at = self.session_not_before(base.max(previous), previous);
                }
            }
            if at > end {
                break;
            }

            let rating = profile.draw_rating(&mut self.rng);
            let (next, entry) = self
                .adapter
                .apply_review(&state, i64::from(u8::from(rating)), Some(at))?;
            logs.push(ReviewLog {
                id: *next_id,
                card_id: card.id,
                entry,
            });
            *next_id += 1;
            state = next;
            last = Some(at);
        }
        card.scheduler_state = state;
        Ok(profile)
    }

    /// Same day, at a random time of a typical study session.
    fn session_time(&mut self, day: DateTime<Utc>) -> DateTime<Utc> {
        let hour = weighted(&mut self.rng, &HOUR_WEIGHTS);
        let minute = self.rng.random_range(0..60);
        let second = self.rng.random_range(0..60);
        day.with_hour(hour)
            .and_then(|t| t.with_minute(minute))
            .and_then(|t| t.with_second(second))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(day)
    }

    /// A session on `day` or a later day that does not precede `floor`.
    fn session_not_before(&mut self, mut day: DateTime<Utc>, floor: DateTime<Utc>) -> DateTime<Utc> {
        loop {
            let at = self.session_time(day);
            if at >= floor {
                return at;
            }
            day += Duration::days(1);
        }
    }
}
