use crate::models::{Rating, Snapshot, State};
use crate::scheduler::SchedulingAdapter;
use crate::study::Study;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Scheduled-interval buckets, each with its exclusive upper bound in days.
const INTERVAL_BUCKETS: [(&str, i64); 7] = [
    ("under 1 day", 1),
    ("1 day", 2),
    ("2-6 days", 7),
    ("1-4 weeks", 30),
    ("1-3 months", 90),
    ("3-12 months", 365),
    ("1 year+", i64::MAX),
];

/// How far ahead cards were scheduled at their latest review.
#[derive(Debug, Default, PartialEq)]
struct Intervals {
    counts: [u64; INTERVAL_BUCKETS.len()],
}

impl Intervals {
    fn add(&mut self, interval: Duration) {
        let days = interval.num_days();
        let slot = INTERVAL_BUCKETS
            .iter()
            .position(|(_, bound)| days < *bound)
            .unwrap_or(INTERVAL_BUCKETS.len() - 1);
        self.counts[slot] += 1;
    }

    fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

impl fmt::Display for Intervals {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Scheduled intervals (last review to due):")?;
        for ((label, _), count) in INTERVAL_BUCKETS.iter().zip(self.counts) {
            writeln!(f, "  {:<12} {}", label, count)?;
        }
        write!(f, "\nScheduled cards: {}", self.total())
    }
}

/// Figures shown on the progress overview.
#[derive(Debug, Default)]
pub struct Stats {
    pub notes: usize,
    pub cards: usize,
    /// Cards per state, in the order new, learning, review, relearning.
    pub states: [usize; 4],
    pub unreadable: usize,
    pub due_now: usize,
    pub reviews_today: usize,
    /// Logged ratings, in the order Again, Hard, Good, Easy.
    pub ratings: [usize; 4],
    /// Mean stability in days over cards that have one.
    pub average_stability: Option<f64>,
    intervals: Intervals,
}

impl Stats {
    pub fn collect(snapshot: &Snapshot, adapter: &SchedulingAdapter, now: DateTime<Utc>) -> Self {
        let mut stats = Stats {
            notes: snapshot.learning_notes.len(),
            cards: snapshot.cards.len(),
            ..Stats::default()
        };
        let mut stability_sum = 0.0;
        let mut with_stability = 0;
        for card in &snapshot.cards {
            let Ok(state) = adapter.decode(&card.scheduler_state) else {
                stats.unreadable += 1;
                continue;
            };
            let slot = match state.state {
                State::New => 0,
                State::Learning => 1,
                State::Review => 2,
                State::Relearning => 3,
            };
            stats.states[slot] += 1;
            if state.due <= now {
                stats.due_now += 1;
            }
            if let Some(stability) = state.stability {
                stability_sum += stability;
                with_stability += 1;
            }
            if let Some(last_review) = state.last_review {
                stats.intervals.add(state.due - last_review);
            }
        }
        if with_stability > 0 {
            stats.average_stability = Some(stability_sum / with_stability as f64);
        }

        let today = now.date_naive();
        for log in &snapshot.review_logs {
            stats.ratings[usize::from(u8::from(log.entry.rating)) - 1] += 1;
            if log.entry.review_datetime.date_naive() == today {
                stats.reviews_today += 1;
            }
        }
        stats
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Notes: {}, cards: {}\n", self.notes, self.cards)?;
        writeln!(f, "Card states:")?;
        for (name, count) in ["new", "learning", "review", "relearning"].iter().zip(self.states) {
            writeln!(f, "  {:<10} {}", name, count)?;
        }
        if self.unreadable > 0 {
            writeln!(f, "  {:<10} {}", "unreadable", self.unreadable)?;
        }
        writeln!(f, "\nDue now:       {}", self.due_now)?;
        writeln!(f, "Reviews today: {}\n", self.reviews_today)?;
        writeln!(f, "Ratings:")?;
        for (rating, count) in Rating::ALL.iter().zip(self.ratings) {
            writeln!(f, "  {:<5} {}", rating.to_string(), count)?;
        }
        match self.average_stability {
            Some(s) => writeln!(f, "\nAverage stability: {:.2} days\n", s)?,
            None => writeln!(f, "\nAverage stability: -\n")?,
        }
        write!(f, "{}", self.intervals)
    }
}

pub fn stats(study: &Study) -> Result<()> {
    let stats = Stats::collect(&study.snapshot()?, study.adapter(), study.now());
    println!("{}", stats);
    Ok(())
}

#[test]
fn test_collect_counts_states_due_and_ratings() {
    use crate::clock::FixedClock;
    use crate::models::{Card, Direction, ReviewEntry, ReviewLog};
    use crate::scheduler::{Fsrs, SchedulerConfig};
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Arc;

    let now = Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap();
    let adapter = SchedulingAdapter::new(
        Fsrs::seeded(SchedulerConfig::default(), 1),
        Arc::new(FixedClock::at(now)),
    );
    let card = |id, state| Card {
        id,
        note_id: 1,
        direction: Direction::Forward,
        scheduler_state: state,
    };
    let log = |id, rating, at| ReviewLog {
        id,
        card_id: 1,
        entry: ReviewEntry {
            rating,
            review_datetime: at,
            previous_state: None,
            state: None,
            stability: None,
            difficulty: None,
            elapsed_days: None,
            scheduled_days: None,
        },
    };
    let snapshot = Snapshot {
        learning_notes: Vec::new(),
        cards: vec![
            card(1, json!({"due": now, "state": "new"})),
            card(
                2,
                json!({"due": now + Duration::days(3), "state": "review", "stability": 4.0,
                       "last_review": now}),
            ),
            card(
                3,
                json!({"due": now - Duration::hours(1), "state": "relearning", "stability": 1.0,
                       "last_review": now - Duration::hours(2)}),
            ),
            card(4, json!("broken")),
        ],
        review_logs: vec![
            log(1, Rating::Good, now - Duration::days(1)),
            log(2, Rating::Again, now - Duration::hours(2)),
            log(3, Rating::Good, now),
        ],
    };

    let stats = Stats::collect(&snapshot, &adapter, now);
    assert_eq!(stats.cards, 4);
    assert_eq!(stats.states, [1, 0, 1, 1]);
    assert_eq!(stats.unreadable, 1);
    assert_eq!(stats.due_now, 2);
    assert_eq!(stats.reviews_today, 2);
    assert_eq!(stats.ratings, [1, 0, 2, 0]);
    assert_eq!(stats.average_stability, Some(2.5));
    assert_eq!(stats.intervals.counts, [1, 0, 1, 0, 0, 0, 0]);

    let shown = stats.to_string();
    assert!(shown.contains("  relearning 1\n"));
    assert!(shown.contains("  unreadable 1\n"));
    assert!(shown.contains("Average stability: 2.50 days"));
    assert!(shown.contains(&format!("  {:<12} 1\n", "2-6 days")));
    assert!(shown.ends_with("Scheduled cards: 2"));
}

#[test]
fn test_interval_buckets_split_on_day_boundaries() {
    let mut intervals = Intervals::default();
    for hours in [0, 23, 24, 47, 48, 24 * 7, 24 * 29, 24 * 30, 24 * 364, 24 * 365, 24 * 900] {
        intervals.add(Duration::hours(hours));
    }
    intervals.add(Duration::hours(-3));
    assert_eq!(intervals.counts, [3, 2, 1, 2, 1, 1, 2]);
    assert_eq!(intervals.total(), 12);
}
