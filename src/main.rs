use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};
use log::debug;
use repaso::add::add;
use repaso::clock::SystemClock;
use repaso::demo::demo;
use repaso::export::export;
use repaso::init::init;
use repaso::review::review;
use repaso::scheduler::{Fsrs, SchedulerConfig, SchedulingAdapter};
use repaso::sentence::TemplateSentences;
use repaso::stats::stats;
use repaso::store::Store;
use repaso::study::Study;
use repaso::utils::parse_timestamp;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Subcommand)]
enum Command {
    /// Create a new store and add the first notes
    Init,
    /// Add notes to an existing store
    Add {
        /// Don't print prompts
        #[arg(long)]
        silent: bool,
    },
    /// Review all due cards
    Review,
    /// Show progress statistics
    Stats,
    /// Write the review history to a CSV file
    Export {
        /// Target CSV file
        path: PathBuf,
    },
    /// Replace all review history with a simulated one
    Simulate {
        /// Window start [default: creation of the oldest note]
        #[arg(long, value_parser = parse_timestamp)]
        start: Option<DateTime<Utc>>,
        /// Window end
        #[arg(long, value_parser = parse_timestamp)]
        end: DateTime<Utc>,
    },
    /// Fill the store with demo notes and a month of simulated reviews
    Demo {
        #[arg(long, value_parser = parse_timestamp, default_value = "2025-09-03T08:00:00Z")]
        start: DateTime<Utc>,
        /// Replace notes that are already in the store
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct SchedulerArgs {
    /// Probability of recall the scheduler aims for
    #[arg(long, global = true, default_value_t = 0.9)]
    retention: f64,
    /// Shortest interval in days once a card has graduated
    #[arg(long, global = true, default_value_t = 1)]
    min_interval: u32,
    /// Longest interval in days
    #[arg(long, global = true, default_value_t = 30)]
    max_interval: u32,
    /// Learning steps in minutes
    #[arg(long, global = true, value_delimiter = ',', default_values_t = [1, 10])]
    learning_steps: Vec<i64>,
    /// Relearning steps in minutes
    #[arg(long, global = true, value_delimiter = ',', default_values_t = [10])]
    relearning_steps: Vec<i64>,
    /// Don't randomize review intervals
    #[arg(long, global = true)]
    no_fuzz: bool,
}

impl SchedulerArgs {
    fn config(&self) -> Result<SchedulerConfig> {
        if !(self.retention > 0.0 && self.retention < 1.0) {
            return Err(anyhow!("Retention must lie strictly between 0 and 1, got {}.", self.retention));
        }
        if self.min_interval == 0 || self.min_interval > self.max_interval {
            return Err(anyhow!(
                "Intervals must satisfy 1 <= min ({}) <= max ({}).",
                self.min_interval,
                self.max_interval
            ));
        }
        if self.learning_steps.iter().chain(&self.relearning_steps).any(|m| *m <= 0) {
            return Err(anyhow!("Learning and relearning steps must be positive minutes."));
        }
        let minutes = |steps: &[i64]| -> Vec<Duration> {
            steps.iter().map(|m| Duration::minutes(*m)).collect()
        };
        Ok(SchedulerConfig {
            desired_retention: self.retention,
            minimum_interval: self.min_interval,
            maximum_interval: self.max_interval,
            learning_steps: minutes(&self.learning_steps),
            relearning_steps: minutes(&self.relearning_steps),
            enable_fuzzing: !self.no_fuzz,
        })
    }
}

/// Vocabulary flashcards with spaced repetition.
#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Path to the store (JSON file)
    #[arg(long, global = true, env = "REPASO_STORE", default_value = "repaso.json")]
    store: PathBuf,
    /// Seed for scheduling fuzz, word sampling and simulation
    #[arg(long, global = true)]
    seed: Option<u64>,
    #[command(flatten)]
    scheduler: SchedulerArgs,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Cli::parse();

    let config = args.scheduler.config()?;
    debug!("Scheduler settings: {:?}", config);
    let fsrs = match args.seed {
        Some(seed) => Fsrs::seeded(config, seed),
        None => Fsrs::new(config),
    };
    let adapter = SchedulingAdapter::new(fsrs, Arc::new(SystemClock));
    let mut study = Study::new(Store::new(&args.store), adapter);
    if let Some(seed) = args.seed {
        study = study.with_seed(seed);
    }

    match args.command {
        Command::Init => init(&study, &TemplateSentences),
        Command::Add { silent } => add(&study, &TemplateSentences, silent),
        Command::Review => review(&study),
        Command::Stats => stats(&study),
        Command::Export { path } => export(&study, &path),
        Command::Simulate { start, end } => {
            let report = study.reset_history(start, end)?;
            println!("{}", report);
            Ok(())
        }
        Command::Demo { start, force } => demo(&study, start, force),
    }
}
