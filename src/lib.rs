pub mod add;
pub mod clock;
pub mod demo;
pub mod due;
pub mod error;
pub mod export;
pub mod init;
pub mod known_words;
pub mod models;
pub mod review;
pub mod scheduler;
pub mod sentence;
pub mod simulator;
pub mod stats;
pub mod store;
pub mod study;
pub mod utils;

pub use error::{Error, Result};
