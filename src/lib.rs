//! cadence: the adaptive personalization engine of a focus/break assistant.
//!
//! A closed feedback loop over behavioral events: record, aggregate into
//! performance intelligence, synthesize candidate scheduling models, detect
//! adaptation opportunities, apply them under rate limiting, and monitor
//! and revert changes that do not improve outcomes.

pub mod adaptation;
pub mod analytics;
pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod learning;
pub mod models;
pub mod notify;
pub mod recorder;
pub mod settings;
pub mod store;

pub use config::EngineConfig;
pub use engine::{CycleSummary, EngineController, PersonalizationEngine};
pub use error::EngineError;

/// Initialize logging from the environment (reads RUST_LOG). Safe to call
/// more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
