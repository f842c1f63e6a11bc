#![forbid(unsafe_code)]

//! Core domain model and business logic for the Planday system.
//!
//! This crate provides:
//! - Domain types (plans, entries, exercises, stats)
//! - Exercise distribution across plan days
//! - Template validation and lazy day materialization
//! - Persistence (locked JSON store, event journal, CSV export)
//! - Strictly-ordered, idempotent day completion
//! - Streak and batch-progress aggregation

pub mod types;
pub mod error;
pub mod payload;
pub mod config;
pub mod logging;
pub mod distribution;
pub mod template;
pub mod store;
pub mod materializer;
pub mod completion;
pub mod stats;
pub mod events;
pub mod export;
pub mod engine;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use distribution::{distribute, DEFAULT_DAILY_CAP_MINUTES};
pub use template::{get_sample_template, load_template};
pub use store::{CasOutcome, PlanStore, SyncOutcome};
pub use completion::{CompletionOutcome, CompletionTarget};
pub use stats::compute_stats;
pub use events::{EventSink, JsonlJournal};
pub use engine::{FetchView, PlanService};
