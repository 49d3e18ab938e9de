//! # Deathwatch Bot
//!
//! Runs the deaths pipeline once: freshness gate, fetch, rolling average,
//! chart, publish, watermark.
//!
//! The binary is meant to be started by an external scheduler (cron, Cloud
//! Scheduler). Runs must not overlap: the chart file and the watermark are
//! read and written without locking.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod bot;
pub mod error;
pub mod freshness;
pub mod gcs;
pub mod watermark;

pub use bot::*;
pub use error::*;
pub use freshness::*;
pub use gcs::*;
pub use watermark::*;
