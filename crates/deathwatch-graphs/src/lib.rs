//! # Deathwatch Graphs
//!
//! Data retrieval, processing, and chart rendering for the deaths series.
//!
//! The crate fetches the England `newDeaths28DaysByPublishDate` series from
//! the coronavirus dashboard API, derives the trailing 7-day average, and
//! renders it to a PNG with plotters.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod data_fetcher;
pub mod renderer;
pub mod transform;

pub use data_fetcher::*;
pub use renderer::*;
pub use transform::*;
