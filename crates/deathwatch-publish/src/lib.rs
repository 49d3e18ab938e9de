//! # Deathwatch Publish
//!
//! Posts the latest figures and chart to social platforms.
//!
//! Each platform sits behind the [`Publisher`] trait. A publisher never
//! returns an error: every attempt ends in a [`PublishOutcome`], and
//! [`publish_all`] collects them into a [`PublishReport`] so that one
//! platform failing leaves the others untouched.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod mastodon;
pub mod message;
pub mod oauth;
pub mod publisher;
pub mod twitter;

pub use mastodon::*;
pub use message::*;
pub use oauth::*;
pub use publisher::*;
pub use twitter::*;
