//! # Deathwatch Config
//!
//! Type-safe configuration for Deathwatch.
//!
//! Configuration is read from the environment once at process start,
//! validated, and then passed explicitly to every component.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod defaults;
pub mod loader;
pub mod schema;
pub mod validator;

pub use defaults::*;
pub use loader::*;
pub use schema::*;
pub use validator::*;
