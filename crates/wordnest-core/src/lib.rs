//! # WordNest Core
//!
//! Shared vocabulary for every WordNest crate: learner profiles, inbound and
//! outbound messages, the traits that components are wired through, the static
//! lesson catalog, configuration and the error type.

pub mod catalog;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use catalog::{Catalog, Lesson};
pub use config::WordNestConfig;
pub use error::{Result, WordNestError};
pub use types::*;
