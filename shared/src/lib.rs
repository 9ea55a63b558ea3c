//! Shared types and models for the weather scraper
//!
//! This crate holds the domain types that every component of the scraper
//! agrees on: locations, weather samples and coordinate validation.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
