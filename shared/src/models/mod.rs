//! Domain models for the weather scraper

mod weather;

pub use weather::*;
