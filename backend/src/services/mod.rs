//! Services for the weather scraper

pub mod scraper;

pub use scraper::{ScrapeSummary, Scraper};
