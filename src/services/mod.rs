//! Service layer.
//!
//! Scraping logic separated from UI concerns. The CLI and the web server
//! both drive runs through [`SpiderService`] and observe them through the
//! run's event channel.

pub mod spider;

pub use spider::{RunOutcome, SpiderConfig, SpiderResult, SpiderService};
