//! amzspider - Amazon product page scraper.
//!
//! Loads product pages in a browser, normalizes titles, attributes,
//! dimensions and gallery images, and appends one row per product to an
//! Excel workbook. Runs are driven from the CLI or over HTTP with
//! server-sent progress events.

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod models;
pub mod server;
pub mod services;
pub mod storage;
