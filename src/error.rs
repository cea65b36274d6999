//! Error types for the scraping pipeline.
//!
//! Each layer has its own error so the orchestrator can tell a bad page
//! apart from a broken workbook or a dead browser.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by the browser capability.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },
    #[error("Timed out after {seconds}s waiting for {what}")]
    Timeout { what: String, seconds: u64 },
    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),
    #[error("No page loaded")]
    NoPage,
    #[error("Script evaluation failed: {0}")]
    Evaluation(String),
    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

/// Page-level failure. The item is logged and skipped.
#[derive(Debug, Error)]
pub enum ScrapingError {
    #[error("Page load failed: {0}")]
    BadStatus(u16),
    #[error("Product title is missing")]
    MissingTitle,
    #[error("Scraping cancelled")]
    Cancelled,
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Workbook read/write failure. The item is logged and skipped.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Template workbook not found: {}", .0.display())]
    MissingTemplate(PathBuf),
    #[error("Workbook has no sheets: {}", .0.display())]
    NoSheet(PathBuf),
    #[error("Workbook I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Workbook format error: {0}")]
    Format(String),
    #[error("Workbook writer task failed: {0}")]
    Task(String),
}

/// Browser session failure. Ends the run.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Failed to open page: {0}")]
    Page(String),
    #[error("Browser disconnected")]
    Disconnected,
    #[error("Browser support not compiled. Rebuild with: cargo build --features browser")]
    Unsupported,
}

/// Malformed request at the submission boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("urls must contain at least one URL")]
    NoUrls,
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
    #[error("sleepSecond must be a number between 0 and 86400")]
    InvalidSleep,
}
