//! Browser capability.
//!
//! The extractor only talks to a [`PageDriver`]. Two implementations exist:
//! a Chrome driver over CDP (feature `browser`) and a snapshot driver that
//! serves saved HTML documents.

mod config;
mod scripts;
mod snapshot;

#[cfg(feature = "browser")]
mod chrome;

pub use config::{BrowserEngineConfig, DEFAULT_USER_AGENT};
pub use snapshot::{SnapshotDocument, SnapshotLauncher};

#[cfg(feature = "browser")]
pub use chrome::ChromeLauncher;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{DriverError, SessionError};
use crate::models::PageSignal;

/// Result of a top-level navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationResponse {
    pub status: u16,
    pub final_url: String,
}

/// Incremental scroll used to trigger lazy-loaded content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPlan {
    pub step_px: u32,
    pub interval: Duration,
    /// Stop after this many pixels even if the page keeps growing.
    pub max_px: u32,
}

impl Default for ScrollPlan {
    fn default() -> Self {
        Self {
            step_px: 100,
            interval: Duration::from_millis(100),
            max_px: 10_000,
        }
    }
}

/// One open page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration)
        -> Result<NavigationResponse, DriverError>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<(), DriverError>;

    /// Text content of the first match, `None` when nothing matches.
    async fn query_text(&self, selector: &str) -> Result<Option<String>, DriverError>;

    /// Text content of every `selector` match inside the first `scope`
    /// match. `None` when `scope` is absent.
    async fn query_all_text(
        &self,
        scope: &str,
        selector: &str,
    ) -> Result<Option<Vec<String>>, DriverError>;

    async fn auto_scroll(&self, plan: &ScrollPlan) -> Result<(), DriverError>;

    /// Raw inputs for the image resolver.
    async fn page_signal(&self) -> Result<PageSignal, DriverError>;

    /// Absolute targets of every anchor on the page.
    async fn link_targets(&self) -> Result<Vec<String>, DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

/// A running browser.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>, SessionError>;

    /// Flips to `true` when the browser goes away.
    fn disconnected(&self) -> watch::Receiver<bool>;

    async fn close(&self) -> Result<(), SessionError>;
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, config: &BrowserEngineConfig)
        -> Result<Box<dyn BrowserSession>, SessionError>;
}

/// Launcher that always fails because Chrome support was compiled out.
#[cfg(not(feature = "browser"))]
#[derive(Debug, Default, Clone)]
pub struct ChromeLauncher;

#[cfg(not(feature = "browser"))]
impl ChromeLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(
        &self,
        _config: &BrowserEngineConfig,
    ) -> Result<Box<dyn BrowserSession>, SessionError> {
        Err(SessionError::Unsupported)
    }
}
