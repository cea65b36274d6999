//! Batch scraping service.
//!
//! One run owns one browser session and one page, visits every URL in
//! order and appends a row per product. Per-item failures are logged and
//! skipped; a dead browser or a cancellation ends the run early. The
//! completion event is sent exactly once whatever happens.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::browser::{BrowserEngineConfig, BrowserLauncher, BrowserSession, PageDriver};
use crate::error::ScrapingError;
use crate::events::{EventLog, LogSink, SpiderEvent};
use crate::extract::{extract_asins, sleep_or_cancel, ExtractorConfig, PageExtractor};
use crate::models::{OutputRow, RowDefaults, ScrapeRequest};
use crate::storage::WorkbookSink;

/// Static configuration of the service.
#[derive(Debug, Clone, Default)]
pub struct SpiderConfig {
    pub browser: BrowserEngineConfig,
    pub extractor: ExtractorConfig,
    pub row_defaults: RowDefaults,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every URL was visited.
    Completed,
    Cancelled,
    /// The browser went away mid-run.
    BrowserClosed,
    /// The run never started.
    Aborted(String),
}

/// Summary of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiderResult {
    pub saved: usize,
    pub failed: usize,
    pub outcome: RunOutcome,
}

impl SpiderResult {
    fn aborted(reason: String) -> Self {
        Self {
            saved: 0,
            failed: 0,
            outcome: RunOutcome::Aborted(reason),
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    saved: usize,
    failed: usize,
}

/// Resolves once the session reports disconnection.
async fn browser_closed(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // sender gone without a disconnect; nothing more will arrive
            std::future::pending::<()>().await;
        }
    }
}

/// Service for scraping product batches into the workbook.
pub struct SpiderService {
    launcher: Arc<dyn BrowserLauncher>,
    sink: Arc<WorkbookSink>,
    extractor: PageExtractor,
    config: SpiderConfig,
}

impl SpiderService {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        sink: Arc<WorkbookSink>,
        config: SpiderConfig,
    ) -> Self {
        Self {
            launcher,
            sink,
            extractor: PageExtractor::new(config.extractor),
            config,
        }
    }

    pub fn sink(&self) -> &WorkbookSink {
        &self.sink
    }

    /// Run a batch. Always ends with [`SpiderEvent::Finished`] on `log`.
    pub async fn run(
        &self,
        request: ScrapeRequest,
        log: EventLog,
        cancel: CancellationToken,
    ) -> SpiderResult {
        let result = self.run_batch(&request, &log, &cancel).await;
        info!(
            "Run finished: {} saved, {} failed ({:?})",
            result.saved, result.failed, result.outcome
        );
        log.finished();
        result
    }

    async fn run_batch(
        &self,
        request: &ScrapeRequest,
        log: &EventLog,
        cancel: &CancellationToken,
    ) -> SpiderResult {
        if let Err(e) = request.validate() {
            log.log(&format!("Invalid request: {}", e));
            return SpiderResult::aborted(e.to_string());
        }

        let browser = self.config.browser.with_headless(request.headless);
        let session = match self.launcher.launch(&browser).await {
            Ok(session) => session,
            Err(e) => {
                log.log(&e.to_string());
                return SpiderResult::aborted(e.to_string());
            }
        };
        log.log("Browser launched successfully");

        let page = match session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                log.log(&e.to_string());
                close_session(session.as_ref()).await;
                return SpiderResult::aborted(e.to_string());
            }
        };

        let mut disconnected = session.disconnected();
        let mut tally = Tally::default();
        let outcome = tokio::select! {
            biased;
            _ = browser_closed(&mut disconnected) => {
                log.log("browser is closed");
                RunOutcome::BrowserClosed
            }
            outcome = self.visit_all(page.as_ref(), request, log, cancel, &mut tally) => outcome,
        };

        if outcome != RunOutcome::BrowserClosed {
            if let Err(e) = page.close().await {
                warn!("Failed to close page: {}", e);
            }
            close_session(session.as_ref()).await;
        }

        SpiderResult {
            saved: tally.saved,
            failed: tally.failed,
            outcome,
        }
    }

    async fn visit_all(
        &self,
        page: &dyn PageDriver,
        request: &ScrapeRequest,
        log: &EventLog,
        cancel: &CancellationToken,
        tally: &mut Tally,
    ) -> RunOutcome {
        let total = request.urls.len();
        for (index, url) in request.urls.iter().enumerate() {
            if cancel.is_cancelled() {
                return RunOutcome::Cancelled;
            }
            log.emit(SpiderEvent::ItemStarted {
                index,
                total,
                url: url.clone(),
            });
            log.log(&format!("------------- {} -------------", url));

            let record = match self.extractor.extract(page, url, log, cancel).await {
                Ok(record) => record,
                Err(ScrapingError::Cancelled) => return RunOutcome::Cancelled,
                Err(e) => {
                    log.log(&format!("Error during page scraping {}: {}", url, e));
                    tally.failed += 1;
                    log.emit(SpiderEvent::ItemFinished { index, ok: false });
                    continue;
                }
            };

            let row = OutputRow::from_record(&record, url, &self.config.row_defaults);
            if let Err(e) = self.sink.append(&row, log).await {
                log.log(&format!("Error adding product to Excel {}: {}", url, e));
                tally.failed += 1;
                log.emit(SpiderEvent::ItemFinished { index, ok: false });
                continue;
            }
            log.log("Scraping complete. Results saved to Excel");
            tally.saved += 1;
            log.emit(SpiderEvent::ItemFinished { index, ok: true });

            if index + 1 < total
                && sleep_or_cancel(request.sleep_duration(), cancel)
                    .await
                    .is_err()
            {
                return RunOutcome::Cancelled;
            }
        }
        RunOutcome::Completed
    }

    /// Collect product ASINs linked from a storefront page.
    ///
    /// Uses its own browser session. Ends with [`SpiderEvent::Finished`].
    pub async fn spider_asin_from_store_url(
        &self,
        url: &str,
        headless: bool,
        log: EventLog,
        cancel: CancellationToken,
    ) -> anyhow::Result<Vec<String>> {
        let result = self.harvest_asins(url, headless, &log, &cancel).await;
        log.finished();
        result
    }

    async fn harvest_asins(
        &self,
        url: &str,
        headless: bool,
        log: &EventLog,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<String>> {
        let browser = self.config.browser.with_headless(headless);
        let session = self.launcher.launch(&browser).await?;
        log.log("Browser launched successfully");

        let page = match session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                close_session(session.as_ref()).await;
                return Err(e.into());
            }
        };

        let mut disconnected = session.disconnected();
        let links = tokio::select! {
            biased;
            _ = browser_closed(&mut disconnected) => {
                log.log("browser is closed");
                return Err(crate::error::SessionError::Disconnected.into());
            }
            links = self.extractor.collect_links(page.as_ref(), url, log, cancel) => links,
        };

        if let Err(e) = page.close().await {
            warn!("Failed to close page: {}", e);
        }
        close_session(session.as_ref()).await;

        let asins = extract_asins(&links?);
        log.log(&format!("Found {} ASINs", asins.len()));
        Ok(asins)
    }
}

async fn close_session(session: &dyn BrowserSession) {
    if let Err(e) = session.close().await {
        warn!("Failed to close browser: {}", e);
    }
}
