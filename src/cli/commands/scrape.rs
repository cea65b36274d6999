//! Scrape and replay commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use tokio_util::sync::CancellationToken;

use crate::browser::{BrowserLauncher, ChromeLauncher, SnapshotLauncher};
use crate::config::Settings;
use crate::events::EventLog;
use crate::models::ScrapeRequest;
use crate::services::{RunOutcome, SpiderResult, SpiderService};

use super::helpers::{read_url_file, render_events};

/// Scrape product pages with a real browser.
pub async fn cmd_scrape(
    settings: &Settings,
    mut urls: Vec<String>,
    from_file: Option<&Path>,
    headed: bool,
    sleep: Option<f64>,
) -> anyhow::Result<()> {
    if let Some(path) = from_file {
        urls.extend(read_url_file(path)?);
    }

    let sleep = sleep.unwrap_or(settings.default_sleep_secs as f64);
    let request = ScrapeRequest::new(urls, !headed, sleep);
    request.validate()?;

    run_batch(settings, Arc::new(ChromeLauncher::new()), request).await
}

/// Replay saved HTML files through the extractor and into the workbook.
pub async fn cmd_replay(settings: &Settings, files: &[PathBuf]) -> anyhow::Result<()> {
    let (launcher, urls) = SnapshotLauncher::from_files(files)?;
    let request = ScrapeRequest::new(urls, true, 0.0);
    run_batch(settings, Arc::new(launcher), request).await
}

async fn run_batch(
    settings: &Settings,
    launcher: Arc<dyn BrowserLauncher>,
    request: ScrapeRequest,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let sink = Arc::new(settings.workbook_sink());
    let service = SpiderService::new(launcher, sink, settings.spider_config());

    println!(
        "{} Scraping {} product(s) into {}",
        style("→").cyan(),
        request.urls.len(),
        service.sink().output_path().display()
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let total = request.urls.len();
    let (log, rx) = EventLog::channel();
    let (result, ()) = tokio::join!(
        service.run(request, log, cancel),
        render_events(rx, total)
    );
    interrupt.abort();

    report(&result)
}

fn report(result: &SpiderResult) -> anyhow::Result<()> {
    match &result.outcome {
        RunOutcome::Completed => {
            println!(
                "{} {} saved, {} failed",
                style("✓").green(),
                result.saved,
                result.failed
            );
            Ok(())
        }
        RunOutcome::Cancelled => {
            println!(
                "{} Interrupted: {} saved, {} failed",
                style("!").yellow(),
                result.saved,
                result.failed
            );
            Ok(())
        }
        RunOutcome::BrowserClosed => {
            println!(
                "{} Browser closed: {} saved, {} failed",
                style("!").yellow(),
                result.saved,
                result.failed
            );
            Ok(())
        }
        RunOutcome::Aborted(reason) => Err(anyhow::anyhow!("{}", reason)),
    }
}
