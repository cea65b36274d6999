//! Storefront ASIN harvesting command.

use std::sync::Arc;

use console::style;
use tokio_util::sync::CancellationToken;

use crate::browser::ChromeLauncher;
use crate::config::Settings;
use crate::events::EventLog;
use crate::services::SpiderService;

use super::helpers::print_log_lines;

/// Print the ASINs linked from a storefront page, one per line.
pub async fn cmd_store(settings: &Settings, url: &str, headed: bool) -> anyhow::Result<()> {
    url::Url::parse(url).map_err(|e| anyhow::anyhow!("invalid URL '{}': {}", url, e))?;

    let service = SpiderService::new(
        Arc::new(ChromeLauncher::new()),
        Arc::new(settings.workbook_sink()),
        settings.spider_config(),
    );

    let (log, rx) = EventLog::channel();
    let (asins, ()) = tokio::join!(
        service.spider_asin_from_store_url(url, !headed, log, CancellationToken::new()),
        print_log_lines(rx)
    );

    let asins = asins?;
    if asins.is_empty() {
        eprintln!("{} No products linked from {}", style("!").yellow(), url);
    }
    for asin in asins {
        println!("{}", asin);
    }
    Ok(())
}
