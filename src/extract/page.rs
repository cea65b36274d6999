//! Product page extraction.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::attributes::AttributeRebuilder;
use super::images::resolve_images;
use super::text::{remove_invisible, truncate_chars};
use crate::browser::{PageDriver, ScrollPlan};
use crate::error::ScrapingError;
use crate::events::LogSink;
use crate::models::{ProductRecord, Specification};

pub const TITLE_SELECTOR: &str = "#productTitle";
pub const DESCRIPTION_SELECTOR: &str = "#feature-bullets ul";
pub const SPECIFICATION_SELECTOR: &str = ".inline-twister-dim-title-value-truncate-expanded";

const MAX_TITLE_CHARS: usize = 180;
const MIN_DESCRIPTION_CHARS: usize = 20;

/// How a region lays out its key/value pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionLayout {
    /// Keys and values are separate element lists, paired by position.
    Parallel {
        keys: &'static str,
        values: &'static str,
    },
    /// Each item reads `Key : Value`.
    Inline { items: &'static str },
}

/// A page region holding product attributes.
#[derive(Debug, Clone, Copy)]
pub struct AttributeRegion {
    pub name: &'static str,
    pub container: &'static str,
    pub layout: RegionLayout,
}

/// Attribute regions in priority order; later regions overwrite earlier ones.
pub const ATTRIBUTE_REGIONS: &[AttributeRegion] = &[
    AttributeRegion {
        name: "overview",
        container: "#productOverview_feature_div",
        layout: RegionLayout::Parallel {
            keys: ".a-text-bold",
            values: ".po-break-word",
        },
    },
    AttributeRegion {
        name: "detail table",
        container: "#productDetails_detailBullets_sections1",
        layout: RegionLayout::Parallel {
            keys: "th",
            values: "td",
        },
    },
    AttributeRegion {
        name: "technical specification",
        container: "#productDetails_techSpec_section_1",
        layout: RegionLayout::Parallel {
            keys: ".prodDetSectionEntry",
            values: ".prodDetAttrValue",
        },
    },
    AttributeRegion {
        name: "detail bullets",
        container: "#detailBulletsWrapper_feature_div",
        layout: RegionLayout::Inline {
            items: ".a-list-item",
        },
    },
];

/// Timing knobs for a page visit.
#[derive(Debug, Clone, Copy)]
pub struct ExtractorConfig {
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
    /// Pause after scrolling so lazy content can land.
    pub settle_delay: Duration,
    pub scroll: ScrollPlan,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(40),
            selector_timeout: Duration::from_secs(40),
            settle_delay: Duration::from_secs(2),
            scroll: ScrollPlan::default(),
        }
    }
}

/// Sleep unless cancelled first.
pub async fn sleep_or_cancel(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), ScrapingError> {
    if duration.is_zero() {
        return if cancel.is_cancelled() {
            Err(ScrapingError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(ScrapingError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

fn check_cancel(cancel: &CancellationToken) -> Result<(), ScrapingError> {
    if cancel.is_cancelled() {
        Err(ScrapingError::Cancelled)
    } else {
        Ok(())
    }
}

/// Split `Key : Value` items. Items without a colon are dropped.
fn split_inline_items(items: &[String]) -> (Vec<String>, Vec<String>) {
    items
        .iter()
        .filter_map(|item| item.split_once(':'))
        .map(|(k, v)| {
            (
                remove_invisible(k).trim().to_string(),
                remove_invisible(v).trim().to_string(),
            )
        })
        .unzip()
}

fn trimmed(items: Vec<String>) -> Vec<String> {
    items.into_iter().map(|s| s.trim().to_string()).collect()
}

/// Drives one product page from navigation to a [`ProductRecord`].
#[derive(Debug, Clone, Default)]
pub struct PageExtractor {
    config: ExtractorConfig,
}

impl PageExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Navigate, check the status, scroll and settle.
    ///
    /// Shared with storefront harvesting, which needs the same loaded page
    /// but not the product title.
    pub async fn load(
        &self,
        page: &dyn PageDriver,
        url: &str,
        log: &dyn LogSink,
        cancel: &CancellationToken,
    ) -> Result<(), ScrapingError> {
        check_cancel(cancel)?;
        log.log("Loading page...");
        let response = page.navigate(url, self.config.navigation_timeout).await?;
        if response.status != 200 {
            log.log(&format!("Page load failed: {}", response.status));
            return Err(ScrapingError::BadStatus(response.status));
        }
        if response.final_url != url {
            debug!("Redirected to {}", response.final_url);
        }
        Ok(())
    }

    async fn scroll_and_settle(
        &self,
        page: &dyn PageDriver,
        cancel: &CancellationToken,
    ) -> Result<(), ScrapingError> {
        check_cancel(cancel)?;
        page.auto_scroll(&self.config.scroll).await?;
        sleep_or_cancel(self.config.settle_delay, cancel).await
    }

    /// Load the storefront page and return every link target on it.
    pub async fn collect_links(
        &self,
        page: &dyn PageDriver,
        url: &str,
        log: &dyn LogSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ScrapingError> {
        self.load(page, url, log, cancel).await?;
        sleep_or_cancel(self.config.settle_delay, cancel).await?;
        self.scroll_and_settle(page, cancel).await?;
        Ok(page.link_targets().await?)
    }

    /// Extract one product.
    pub async fn extract(
        &self,
        page: &dyn PageDriver,
        url: &str,
        log: &dyn LogSink,
        cancel: &CancellationToken,
    ) -> Result<ProductRecord, ScrapingError> {
        self.load(page, url, log, cancel).await?;
        page.wait_for_selector(TITLE_SELECTOR, self.config.selector_timeout)
            .await?;

        log.log("Page load complete. Initiating scroll...");
        self.scroll_and_settle(page, cancel).await?;
        log.log("Scroll complete. Extracting content...");

        let title = page
            .query_text(TITLE_SELECTOR)
            .await?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ScrapingError::MissingTitle)?;

        let description = match page.query_text(DESCRIPTION_SELECTOR).await? {
            Some(text) if text.chars().count() >= MIN_DESCRIPTION_CHARS => text,
            _ => title.clone(),
        };

        let mut rebuilder = AttributeRebuilder::new(log);
        for region in ATTRIBUTE_REGIONS {
            let (keys, values) = match region.layout {
                RegionLayout::Parallel { keys, values } => {
                    let Some(keys) = page.query_all_text(region.container, keys).await? else {
                        continue;
                    };
                    let values = page
                        .query_all_text(region.container, values)
                        .await?
                        .unwrap_or_default();
                    (trimmed(keys), trimmed(values))
                }
                RegionLayout::Inline { items } => {
                    let Some(items) = page.query_all_text(region.container, items).await? else {
                        continue;
                    };
                    split_inline_items(&items)
                }
            };
            debug!("Region {}: {} keys", region.name, keys.len());
            rebuilder.absorb(&keys, &values);
        }
        let attributes = rebuilder.finish();

        let specification = page
            .query_text(SPECIFICATION_SELECTOR)
            .await?
            .map(|text| Specification::parse(&text));

        let images = match page.page_signal().await {
            Ok(signal) => {
                let resolved = resolve_images(&signal);
                debug!(
                    "Resolved {} images via {:?}",
                    resolved.urls.len(),
                    resolved.strategy
                );
                resolved.urls
            }
            Err(e) => {
                warn!("Could not read image data from {}: {}", url, e);
                Vec::new()
            }
        };

        Ok(ProductRecord {
            title: truncate_chars(&title, MAX_TITLE_CHARS),
            description,
            images,
            attributes,
            specification,
        })
    }
}
