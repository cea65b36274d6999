//! Driver over saved HTML documents.
//!
//! Serves a fixed URL → document map through the same [`PageDriver`]
//! contract as Chrome. Scripts are not executed, so scrolling is a no-op
//! and selectors either match the saved markup or they never will.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tokio::sync::watch;
use url::Url;

use super::{
    BrowserEngineConfig, BrowserLauncher, BrowserSession, NavigationResponse, PageDriver,
    ScrollPlan,
};
use crate::error::{DriverError, SessionError};
use crate::models::PageSignal;

/// A saved response.
#[derive(Debug, Clone)]
pub struct SnapshotDocument {
    pub status: u16,
    pub html: String,
}

/// Launcher for snapshot sessions.
#[derive(Debug, Clone, Default)]
pub struct SnapshotLauncher {
    documents: Arc<HashMap<String, SnapshotDocument>>,
    disconnect_after: Option<usize>,
}

impl SnapshotLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` with status 200 at `url`.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.with_status(url, 200, html)
    }

    pub fn with_status(
        mut self,
        url: impl Into<String>,
        status: u16,
        html: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.documents).insert(
            url.into(),
            SnapshotDocument {
                status,
                html: html.into(),
            },
        );
        self
    }

    /// Let `navigations` page loads succeed, then drop the "browser" on the
    /// next one.
    pub fn disconnect_after(mut self, navigations: usize) -> Self {
        self.disconnect_after = Some(navigations);
        self
    }

    /// Load HTML files, each served at its `file://` URL.
    ///
    /// Returns the launcher and the URLs in argument order.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> std::io::Result<(Self, Vec<String>)> {
        let mut launcher = Self::new();
        let mut urls = Vec::with_capacity(paths.len());
        for path in paths {
            let path = std::fs::canonicalize(path.as_ref())?;
            let html = std::fs::read_to_string(&path)?;
            let url = Url::from_file_path(&path)
                .map_err(|_| {
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("not an absolute path: {}", path.display()),
                    )
                })?
                .to_string();
            launcher = launcher.with_page(url.clone(), html);
            urls.push(url);
        }
        Ok((launcher, urls))
    }
}

#[async_trait]
impl BrowserLauncher for SnapshotLauncher {
    async fn launch(
        &self,
        _config: &BrowserEngineConfig,
    ) -> Result<Box<dyn BrowserSession>, SessionError> {
        let (tx, rx) = watch::channel(false);
        Ok(Box::new(SnapshotSession {
            documents: Arc::clone(&self.documents),
            disconnect: Arc::new(tx),
            disconnected: rx,
            navigations: Arc::new(AtomicUsize::new(0)),
            disconnect_after: self.disconnect_after,
        }))
    }
}

struct SnapshotSession {
    documents: Arc<HashMap<String, SnapshotDocument>>,
    disconnect: Arc<watch::Sender<bool>>,
    disconnected: watch::Receiver<bool>,
    navigations: Arc<AtomicUsize>,
    disconnect_after: Option<usize>,
}

#[async_trait]
impl BrowserSession for SnapshotSession {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>, SessionError> {
        if *self.disconnected.borrow() {
            return Err(SessionError::Disconnected);
        }
        Ok(Box::new(SnapshotPage {
            documents: Arc::clone(&self.documents),
            disconnect: Arc::clone(&self.disconnect),
            navigations: Arc::clone(&self.navigations),
            disconnect_after: self.disconnect_after,
            current: Mutex::new(None),
        }))
    }

    fn disconnected(&self) -> watch::Receiver<bool> {
        self.disconnected.clone()
    }

    async fn close(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

struct LoadedPage {
    url: String,
    html: String,
}

struct SnapshotPage {
    documents: Arc<HashMap<String, SnapshotDocument>>,
    disconnect: Arc<watch::Sender<bool>>,
    navigations: Arc<AtomicUsize>,
    disconnect_after: Option<usize>,
    current: Mutex<Option<LoadedPage>>,
}

fn parse_selector(selector: &str) -> Result<Selector, DriverError> {
    Selector::parse(selector).map_err(|_| DriverError::InvalidSelector(selector.to_string()))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

static LIST_ITEM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());

/// Rendered text as a browser's `innerText` lays out lists: one item per line.
fn inner_text(el: ElementRef<'_>) -> String {
    let items: Vec<String> = el
        .select(&LIST_ITEM)
        .map(|li| element_text(li).trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if items.is_empty() {
        element_text(el)
    } else {
        items.join("\n")
    }
}

impl SnapshotPage {
    /// Run `f` over the parsed current document.
    fn with_document<T>(
        &self,
        f: impl FnOnce(&Html, &str) -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        let current = self
            .current
            .lock()
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        let loaded = current.as_ref().ok_or(DriverError::NoPage)?;
        let document = Html::parse_document(&loaded.html);
        f(&document, &loaded.url)
    }
}

fn resolve(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[async_trait]
impl PageDriver for SnapshotPage {
    async fn navigate(
        &self,
        url: &str,
        _timeout: Duration,
    ) -> Result<NavigationResponse, DriverError> {
        let done = self.navigations.fetch_add(1, Ordering::SeqCst);
        if self.disconnect_after.is_some_and(|limit| done >= limit) {
            let _ = self.disconnect.send(true);
            // a dead browser never answers
            std::future::pending::<()>().await;
        }

        let document = self
            .documents
            .get(url)
            .ok_or_else(|| DriverError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            })?;

        let mut current = self
            .current
            .lock()
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        *current = Some(LoadedPage {
            url: url.to_string(),
            html: document.html.clone(),
        });

        Ok(NavigationResponse {
            status: document.status,
            final_url: url.to_string(),
        })
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        let selector_parsed = parse_selector(selector)?;
        let found = self.with_document(|doc, _| Ok(doc.select(&selector_parsed).next().is_some()))?;
        if found {
            Ok(())
        } else {
            Err(DriverError::Timeout {
                what: format!("selector {}", selector),
                seconds: timeout.as_secs(),
            })
        }
    }

    async fn query_text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        let selector = parse_selector(selector)?;
        self.with_document(|doc, _| Ok(doc.select(&selector).next().map(inner_text)))
    }

    async fn query_all_text(
        &self,
        scope: &str,
        selector: &str,
    ) -> Result<Option<Vec<String>>, DriverError> {
        let scope = parse_selector(scope)?;
        let selector = parse_selector(selector)?;
        self.with_document(|doc, _| {
            Ok(doc
                .select(&scope)
                .next()
                .map(|root| root.select(&selector).map(element_text).collect()))
        })
    }

    async fn auto_scroll(&self, _plan: &ScrollPlan) -> Result<(), DriverError> {
        Ok(())
    }

    async fn page_signal(&self) -> Result<PageSignal, DriverError> {
        let scripts = parse_selector(r#"script[type="text/javascript"]"#)?;
        let main = parse_selector("#landingImage")?;
        let thumbs = parse_selector("#altImages .a-button-thumbnail img")?;

        self.with_document(|doc, base| {
            let main_el = doc.select(&main).next();
            Ok(PageSignal {
                script_blocks: doc.select(&scripts).map(element_text).collect(),
                main_image_dynamic_attr: main_el
                    .and_then(|el| el.value().attr("data-a-dynamic-image"))
                    .map(str::to_string),
                main_image_src: main_el
                    .and_then(|el| el.value().attr("src"))
                    .map(|src| resolve(base, src)),
                thumbnail_srcs: doc
                    .select(&thumbs)
                    .filter_map(|el| el.value().attr("src"))
                    .map(|src| resolve(base, src))
                    .collect(),
            })
        })
    }

    async fn link_targets(&self) -> Result<Vec<String>, DriverError> {
        let anchors = parse_selector("a[href]")?;
        self.with_document(|doc, base| {
            Ok(doc
                .select(&anchors)
                .filter_map(|a| a.value().attr("href"))
                .map(|href| resolve(base, href))
                .collect())
        })
    }

    async fn close(&self) -> Result<(), DriverError> {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
        <script type="text/javascript">var a = 1;</script>
        <script>ignored()</script>
        </head><body>
        <span id="productTitle">  Bamboo Board  </span>
        <div id="detail"><ul><li class="x">One</li><li class="x">Two</li></ul></div>
        <img id="landingImage" src="/images/I/main.jpg" data-a-dynamic-image='{"https://m.media-amazon.com/images/I/a.jpg":[1,1]}'>
        <div id="altImages"><span class="a-button-thumbnail"><img src="https://m.media-amazon.com/images/I/t._US40_.jpg"></span></div>
        <a href="/dp/B000000001">one</a><a href="https://other.example/x">two</a>
        </body></html>"#;

    async fn open(launcher: &SnapshotLauncher) -> Box<dyn PageDriver> {
        let session = launcher
            .launch(&BrowserEngineConfig::default())
            .await
            .unwrap();
        session.new_page().await.unwrap()
    }

    #[tokio::test]
    async fn test_navigate_and_query() {
        let launcher = SnapshotLauncher::new().with_page("https://shop.example/p", PAGE);
        let page = open(&launcher).await;

        let resp = page
            .navigate("https://shop.example/p", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);

        page.wait_for_selector("#productTitle", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(
            page.query_text("#productTitle").await.unwrap().as_deref(),
            Some("  Bamboo Board  ")
        );
        assert_eq!(page.query_text("#missing").await.unwrap(), None);
        assert_eq!(
            page.query_text("#detail ul").await.unwrap().as_deref(),
            Some("One\nTwo")
        );
        assert_eq!(
            page.query_all_text("#detail", ".x").await.unwrap(),
            Some(vec!["One".to_string(), "Two".to_string()])
        );
        assert_eq!(page.query_all_text("#nope", ".x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_page_signal_and_links() {
        let launcher = SnapshotLauncher::new().with_page("https://shop.example/p", PAGE);
        let page = open(&launcher).await;
        page.navigate("https://shop.example/p", Duration::from_secs(1))
            .await
            .unwrap();

        let signal = page.page_signal().await.unwrap();
        assert_eq!(signal.script_blocks, vec!["var a = 1;"]);
        assert_eq!(
            signal.main_image_src.as_deref(),
            Some("https://shop.example/images/I/main.jpg")
        );
        assert!(signal.main_image_dynamic_attr.unwrap().contains("a.jpg"));
        assert_eq!(signal.thumbnail_srcs.len(), 1);

        let links = page.link_targets().await.unwrap();
        assert_eq!(
            links,
            vec!["https://shop.example/dp/B000000001", "https://other.example/x"]
        );
    }

    #[tokio::test]
    async fn test_unknown_url_and_missing_selector() {
        let launcher = SnapshotLauncher::new().with_status("https://shop.example/p", 503, PAGE);
        let page = open(&launcher).await;

        assert!(matches!(
            page.navigate("https://shop.example/other", Duration::from_secs(1))
                .await,
            Err(DriverError::Navigation { .. })
        ));
        assert!(matches!(page.query_text("#productTitle").await, Err(DriverError::NoPage)));

        let resp = page
            .navigate("https://shop.example/p", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp.status, 503);
        assert!(matches!(
            page.wait_for_selector("#nothing", Duration::from_secs(2)).await,
            Err(DriverError::Timeout { seconds: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_disconnect_after() {
        let launcher = SnapshotLauncher::new()
            .with_page("https://shop.example/p", PAGE)
            .disconnect_after(1);
        let session = launcher
            .launch(&BrowserEngineConfig::default())
            .await
            .unwrap();
        let mut disconnected = session.disconnected();
        let page = session.new_page().await.unwrap();

        page.navigate("https://shop.example/p", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!*disconnected.borrow());

        let second = tokio::time::timeout(
            Duration::from_millis(50),
            page.navigate("https://shop.example/p", Duration::from_secs(1)),
        )
        .await;
        assert!(second.is_err());
        disconnected.changed().await.unwrap();
        assert!(*disconnected.borrow());
    }

    #[test]
    fn test_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, PAGE).unwrap();

        let (launcher, urls) = SnapshotLauncher::from_files(&[&path]).unwrap();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].starts_with("file://"));
        assert!(launcher.documents.contains_key(&urls[0]));
    }
}
