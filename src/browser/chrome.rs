//! Chrome driver over the DevTools protocol.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::scripts;
use super::{
    BrowserEngineConfig, BrowserLauncher, BrowserSession, NavigationResponse, PageDriver,
    ScrollPlan,
};
use crate::error::{DriverError, SessionError};
use crate::models::PageSignal;

const SELECTOR_POLL: Duration = Duration::from_millis(100);

/// Launches a local Chrome or Chromium.
#[derive(Debug, Default, Clone)]
pub struct ChromeLauncher;

impl ChromeLauncher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Windows
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new() -> Self {
        Self
    }

    /// Find a Chrome executable, preferring the configured one.
    fn find_chrome(config: &BrowserEngineConfig) -> Result<PathBuf, SessionError> {
        if let Some(path) = &config.executable_path {
            if path.exists() {
                return Ok(path.clone());
            }
            warn!("Configured Chrome executable not found: {}", path.display());
        }

        for path in Self::CHROME_PATHS {
            let p = Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            let p = PathBuf::from(local).join(r"Google\Chrome\Application\chrome.exe");
            if p.exists() {
                return Ok(p);
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(SessionError::Launch(
            "Chrome/Chromium not found. Install it or set CHROME_EXECUTABLE_PATH".to_string(),
        ))
    }

    fn build_config(config: &BrowserEngineConfig) -> Result<BrowserConfig, SessionError> {
        let chrome_path = Self::find_chrome(config)?;
        let (width, height) = config.window_size;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                ..Default::default()
            })
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox");

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = &config.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        builder
            .build()
            .map_err(|e| SessionError::Launch(format!("Failed to build browser config: {}", e)))
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(
        &self,
        config: &BrowserEngineConfig,
    ) -> Result<Box<dyn BrowserSession>, SessionError> {
        info!("Launching browser (headless={})", config.headless);
        let browser_config = Self::build_config(config)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        let (tx, rx) = watch::channel(false);
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
            let _ = tx.send(true);
        });

        Ok(Box::new(ChromeSession {
            browser: Mutex::new(browser),
            handler_task,
            disconnected: rx,
            user_agent: config.user_agent.clone(),
        }))
    }
}

struct ChromeSession {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    disconnected: watch::Receiver<bool>,
    user_agent: String,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>, SessionError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Page(e.to_string()))?;

        page.execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
            .map_err(|e| SessionError::Page(e.to_string()))?;

        Ok(Box::new(ChromePage { page }))
    }

    fn disconnected(&self) -> watch::Receiver<bool> {
        self.disconnected.clone()
    }

    async fn close(&self) -> Result<(), SessionError> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            debug!("Browser close: {}", e);
        }
        let _ = browser.wait().await;
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

struct ChromePage {
    page: Page,
}

impl ChromePage {
    async fn eval_json<T: DeserializeOwned>(&self, script: String) -> Result<T, DriverError> {
        let raw: String = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Evaluation(e.to_string()))?
            .into_value()
            .map_err(|e| DriverError::Evaluation(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| DriverError::Evaluation(e.to_string()))
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResponse, DriverError> {
        debug!("Navigating to {}", url);
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| DriverError::Timeout {
                what: format!("navigation to {}", url),
                seconds: timeout.as_secs(),
            })?
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status: u16 = self.eval_json(scripts::NAV_STATUS.to_string()).await?;
        // file:// and cached documents report no status
        let status = if status == 0 { 200 } else { status };

        let final_url = self
            .page
            .url()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))?
            .unwrap_or_else(|| url.to_string());

        Ok(NavigationResponse { status, final_url })
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        let poll = async {
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(SELECTOR_POLL).await;
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| DriverError::Timeout {
                what: format!("selector {}", selector),
                seconds: timeout.as_secs(),
            })
    }

    async fn query_text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.eval_json(scripts::query_text(selector)).await
    }

    async fn query_all_text(
        &self,
        scope: &str,
        selector: &str,
    ) -> Result<Option<Vec<String>>, DriverError> {
        self.eval_json(scripts::query_all_text(scope, selector)).await
    }

    async fn auto_scroll(&self, plan: &ScrollPlan) -> Result<(), DriverError> {
        let scrolled: u64 = self.eval_json(scripts::auto_scroll(plan)).await?;
        debug!("Scrolled {}px", scrolled);
        Ok(())
    }

    async fn page_signal(&self) -> Result<PageSignal, DriverError> {
        self.eval_json(scripts::PAGE_SIGNAL.to_string()).await
    }

    async fn link_targets(&self) -> Result<Vec<String>, DriverError> {
        self.eval_json(scripts::LINK_TARGETS.to_string()).await
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))
    }
}
