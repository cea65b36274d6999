//! Resolved application settings.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::browser::BrowserEngineConfig;
use crate::extract::ExtractorConfig;
use crate::models::RowDefaults;
use crate::services::SpiderConfig;
use crate::storage::WorkbookSink;

pub const DEFAULT_TEMPLATE_FILE: &str = "template.xlsx";
pub const DEFAULT_OUTPUT_FILE: &str = "output.xlsx";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the template and output workbooks.
    pub output_dir: PathBuf,
    pub template_file: String,
    pub output_file: String,
    pub browser: BrowserEngineConfig,
    /// Page navigation timeout in seconds.
    pub navigation_timeout: u64,
    /// Timeout for the product title to appear, in seconds.
    pub selector_timeout: u64,
    /// Pause after scrolling in milliseconds.
    pub settle_delay_ms: u64,
    /// Delay between items when the caller does not give one, in seconds.
    pub default_sleep_secs: u64,
    /// How long a submitted server task may wait to be claimed, in seconds.
    pub task_ttl_secs: u64,
    pub row_defaults: RowDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        // ~/Documents/amzspider, falling back to home then cwd
        let output_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("amzspider");

        Self {
            output_dir,
            template_file: DEFAULT_TEMPLATE_FILE.to_string(),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            browser: BrowserEngineConfig::default(),
            navigation_timeout: 40,
            selector_timeout: 40,
            settle_delay_ms: 2000,
            default_sleep_secs: 3,
            task_ttl_secs: 600,
            row_defaults: RowDefaults::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom output directory.
    pub fn with_output_dir(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            ..Default::default()
        }
    }

    pub fn template_path(&self) -> PathBuf {
        self.output_dir.join(&self.template_file)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }

    pub fn task_ttl(&self) -> Duration {
        Duration::from_secs(self.task_ttl_secs)
    }

    /// Ensure the output directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create output directory '{}': {}",
                    self.output_dir.display(),
                    e
                ),
            )
        })
    }

    pub fn workbook_sink(&self) -> WorkbookSink {
        WorkbookSink::new(self.template_path(), self.output_path())
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            navigation_timeout: Duration::from_secs(self.navigation_timeout),
            selector_timeout: Duration::from_secs(self.selector_timeout),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            ..Default::default()
        }
    }

    pub fn spider_config(&self) -> SpiderConfig {
        SpiderConfig {
            browser: self.browser.clone(),
            extractor: self.extractor_config(),
            row_defaults: self.row_defaults.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::with_output_dir(PathBuf::from("/data"));
        assert_eq!(settings.template_path(), PathBuf::from("/data/template.xlsx"));
        assert_eq!(settings.output_path(), PathBuf::from("/data/output.xlsx"));
        assert_eq!(settings.task_ttl(), Duration::from_secs(600));

        let extractor = settings.extractor_config();
        assert_eq!(extractor.navigation_timeout, Duration::from_secs(40));
        assert_eq!(extractor.settle_delay, Duration::from_secs(2));
        assert_eq!(settings.row_defaults.region, "中国大陆");
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_output_dir(dir.path().join("nested/out"));
        settings.ensure_directories().unwrap();
        assert!(settings.output_dir.is_dir());
    }
}
